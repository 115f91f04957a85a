use std::fmt;

use anyhow::{Result, anyhow};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

const AUTO_LABEL: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Declared,
    Bom,
    Detector,
    AssumedUtf8,
}

impl fmt::Display for EncodingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EncodingSource::Declared => "declared",
            EncodingSource::Bom => "bom",
            EncodingSource::Detector => "detector",
            EncodingSource::AssumedUtf8 => "assumed-utf8",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct EncodingDecision {
    pub encoding: &'static Encoding,
    pub source: EncodingSource,
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub had_errors: bool,
    /// BOM bytes stripped before decoding; written back unchanged.
    pub bom: Vec<u8>,
    pub decision: EncodingDecision,
}

impl DecodedText {
    /// Encodes `text` the way this file was read: same encoding, same BOM.
    pub fn encode(&self, text: &str) -> Result<(Vec<u8>, bool)> {
        let mut out = self.bom.clone();
        let encoding = self.decision.encoding;
        if encoding == UTF_16LE || encoding == UTF_16BE {
            // encoding_rs only decodes UTF-16; its encoder targets UTF-8.
            for unit in text.encode_utf16() {
                let bytes = if encoding == UTF_16LE {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                };
                out.extend_from_slice(&bytes);
            }
            return Ok((out, false));
        }
        if encoding.output_encoding() != encoding {
            return Err(anyhow!("cannot write text as {}", encoding.name()));
        }
        let (encoded, _, had_errors) = encoding.encode(text);
        out.extend_from_slice(&encoded);
        Ok((out, had_errors))
    }
}

/// How a FilePatch's bytes become text: a declared label, or `auto`.
#[derive(Debug, Clone)]
pub struct EncodingStrategy {
    declared: Option<&'static Encoding>,
}

impl EncodingStrategy {
    pub fn new(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case(AUTO_LABEL) {
            return Ok(Self { declared: None });
        }
        let encoding = Encoding::for_label(trimmed.as_bytes())
            .ok_or_else(|| anyhow!("unknown encoding '{trimmed}'"))?;
        Ok(Self {
            declared: Some(encoding),
        })
    }

    pub fn describe(&self) -> String {
        match self.declared {
            Some(enc) => enc.name().to_string(),
            None => "auto (BOM, UTF-8, detector)".to_string(),
        }
    }

    pub fn decide(&self, bytes: &[u8]) -> EncodingDecision {
        if let Some(encoding) = self.declared {
            // A BOM outranks the declaration, as in a browser.
            if let Some((bom_encoding, _)) = Encoding::for_bom(bytes) {
                if bom_encoding != encoding {
                    tracing::warn!(
                        declared = encoding.name(),
                        bom = bom_encoding.name(),
                        "byte order mark disagrees with declared encoding"
                    );
                    return EncodingDecision {
                        encoding: bom_encoding,
                        source: EncodingSource::Bom,
                    };
                }
            }
            return EncodingDecision {
                encoding,
                source: EncodingSource::Declared,
            };
        }

        detect_auto(bytes)
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        let decision = self.decide(bytes);
        let bom_len = match Encoding::for_bom(bytes) {
            Some((encoding, len)) if encoding == decision.encoding => len,
            _ => 0,
        };
        let (cow, had_errors) = decision
            .encoding
            .decode_without_bom_handling(&bytes[bom_len..]);
        DecodedText {
            text: cow.into_owned(),
            had_errors,
            bom: bytes[..bom_len].to_vec(),
            decision,
        }
    }
}

fn detect_auto(bytes: &[u8]) -> EncodingDecision {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return EncodingDecision {
            encoding,
            source: EncodingSource::Bom,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        return EncodingDecision {
            encoding: UTF_8,
            source: EncodingSource::AssumedUtf8,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    EncodingDecision {
        encoding,
        source: EncodingSource::Detector,
    }
}
