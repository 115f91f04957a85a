use anyhow::Result;
use tracing::{debug, warn};

use crate::encoding::{DecodedText, EncodingStrategy};
use crate::newline::detect_line_ending_style;
use crate::operation::{self, Resolution};
use crate::plan::FilePatch;

/// A FilePatch run against one file's content, in memory.
#[derive(Debug)]
pub struct TransformResult {
    pub decoded: DecodedText,
    pub new_text: String,
    /// One resolution per attempted operation, in order.
    pub resolutions: Vec<Resolution>,
    pub not_attempted: usize,
}

impl TransformResult {
    pub fn changed(&self) -> bool {
        self.new_text != self.decoded.text
    }

    /// True when an operation failed and the rest were skipped.
    pub fn halted(&self) -> bool {
        self.resolutions
            .last()
            .is_some_and(|last| !last.outcome.is_success())
    }

    pub fn encoded(&self) -> Result<Vec<u8>> {
        let (bytes, had_errors) = self.decoded.encode(&self.new_text)?;
        if had_errors {
            warn!(
                encoding = self.decoded.decision.encoding.name(),
                "unmappable characters replaced while encoding; output may be lossy"
            );
        }
        Ok(bytes)
    }
}

/// Decodes `bytes` and applies the FilePatch's operations in order, each on
/// the output of the previous one. Stops at the first failing operation.
pub fn run_file_patch(file_patch: &FilePatch, bytes: &[u8]) -> Result<TransformResult> {
    let strategy = EncodingStrategy::new(&file_patch.encoding)?;
    let decoded = strategy.decode(bytes);
    if decoded.had_errors {
        warn!(
            file = %file_patch.target.display(),
            encoding = decoded.decision.encoding.name(),
            "decoding errors encountered; continuing"
        );
    }
    let style = detect_line_ending_style(&decoded.text);
    debug!(
        file = %file_patch.target.display(),
        strategy = %strategy.describe(),
        encoding = decoded.decision.encoding.name(),
        source = %decoded.decision.source,
        line_endings = ?style,
        "decoded target"
    );

    let mut buffer = decoded.text.clone();
    let mut resolutions = Vec::with_capacity(file_patch.operations.len());
    let mut not_attempted = 0;

    for (idx, op) in file_patch.operations.iter().enumerate() {
        let (next, resolution) = operation::apply(&buffer, op, style);
        let failed = !resolution.outcome.is_success();
        debug!(
            file = %file_patch.target.display(),
            index = idx + 1,
            outcome = %resolution.outcome,
            "operation resolved"
        );
        buffer = next;
        resolutions.push(resolution);
        if failed {
            not_attempted = file_patch.operations.len() - idx - 1;
            break;
        }
    }

    Ok(TransformResult {
        decoded,
        new_text: buffer,
        resolutions,
        not_attempted,
    })
}
