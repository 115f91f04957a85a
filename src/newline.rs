use std::borrow::Cow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEndingStyle {
    Lf,
    Crlf,
    Cr,
}

impl LineEndingStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEndingStyle::Lf => "\n",
            LineEndingStyle::Crlf => "\r\n",
            LineEndingStyle::Cr => "\r",
        }
    }
}

/// Style of the first terminator in `text`, `Lf` when there is none.
pub fn detect_line_ending_style(text: &str) -> LineEndingStyle {
    let bytes = text.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            b'\n' => return LineEndingStyle::Lf,
            b'\r' => {
                return if bytes.get(idx + 1) == Some(&b'\n') {
                    LineEndingStyle::Crlf
                } else {
                    LineEndingStyle::Cr
                };
            }
            _ => {}
        }
    }
    LineEndingStyle::Lf
}

pub fn normalize_to_lf(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    let mut normalized = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                normalized.push('\n');
            }
            _ => normalized.push(ch),
        }
    }
    Cow::Owned(normalized)
}

/// Rewrites the LF terminators of `text` into `style`. Input must already be
/// LF-normalised.
pub fn restore_from_lf(text: &str, style: LineEndingStyle) -> Cow<'_, str> {
    match style {
        LineEndingStyle::Lf => Cow::Borrowed(text),
        other => Cow::Owned(text.replace('\n', other.as_str())),
    }
}

/// A buffer as seen by the matcher: either the original text, or an
/// LF-normalised copy that remembers where each byte came from.
#[derive(Debug)]
pub struct MatchView<'a> {
    text: Cow<'a, str>,
    // origin[i] = original offset of normalised byte i; one extra slot for the end.
    origin: Option<Vec<usize>>,
}

impl<'a> MatchView<'a> {
    pub fn raw(text: &'a str) -> Self {
        Self {
            text: Cow::Borrowed(text),
            origin: None,
        }
    }

    pub fn normalized(text: &'a str) -> Self {
        if !text.contains('\r') {
            return Self::raw(text);
        }
        let bytes = text.as_bytes();
        let mut normalized = Vec::with_capacity(bytes.len());
        let mut origin = Vec::with_capacity(bytes.len() + 1);
        let mut idx = 0;
        while idx < bytes.len() {
            let byte = bytes[idx];
            if byte == b'\r' {
                normalized.push(b'\n');
                origin.push(idx);
                idx += if bytes.get(idx + 1) == Some(&b'\n') { 2 } else { 1 };
                continue;
            }
            normalized.push(byte);
            origin.push(idx);
            idx += 1;
        }
        origin.push(bytes.len());
        // Only ASCII CR bytes were rewritten, so UTF-8 validity is preserved.
        let text = String::from_utf8(normalized).unwrap_or_else(|err| {
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        });
        Self {
            text: Cow::Owned(text),
            origin: Some(origin),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_original(&self, offset: usize) -> usize {
        match &self.origin {
            Some(origin) => origin[offset.min(origin.len() - 1)],
            None => offset,
        }
    }

    pub fn from_original(&self, offset: usize) -> usize {
        match &self.origin {
            Some(origin) => origin.partition_point(|&pos| pos < offset),
            None => offset.min(self.text.len()),
        }
    }
}
