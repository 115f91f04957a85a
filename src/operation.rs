use std::borrow::Cow;

use tracing::debug;

use crate::anchor::{
    Located, Span, locate, locate_scoped, next_char_boundary, prev_char_boundary, view_for,
};
use crate::newline::{LineEndingStyle, normalize_to_lf, restore_from_lf};
use crate::plan::PatchOperation;
use crate::report::OperationOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: OperationOutcome,
    pub detail: Option<String>,
}

impl Resolution {
    fn new(outcome: OperationOutcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: Some(detail.into()),
        }
    }

    fn applied() -> Self {
        Self {
            outcome: OperationOutcome::Applied,
            detail: None,
        }
    }
}

/// Applies one operation to `buffer`. `style` is the terminator style of the
/// untouched file, used for text inserted by line-ending-normalised anchors.
pub fn apply(buffer: &str, op: &PatchOperation, style: LineEndingStyle) -> (String, Resolution) {
    let unchanged = |resolution| (buffer.to_string(), resolution);

    let (located, search_from) = match &op.scope {
        None => (locate(buffer, &op.anchor, 0), 0),
        Some(scope) => match locate(buffer, scope, 0) {
            Located::Found(mark) => (locate_scoped(buffer, &op.anchor, mark.end), mark.end),
            Located::NotFound => {
                return unchanged(Resolution::new(
                    OperationOutcome::AnchorNotFound,
                    format!("scope anchor {scope} not found"),
                ));
            }
            Located::Ambiguous { count } => {
                return unchanged(Resolution::new(
                    OperationOutcome::AmbiguousAnchor,
                    format!("scope anchor {scope} occurs {count} times"),
                ));
            }
        },
    };

    match located {
        Located::Found(span) => {
            if replacement_covers(buffer, op, span) {
                debug!(anchor = %op.anchor, "replacement already surrounds anchor");
                return unchanged(Resolution::new(
                    OperationOutcome::AlreadyApplied,
                    "replacement already in place",
                ));
            }
            let replacement = replacement_text(op, style);
            let mut out = String::with_capacity(buffer.len() + replacement.len());
            out.push_str(&buffer[..span.start]);
            out.push_str(&replacement);
            out.push_str(&buffer[span.end..]);
            debug!(anchor = %op.anchor, start = span.start, end = span.end, "anchor replaced");
            (out, Resolution::applied())
        }
        Located::Ambiguous { count } => unchanged(Resolution::new(
            OperationOutcome::AmbiguousAnchor,
            format!(
                "anchor {} occurs {count} times; add a scope anchor or set occurrence: first",
                op.anchor
            ),
        )),
        Located::NotFound => {
            if probe_present(buffer, op, search_from) {
                return unchanged(Resolution::new(
                    OperationOutcome::AlreadyApplied,
                    format!("probe {:?} present", op.probe),
                ));
            }
            let mut detail = format!("anchor {} not found", op.anchor);
            if let Some(hint) = closest_line(&buffer[search_from..], op.anchor.pattern.source()) {
                detail.push_str("; ");
                detail.push_str(&hint);
            }
            unchanged(Resolution::new(OperationOutcome::AnchorNotFound, detail))
        }
    }
}

fn replacement_text(op: &PatchOperation, style: LineEndingStyle) -> Cow<'_, str> {
    if !op.anchor.normalize_line_endings {
        return Cow::Borrowed(op.replacement.as_str());
    }
    match normalize_to_lf(&op.replacement) {
        Cow::Borrowed(text) => restore_from_lf(text, style),
        Cow::Owned(text) => Cow::Owned(restore_from_lf(&text, style).into_owned()),
    }
}

fn needle<'a>(op: &PatchOperation, text: &'a str) -> Cow<'a, str> {
    if op.anchor.normalize_line_endings {
        normalize_to_lf(text)
    } else {
        Cow::Borrowed(text)
    }
}

/// True when the matched region already sits inside a copy of the full
/// replacement, i.e. an insert-style edit that repeats its anchor has run.
fn replacement_covers(buffer: &str, op: &PatchOperation, span: Span) -> bool {
    let view = view_for(buffer, &op.anchor);
    let text = view.text();
    let replacement = needle(op, &op.replacement);
    let start = view.from_original(span.start);
    let end = view.from_original(span.end);
    if replacement.len() < end - start {
        return false;
    }
    let lo = prev_char_boundary(text, start.saturating_sub(replacement.len()));
    let hi = prev_char_boundary(text, end + replacement.len());
    let mut pos = lo;
    while pos < hi {
        let Some(found) = text[pos..hi].find(replacement.as_ref()) else {
            break;
        };
        let r_start = pos + found;
        let r_end = r_start + replacement.len();
        if r_start <= start && end <= r_end {
            return true;
        }
        pos = next_char_boundary(text, r_start);
    }
    false
}

fn probe_present(buffer: &str, op: &PatchOperation, search_from: usize) -> bool {
    let view = view_for(buffer, &op.anchor);
    let from = view.from_original(search_from);
    view.text()[from..].contains(needle(op, &op.probe).as_ref())
}

fn closest_line(text: &str, pattern: &str) -> Option<String> {
    let first_line = pattern.lines().next().unwrap_or(pattern).trim();
    if first_line.is_empty() {
        return None;
    }
    let mut best: Option<(usize, usize, &str)> = None;
    for (line_idx, line) in text.lines().enumerate() {
        let score = mismatch_score(line.trim(), first_line);
        best = match best {
            Some(current) if score >= current.0 => Some(current),
            Some(_) | None => Some((score, line_idx, line)),
        };
        if score == 0 {
            break;
        }
    }
    let (score, line_idx, line) = best?;
    // a hint that needs more edits than the pattern has characters is noise
    if score >= first_line.chars().count() {
        return None;
    }
    Some(format!(
        "closest text near line {}: {}",
        line_idx + 1,
        line.trim()
    ))
}

fn mismatch_score(line: &str, pattern: &str) -> usize {
    let take = pattern.chars().count();
    let snippet: String = line.chars().take(take).collect();
    levenshtein(&snippet, pattern)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut costs = (0..=b.len()).collect::<Vec<_>>();
    for (i, ca) in a.chars().enumerate() {
        let mut last = i;
        costs[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let new = if ca == *cb {
                last
            } else {
                1 + std::cmp::min(std::cmp::min(costs[j], costs[j + 1]), last)
            };
            last = costs[j + 1];
            costs[j + 1] = new;
        }
    }
    costs[b.len()]
}
