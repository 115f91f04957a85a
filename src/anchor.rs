//! Locating anchors inside a text buffer.
//!
//! Offsets in and out of [`locate`] always refer to the original buffer, even
//! when a MatchSpec asks for line-ending-normalised matching.

use regex::Regex;

use crate::newline::MatchView;
use crate::plan::{MatchSpec, Occurrence, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    Found(Span),
    NotFound,
    Ambiguous { count: usize },
}

/// Builds the view `spec` wants to be matched against.
pub fn view_for<'a>(buffer: &'a str, spec: &MatchSpec) -> MatchView<'a> {
    if spec.normalize_line_endings {
        MatchView::normalized(buffer)
    } else {
        MatchView::raw(buffer)
    }
}

/// Finds `spec` in `buffer[search_from..]`, applying its own
/// occurrence policy.
pub fn locate(buffer: &str, spec: &MatchSpec, search_from: usize) -> Located {
    locate_with(buffer, spec, search_from, spec.occurrence)
}

/// Like [`locate`], but for an anchor pinned after a scope marker: the first
/// occurrence inside the window is the one meant.
pub fn locate_scoped(buffer: &str, spec: &MatchSpec, scope_end: usize) -> Located {
    locate_with(buffer, spec, scope_end, Occurrence::First)
}

fn locate_with(buffer: &str, spec: &MatchSpec, search_from: usize, policy: Occurrence) -> Located {
    let view = view_for(buffer, spec);
    let from = view.from_original(search_from);
    let (first, second) = find_two(view.text(), &spec.pattern, from, spec.normalize_line_endings);
    let Some((start, end)) = first else {
        return Located::NotFound;
    };
    if second.is_some() && policy == Occurrence::Unique {
        let count = count_matches(view.text(), &spec.pattern, from, spec.normalize_line_endings);
        return Located::Ambiguous { count };
    }
    Located::Found(Span {
        start: view.to_original(start),
        end: view.to_original(end),
    })
}

type Hit = Option<(usize, usize)>;

fn find_two(text: &str, pattern: &Pattern, from: usize, normalize: bool) -> (Hit, Hit) {
    match pattern {
        Pattern::Literal(literal) => {
            let needle = literal_needle(literal, normalize);
            let Some(start) = text[from..].find(needle.as_ref()).map(|pos| pos + from) else {
                return (None, None);
            };
            let first = Some((start, start + needle.len()));
            // overlapping occurrences count as a second match
            let next = next_char_boundary(text, start);
            let second = text[next..]
                .find(needle.as_ref())
                .map(|pos| (pos + next, pos + next + needle.len()));
            (first, second)
        }
        Pattern::Regex(regex) => {
            let mut hits = regex_hits(regex, text, from);
            (hits.next(), hits.next())
        }
    }
}

fn count_matches(text: &str, pattern: &Pattern, from: usize, normalize: bool) -> usize {
    match pattern {
        Pattern::Literal(literal) => {
            let needle = literal_needle(literal, normalize);
            let mut count = 0;
            let mut pos = from;
            while let Some(found) = text[pos..].find(needle.as_ref()) {
                count += 1;
                pos = next_char_boundary(text, pos + found);
            }
            count
        }
        Pattern::Regex(regex) => regex_hits(regex, text, from).count(),
    }
}

/// Matches starting at or after `from`. The whole text stays the haystack so
/// `^`, `\b` and friends see what precedes `from`.
fn regex_hits<'t>(
    regex: &'t Regex,
    text: &'t str,
    from: usize,
) -> impl Iterator<Item = (usize, usize)> + 't {
    let mut next = Some(from);
    std::iter::from_fn(move || {
        let at = next?;
        let Some(m) = regex.find_at(text, at) else {
            next = None;
            return None;
        };
        next = if m.end() > m.start() {
            Some(m.end())
        } else if m.end() < text.len() {
            Some(next_char_boundary(text, m.end()))
        } else {
            None
        };
        Some((m.start(), m.end()))
    })
}

fn literal_needle(literal: &str, normalize: bool) -> std::borrow::Cow<'_, str> {
    if normalize {
        crate::newline::normalize_to_lf(literal)
    } else {
        std::borrow::Cow::Borrowed(literal)
    }
}

pub fn next_char_boundary(text: &str, idx: usize) -> usize {
    let mut next = idx + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }
    next.min(text.len())
}

pub fn prev_char_boundary(text: &str, idx: usize) -> usize {
    let mut prev = idx.min(text.len());
    while prev > 0 && !text.is_char_boundary(prev) {
        prev -= 1;
    }
    prev
}
