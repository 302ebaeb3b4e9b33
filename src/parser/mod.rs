//! Splitting text into plain-text and math segments.

pub mod lexer;

use crate::config::delimiters::ordered_candidates;
use crate::config::{Configuration, DelimiterPair, MathMode};
use lexer::{delimited_math, environment, escaped_char};

/// A piece of scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text outside math, with escapes already resolved.
    Text(String),
    /// A math expression. `delimiters` is `None` for a bare environment.
    Math {
        mode: MathMode,
        delimiters: Option<DelimiterPair>,
        body: String,
    },
}

impl Segment {
    pub fn is_math(&self) -> bool {
        matches!(self, Segment::Math { .. })
    }

    /// The text this segment was scanned from, delimiters included.
    /// Escapes in text segments stay resolved.
    pub fn source(&self) -> String {
        match self {
            Segment::Text(text) => text.clone(),
            Segment::Math {
                delimiters: Some(pair),
                body,
                ..
            } => format!("{}{}{}", pair.open, body, pair.close),
            Segment::Math { body, .. } => body.clone(),
        }
    }
}

/// Scan `text` for math using the configured delimiters.
///
/// At every position the longest matching opening delimiter wins, whichever
/// mode it belongs to. Opening delimiters without a closing partner, and
/// empty bodies, are ordinary text.
pub fn scan(text: &str, config: &Configuration) -> Vec<Segment> {
    let tex = &config.tex;
    let candidates = ordered_candidates(&tex.inline_math, &tex.display_math);
    let mut segments = Vec::new();
    let mut pending = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if tex.process_escapes {
            if let Ok((after, escaped)) = escaped_char(rest) {
                pending.push(escaped);
                rest = after;
                continue;
            }
        }

        if let Some((after, segment)) = try_math(rest, &candidates, tex.process_environments) {
            flush_text(&mut segments, &mut pending);
            segments.push(segment);
            rest = after;
            continue;
        }

        pending.push(c);
        rest = &rest[c.len_utf8()..];
    }

    flush_text(&mut segments, &mut pending);
    tracing::trace!(
        segments = segments.len(),
        math = segments.iter().filter(|s| s.is_math()).count(),
        "scanned text"
    );
    segments
}

fn try_math<'a>(
    input: &'a str,
    candidates: &[(MathMode, &DelimiterPair)],
    environments: bool,
) -> Option<(&'a str, Segment)> {
    for &(mode, pair) in candidates {
        if !input.starts_with(pair.open.as_str()) {
            continue;
        }
        if let Ok((rest, body)) = delimited_math(input, pair) {
            if body.is_empty() {
                continue;
            }
            let segment = Segment::Math {
                mode,
                delimiters: Some(pair.clone()),
                body: body.to_string(),
            };
            return Some((rest, segment));
        }
    }

    if environments {
        if let Ok((rest, (_, whole))) = environment(input) {
            let segment = Segment::Math {
                mode: MathMode::Display,
                delimiters: None,
                body: whole.to_string(),
            };
            return Some((rest, segment));
        }
    }

    None
}

fn flush_text(segments: &mut Vec<Segment>, pending: &mut String) {
    if !pending.is_empty() {
        segments.push(Segment::Text(std::mem::take(pending)));
    }
}
