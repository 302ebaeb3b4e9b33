//! Delimiter pairs marking inline and display math.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Whether math is set within a line or as its own block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathMode {
    Inline,
    Display,
}

/// An opening/closing token pair, serialized as `["open", "close"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DelimiterPair {
    pub open: String,
    pub close: String,
}

impl DelimiterPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl From<(String, String)> for DelimiterPair {
    fn from((open, close): (String, String)) -> Self {
        Self { open, close }
    }
}

impl From<DelimiterPair> for (String, String) {
    fn from(pair: DelimiterPair) -> Self {
        (pair.open, pair.close)
    }
}

/// Ordered delimiter pairs for one math mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelimiterSet(Vec<DelimiterPair>);

impl DelimiterSet {
    pub fn new(pairs: Vec<DelimiterPair>) -> Self {
        Self(pairs)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DelimiterPair> {
        self.0.iter()
    }

    pub fn contains(&self, pair: &DelimiterPair) -> bool {
        self.0.contains(pair)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a DelimiterSet {
    type Item = &'a DelimiterPair;
    type IntoIter = std::slice::Iter<'a, DelimiterPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Reject empty tokens and pairs listed for both modes.
pub fn validate_delimiters(inline: &DelimiterSet, display: &DelimiterSet) -> Result<(), ConfigError> {
    if inline
        .iter()
        .chain(display.iter())
        .any(|pair| pair.open.is_empty() || pair.close.is_empty())
    {
        return Err(ConfigError::EmptyDelimiter);
    }

    if let Some(pair) = inline.iter().find(|pair| display.contains(pair)) {
        return Err(ConfigError::OverlappingDelimiter {
            open: pair.open.clone(),
            close: pair.close.clone(),
        });
    }

    Ok(())
}

/// All pairs tagged with their mode, longest opening token first.
///
/// The sort is stable, so pairs with equally long openers keep their listed
/// order, inline before display.
pub fn ordered_candidates<'a>(
    inline: &'a DelimiterSet,
    display: &'a DelimiterSet,
) -> Vec<(MathMode, &'a DelimiterPair)> {
    let mut candidates: Vec<_> = inline
        .iter()
        .map(|pair| (MathMode::Inline, pair))
        .chain(display.iter().map(|pair| (MathMode::Display, pair)))
        .collect();
    candidates.sort_by(|a, b| b.1.open.len().cmp(&a.1.open.len()));
    candidates
}
