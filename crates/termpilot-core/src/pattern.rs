//! Text patterns used by waits and locators.
//!
//! Matching never carries state between calls: a literal is a plain substring
//! search and a [`Regex`] always scans from the start of its input.

use regex::Regex;

use crate::{Error, Result};

/// Literal substring or regular expression.
#[derive(Debug, Clone)]
pub enum TextPattern {
    /// Plain substring
    Literal(String),
    /// Regular expression
    Regex(Regex),
}

/// One match of a pattern inside a line, in byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset one past the match end
    pub end: usize,
}

impl TextPattern {
    /// Literal pattern.
    pub fn literal(text: impl Into<String>) -> Self {
        TextPattern::Literal(text.into())
    }

    /// Compile a regular expression pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(TextPattern::Regex)
            .map_err(|e| Error::InvalidInput(format!("invalid pattern {pattern:?}: {e}")))
    }

    /// Whether the pattern occurs anywhere in `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            TextPattern::Literal(text) => haystack.contains(text.as_str()),
            TextPattern::Regex(regex) => regex.is_match(haystack),
        }
    }

    /// All matches in `haystack`.
    ///
    /// Literal matches may overlap: the search resumes one character after
    /// each match start. Regex matches follow [`Regex::find_iter`].
    pub fn find_all(&self, haystack: &str) -> Vec<PatternMatch> {
        match self {
            TextPattern::Literal(text) if text.is_empty() => Vec::new(),
            TextPattern::Literal(text) => {
                let mut matches = Vec::new();
                let mut from = 0;
                while let Some(offset) = haystack[from..].find(text.as_str()) {
                    let start = from + offset;
                    matches.push(PatternMatch {
                        start,
                        end: start + text.len(),
                    });
                    let step = haystack[start..].chars().next().map_or(1, char::len_utf8);
                    from = start + step;
                }
                matches
            }
            TextPattern::Regex(regex) => regex
                .find_iter(haystack)
                .map(|m| PatternMatch {
                    start: m.start(),
                    end: m.end(),
                })
                .collect(),
        }
    }

    /// Source text of the pattern, for messages.
    pub fn as_str(&self) -> &str {
        match self {
            TextPattern::Literal(text) => text,
            TextPattern::Regex(regex) => regex.as_str(),
        }
    }
}

impl From<&str> for TextPattern {
    fn from(text: &str) -> Self {
        TextPattern::Literal(text.to_string())
    }
}

impl From<String> for TextPattern {
    fn from(text: String) -> Self {
        TextPattern::Literal(text)
    }
}

impl From<Regex> for TextPattern {
    fn from(regex: Regex) -> Self {
        TextPattern::Regex(regex)
    }
}

impl std::fmt::Display for TextPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextPattern::Literal(text) => write!(f, "{text}"),
            TextPattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}
