//! Locating text inside snapshots.
//!
//! Coordinates are relative to the snapshot: `y` is a row of
//! [`Snapshot::lines`] and `x` counts characters, not bytes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use termpilot_core::{Rect, Snapshot, TextPattern};

/// One occurrence of a pattern in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TextMatch {
    /// Column of the first matched character
    pub x: usize,
    /// Snapshot row
    pub y: usize,
    /// Matched text
    pub text: String,
}

/// Text inside `rect`, one line per row, joined with `\n`.
///
/// Rows outside the snapshot yield empty lines and columns are cut at the
/// end of each row.
pub fn crop_text(snapshot: &Snapshot, rect: Rect) -> String {
    let lines: Vec<&str> = snapshot.lines().collect();
    (rect.y..rect.y.saturating_add(rect.height))
        .map(|y| match lines.get(y) {
            Some(line) => line.chars().skip(rect.x).take(rect.width).collect(),
            None => String::new(),
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// Every occurrence of `pattern`, row by row.
///
/// Literal occurrences may overlap.
pub fn find_text(snapshot: &Snapshot, pattern: &TextPattern) -> Vec<TextMatch> {
    snapshot
        .lines()
        .enumerate()
        .flat_map(|(y, line)| {
            pattern.find_all(line).into_iter().map(move |m| TextMatch {
                x: line[..m.start].chars().count(),
                y,
                text: line[m.start..m.end].to_string(),
            })
        })
        .collect()
}
