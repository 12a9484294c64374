//! Snapshot values produced from a screen model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which rows of the screen buffer a snapshot covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotRange {
    /// Visible rows only, sized to the terminal height
    #[default]
    Viewport,
    /// Entire retained buffer including scrollback
    All,
}

/// Absolute cursor position in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct CursorPosition {
    /// Column
    pub x: usize,
    /// Buffer row, counting scrollback
    pub y: usize,
}

/// Cursor position relative to the start of a snapshot's range.
///
/// `y` is negative or past the last row when the cursor lies outside the
/// captured range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct RelativeCursor {
    /// Column
    pub x: i64,
    /// Row relative to `meta.start_row`
    pub y: i64,
}

/// Metadata describing where a snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotMeta {
    /// Whether the alternate screen was active
    pub alternate_screen: bool,
    /// First buffer row of the visible viewport
    pub viewport_offset: usize,
    /// Terminal rows
    pub rows: u16,
    /// Terminal columns
    pub cols: u16,
    /// First buffer row included in the snapshot
    pub start_row: usize,
    /// One past the last buffer row included
    pub end_row: usize,
    /// Range that was requested
    pub range: SnapshotRange,
}

/// Point-in-time rendering of a region of the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Snapshot {
    /// Rendered rows joined with `\n`
    pub text: String,
    /// Absolute cursor position
    pub cursor: CursorPosition,
    /// Cursor relative to the range start
    pub cursor_relative: RelativeCursor,
    /// Range and screen metadata
    pub meta: SnapshotMeta,
}

impl Snapshot {
    /// Number of rows in the captured range.
    pub fn row_count(&self) -> usize {
        self.meta.end_row.saturating_sub(self.meta.start_row)
    }

    /// Iterate over the rendered rows.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            text: "$ echo hi\nhi\n$".to_string(),
            cursor: CursorPosition { x: 2, y: 102 },
            cursor_relative: RelativeCursor { x: 2, y: 2 },
            meta: SnapshotMeta {
                alternate_screen: false,
                viewport_offset: 100,
                rows: 3,
                cols: 80,
                start_row: 100,
                end_row: 103,
                range: SnapshotRange::Viewport,
            },
        }
    }

    #[test]
    fn test_row_count_matches_lines() {
        let snapshot = sample();
        assert_eq!(snapshot.row_count(), 3);
        assert_eq!(snapshot.lines().count(), 3);
    }

    #[test]
    fn test_range_serialization() {
        assert_eq!(
            serde_json::to_string(&SnapshotRange::Viewport).unwrap(),
            "\"viewport\""
        );
        let range: SnapshotRange = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(range, SnapshotRange::All);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["cursor"]["y"], 102);
        assert_eq!(json["cursor_relative"]["y"], 2);
        assert_eq!(json["meta"]["range"], "viewport");
    }
}
