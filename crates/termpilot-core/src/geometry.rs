//! Geometry types for terminal coordinates and regions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dimensions of a terminal or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Dimensions {
    /// Smallest column count a terminal may be resized to.
    pub const MIN_COLS: u16 = 2;
    /// Smallest row count a terminal may be resized to.
    pub const MIN_ROWS: u16 = 1;

    /// Create new dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Build dimensions from a possibly degenerate request, clamping to the
    /// minimum terminal size and to `u16::MAX`.
    pub fn clamped(cols: i32, rows: i32) -> Self {
        let clamp = |value: i32, min: u16| -> u16 {
            value.clamp(i32::from(min), i32::from(u16::MAX)) as u16
        };
        Self {
            rows: clamp(rows, Self::MIN_ROWS),
            cols: clamp(cols, Self::MIN_COLS),
        }
    }

    /// Total cell count (rows * cols).
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// Formats as `COLSxROWS`, e.g. `80x24`.
impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

/// Rectangular region of a snapshot, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    /// Starting column
    pub x: usize,
    /// Starting row, relative to the snapshot
    pub y: usize,
    /// Width in columns
    pub width: usize,
    /// Height in rows
    pub height: usize,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
