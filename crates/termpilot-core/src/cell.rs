//! Cell and color types for screen buffers, plus line rendering.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Terminal color supporting ANSI, 256-color palette, and true RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default terminal color
    #[default]
    Default,
    /// Standard or bright ANSI color (0-15)
    Ansi(u8),
    /// 256-color palette index
    Indexed(u8),
    /// True color RGB (24-bit)
    Rgb {
        /// Red component
        r: u8,
        /// Green component
        g: u8,
        /// Blue component
        b: u8,
    },
}

/// Text attributes for a terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellAttributes {
    /// Bold/bright text
    pub bold: bool,
    /// Dimmed text
    pub dim: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
    /// Blinking text
    pub blink: bool,
    /// Reverse video (swap fg/bg)
    pub reverse: bool,
    /// Hidden text
    pub hidden: bool,
    /// Strikethrough text
    pub strikethrough: bool,
}

impl CellAttributes {
    /// Check if attributes are all default (no formatting).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Single character cell in a screen buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Unicode character (space if empty)
    pub character: char,
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Text attributes
    pub attrs: CellAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttributes::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(character: char) -> Self {
        Self {
            character,
            ..Default::default()
        }
    }

    /// Blank cell carrying the given background, as produced by erase operations.
    pub fn blank(bg: Color) -> Self {
        Self {
            bg,
            ..Default::default()
        }
    }

    /// Check if cell is empty (space with default attributes).
    pub fn is_empty(&self) -> bool {
        self.character == ' ' && self.attrs.is_default()
    }
}

/// Render a row of cells to a string.
///
/// With `trim_end`, trailing whitespace is removed, which is how snapshots
/// render rows by default.
pub fn render_cells(cells: &[Cell], trim_end: bool) -> String {
    let line: String = cells.iter().map(|cell| cell.character).collect();
    if trim_end {
        line.trim_end().to_string()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(text: &str) -> Vec<Cell> {
        text.chars().map(Cell::new).collect()
    }

    #[test]
    fn test_color_serialization() {
        let color = Color::Rgb {
            r: 255,
            g: 128,
            b: 0,
        };
        let json = serde_json::to_string(&color).unwrap();
        let deserialized: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(color, deserialized);
        assert_eq!(serde_json::to_string(&Color::Default).unwrap(), "\"default\"");
    }

    #[test]
    fn test_cell_default() {
        let cell = Cell::default();
        assert_eq!(cell.character, ' ');
        assert_eq!(cell.fg, Color::Default);
        assert!(cell.attrs.is_default());
        assert!(cell.is_empty());
    }

    #[test]
    fn test_cell_blank_keeps_background() {
        let cell = Cell::blank(Color::Ansi(4));
        assert_eq!(cell.character, ' ');
        assert_eq!(cell.bg, Color::Ansi(4));
    }

    #[test]
    fn test_render_cells_trims_trailing_whitespace() {
        let row = cells("$ ls   ");
        assert_eq!(render_cells(&row, true), "$ ls");
        assert_eq!(render_cells(&row, false), "$ ls   ");
    }

    #[test]
    fn test_render_cells_keeps_leading_whitespace() {
        assert_eq!(render_cells(&cells("  x "), true), "  x");
        assert_eq!(render_cells(&[], true), "");
    }
}
