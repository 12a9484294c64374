//! Screen buffer with scrollback and cursor tracking.
//!
//! A [`Grid`] stores every retained line, oldest first. The last
//! `dimensions.rows` lines are the visible screen; anything above them is
//! scrollback, capped at the limit given at construction.

use std::collections::VecDeque;

use termpilot_core::{Cell, CellAttributes, Color, Dimensions};

/// Cursor state, relative to the top of the visible screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Visible row (0-based)
    pub row: u16,
    /// Column (0-based)
    pub col: u16,
    /// Visibility
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            visible: true,
        }
    }
}

/// Screen buffer state.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Retained lines, oldest first
    lines: VecDeque<Vec<Cell>>,
    /// Visible size
    dimensions: Dimensions,
    /// Maximum number of lines kept above the visible screen
    scrollback_limit: usize,
    /// Cursor state
    cursor: Cursor,
    /// Saved cursor (for save/restore operations)
    saved_cursor: Option<Cursor>,
    /// Last print hit the right margin; the next print wraps first
    wrap_pending: bool,
    /// Current cell attributes for new characters
    current_attrs: CellAttributes,
    /// Current foreground color
    current_fg: Color,
    /// Current background color
    current_bg: Color,
}

fn blank_line(cols: u16, bg: Color) -> Vec<Cell> {
    vec![Cell::blank(bg); cols as usize]
}

impl Grid {
    /// Create a new grid with the given dimensions and scrollback capacity.
    pub fn new(dimensions: Dimensions, scrollback_limit: usize) -> Self {
        let lines = (0..dimensions.rows)
            .map(|_| blank_line(dimensions.cols, Color::Default))
            .collect();
        Self {
            lines,
            dimensions,
            scrollback_limit,
            cursor: Cursor::default(),
            saved_cursor: None,
            wrap_pending: false,
            current_attrs: CellAttributes::default(),
            current_fg: Color::Default,
            current_bg: Color::Default,
        }
    }

    /// Get dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of retained lines, scrollback included.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false: a grid holds at least its visible rows.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the first visible line.
    pub fn base(&self) -> usize {
        self.lines.len().saturating_sub(self.dimensions.rows as usize)
    }

    /// Number of scrollback lines currently retained.
    pub fn scrollback_len(&self) -> usize {
        self.base()
    }

    /// Line by absolute index (0 is the oldest retained line).
    pub fn line(&self, index: usize) -> Option<&[Cell]> {
        self.lines.get(index).map(Vec::as_slice)
    }

    /// Visible row as a slice.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.dimensions.rows {
            self.line(self.base() + row as usize)
        } else {
            None
        }
    }

    /// Get cell at a visible position.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.row(row)?.get(col as usize)
    }

    /// Get mutable cell at a visible position.
    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        if row >= self.dimensions.rows {
            return None;
        }
        let index = self.base() + row as usize;
        self.lines.get_mut(index)?.get_mut(col as usize)
    }

    fn row_mut(&mut self, row: u16) -> Option<&mut Vec<Cell>> {
        if row >= self.dimensions.rows {
            return None;
        }
        let index = self.base() + row as usize;
        self.lines.get_mut(index)
    }

    /// Visible screen as plain text, trailing whitespace trimmed per line.
    pub fn to_plain_text(&self) -> String {
        (0..self.dimensions.rows)
            .filter_map(|row| self.row(row))
            .map(|cells| termpilot_core::render_cells(cells, true))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get cursor reference.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Get mutable cursor reference.
    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Cursor row as an absolute line index.
    pub fn cursor_line(&self) -> usize {
        self.base() + self.cursor.row as usize
    }

    /// Get current cell attributes.
    pub fn current_attrs(&self) -> &CellAttributes {
        &self.current_attrs
    }

    /// Set current cell attributes.
    pub fn set_current_attrs(&mut self, attrs: CellAttributes) {
        self.current_attrs = attrs;
    }

    /// Get current foreground color.
    pub fn current_fg(&self) -> Color {
        self.current_fg
    }

    /// Set current foreground color.
    pub fn set_current_fg(&mut self, color: Color) {
        self.current_fg = color;
    }

    /// Get current background color.
    pub fn current_bg(&self) -> Color {
        self.current_bg
    }

    /// Set current background color.
    pub fn set_current_bg(&mut self, color: Color) {
        self.current_bg = color;
    }

    /// Reset attributes and colors to defaults.
    pub fn reset_pen(&mut self) {
        self.current_attrs = CellAttributes::default();
        self.current_fg = Color::Default;
        self.current_bg = Color::Default;
    }

    /// Write a character at the cursor using the current pen and advance.
    pub fn put_char(&mut self, c: char) {
        if self.wrap_pending {
            self.wrap_pending = false;
            self.cursor.col = 0;
            self.line_feed();
        }

        let Cursor { row, col, .. } = self.cursor;
        let cell = Cell {
            character: c,
            fg: self.current_fg,
            bg: self.current_bg,
            attrs: self.current_attrs,
        };
        if let Some(target) = self.cell_mut(row, col) {
            *target = cell;
        }

        if col + 1 >= self.dimensions.cols {
            self.wrap_pending = true;
        } else {
            self.cursor.col = col + 1;
        }
    }

    /// Move down one line, scrolling at the bottom of the screen.
    pub fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row + 1 >= self.dimensions.rows {
            self.scroll_up(1);
        } else {
            self.cursor.row += 1;
        }
    }

    /// Move up one line, scrolling content down at the top of the screen.
    pub fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.row == 0 {
            self.insert_lines(1);
        } else {
            self.cursor.row -= 1;
        }
    }

    /// Return to the first column.
    pub fn carriage_return(&mut self) {
        self.wrap_pending = false;
        self.cursor.col = 0;
    }

    /// Scroll the screen up by `n` lines, moving the top lines into scrollback.
    pub fn scroll_up(&mut self, n: u16) {
        for _ in 0..n {
            self.lines
                .push_back(blank_line(self.dimensions.cols, self.current_bg));
        }
        self.trim_scrollback();
    }

    fn trim_scrollback(&mut self) {
        let max = self.dimensions.rows as usize + self.scrollback_limit;
        while self.lines.len() > max {
            self.lines.pop_front();
        }
    }

    /// Place the cursor, clamped to the screen.
    pub fn move_cursor_to(&mut self, row: u16, col: u16) {
        self.wrap_pending = false;
        self.cursor.row = row.min(self.dimensions.rows.saturating_sub(1));
        self.cursor.col = col.min(self.dimensions.cols.saturating_sub(1));
    }

    /// Move the cursor by a signed offset, clamped to the screen.
    pub fn move_cursor_by(&mut self, rows: i32, cols: i32) {
        let clamp = |value: i32| value.clamp(0, i32::from(u16::MAX)) as u16;
        let row = clamp(i32::from(self.cursor.row).saturating_add(rows));
        let col = clamp(i32::from(self.cursor.col).saturating_add(cols));
        self.move_cursor_to(row, col);
    }

    /// Advance to the next tab stop (every 8 columns).
    pub fn tab(&mut self) {
        let next = (self.cursor.col / 8 + 1) * 8;
        self.cursor.col = next.min(self.dimensions.cols.saturating_sub(1));
    }

    fn blank_cells(&mut self, row: u16, cols: std::ops::Range<u16>) {
        let blank = Cell::blank(self.current_bg);
        if let Some(line) = self.row_mut(row) {
            let end = (cols.end as usize).min(line.len());
            let start = (cols.start as usize).min(end);
            line[start..end].fill(blank);
        }
    }

    /// Erase in display: 0 = cursor to end, 1 = start to cursor,
    /// 2 = whole screen, 3 = whole screen and scrollback.
    pub fn erase_in_display(&mut self, mode: u16) {
        let Cursor { row, col, .. } = self.cursor;
        let Dimensions { rows, cols } = self.dimensions;
        match mode {
            0 => {
                self.blank_cells(row, col..cols);
                for r in row + 1..rows {
                    self.blank_cells(r, 0..cols);
                }
            }
            1 => {
                for r in 0..row {
                    self.blank_cells(r, 0..cols);
                }
                self.blank_cells(row, 0..col + 1);
            }
            2 => self.blank_screen(),
            3 => {
                self.blank_screen();
                let base = self.base();
                self.lines.drain(..base);
            }
            _ => {}
        }
    }

    /// Erase in line: 0 = cursor to end, 1 = start to cursor, 2 = whole line.
    pub fn erase_in_line(&mut self, mode: u16) {
        let Cursor { row, col, .. } = self.cursor;
        let cols = self.dimensions.cols;
        match mode {
            0 => self.blank_cells(row, col..cols),
            1 => self.blank_cells(row, 0..col + 1),
            2 => self.blank_cells(row, 0..cols),
            _ => {}
        }
    }

    /// Blank `n` cells starting at the cursor without moving anything.
    pub fn erase_chars(&mut self, n: u16) {
        let Cursor { row, col, .. } = self.cursor;
        self.blank_cells(row, col..col.saturating_add(n));
    }

    /// Insert `n` blank lines at the cursor row, pushing lines below down.
    pub fn insert_lines(&mut self, n: u16) {
        let at = self.cursor_line();
        let bottom = self.lines.len();
        let n = (n as usize).min(bottom - at);
        for _ in 0..n {
            self.lines.remove(bottom - 1);
            self.lines
                .insert(at, blank_line(self.dimensions.cols, self.current_bg));
        }
    }

    /// Delete `n` lines at the cursor row, pulling lines below up.
    pub fn delete_lines(&mut self, n: u16) {
        let at = self.cursor_line();
        let n = (n as usize).min(self.lines.len() - at);
        for _ in 0..n {
            self.lines.remove(at);
            self.lines
                .push_back(blank_line(self.dimensions.cols, self.current_bg));
        }
    }

    /// Insert `n` blank cells at the cursor, shifting the rest of the line right.
    pub fn insert_chars(&mut self, n: u16) {
        let col = self.cursor.col as usize;
        let blank = Cell::blank(self.current_bg);
        let row = self.cursor.row;
        if let Some(line) = self.row_mut(row) {
            let width = line.len();
            let n = (n as usize).min(width.saturating_sub(col));
            line.truncate(width - n);
            line.splice(col..col, std::iter::repeat(blank).take(n));
        }
    }

    /// Delete `n` cells at the cursor, shifting the rest of the line left.
    pub fn delete_chars(&mut self, n: u16) {
        let col = self.cursor.col as usize;
        let blank = Cell::blank(self.current_bg);
        let row = self.cursor.row;
        if let Some(line) = self.row_mut(row) {
            let width = line.len();
            let n = (n as usize).min(width.saturating_sub(col));
            line.drain(col..col + n);
            line.extend(std::iter::repeat(blank).take(n));
        }
    }

    /// Save cursor position.
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor);
    }

    /// Restore cursor position (origin if none saved).
    pub fn restore_cursor(&mut self) {
        let saved = self.saved_cursor.unwrap_or_default();
        self.move_cursor_to(saved.row, saved.col);
        self.cursor.visible = saved.visible;
    }

    /// Blank the visible screen. The cursor and scrollback are kept.
    fn blank_screen(&mut self) {
        for row in 0..self.dimensions.rows {
            self.blank_cells(row, 0..self.dimensions.cols);
        }
    }

    /// Resize the visible screen.
    ///
    /// Lines are truncated or padded to the new width. Shrinking the height
    /// first drops blank lines below the cursor, then pushes top lines into
    /// scrollback. Growing the height adds blank lines at the bottom.
    pub fn resize(&mut self, new_dimensions: Dimensions) {
        let old = self.dimensions;

        if new_dimensions.cols != old.cols {
            for line in self.lines.iter_mut() {
                line.resize(new_dimensions.cols as usize, Cell::default());
            }
        }

        if new_dimensions.rows > old.rows {
            for _ in old.rows..new_dimensions.rows {
                self.lines
                    .push_back(blank_line(new_dimensions.cols, Color::Default));
            }
        } else if new_dimensions.rows < old.rows {
            let mut excess = old.rows - new_dimensions.rows;
            let cursor_line = self.cursor_line();
            while excess > 0
                && self.lines.len() > cursor_line + 1
                && self
                    .lines
                    .back()
                    .is_some_and(|line| line.iter().all(Cell::is_empty))
            {
                self.lines.pop_back();
                excess -= 1;
            }
            self.cursor.row = self.cursor.row.saturating_sub(excess);
        }

        self.dimensions = new_dimensions;
        self.trim_scrollback();
        self.wrap_pending = false;
        self.cursor.row = self.cursor.row.min(new_dimensions.rows.saturating_sub(1));
        self.cursor.col = self.cursor.col.min(new_dimensions.cols.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(grid: &mut Grid, text: &str) {
        for c in text.chars() {
            match c {
                '\n' => {
                    grid.carriage_return();
                    grid.line_feed();
                }
                _ => grid.put_char(c),
            }
        }
    }

    #[test]
    fn test_grid_new() {
        let grid = Grid::new(Dimensions::new(24, 80), 100);
        assert_eq!(grid.len(), 24);
        assert_eq!(grid.base(), 0);
        assert_eq!(grid.row(0).unwrap().len(), 80);
        assert!(grid.row(24).is_none());
    }

    #[test]
    fn test_put_char_and_wrap() {
        let mut grid = Grid::new(Dimensions::new(3, 4), 10);
        write(&mut grid, "abcdef");
        assert_eq!(grid.to_plain_text(), "abcd\nef\n");
        assert_eq!((grid.cursor().row, grid.cursor().col), (1, 2));
    }

    #[test]
    fn test_wrap_is_deferred_at_right_margin() {
        let mut grid = Grid::new(Dimensions::new(3, 4), 10);
        write(&mut grid, "abcd");
        assert_eq!((grid.cursor().row, grid.cursor().col), (0, 3));
        grid.carriage_return();
        write(&mut grid, "X");
        assert_eq!(grid.to_plain_text(), "Xbcd\n\n");
    }

    #[test]
    fn test_line_feed_scrolls_into_scrollback() {
        let mut grid = Grid::new(Dimensions::new(2, 10), 10);
        write(&mut grid, "one\ntwo\nthree");
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.base(), 1);
        assert_eq!(termpilot_core::render_cells(grid.line(0).unwrap(), true), "one");
        assert_eq!(grid.to_plain_text(), "two\nthree");
        assert_eq!(grid.cursor_line(), 2);
    }

    #[test]
    fn test_scrollback_is_capped() {
        let mut grid = Grid::new(Dimensions::new(2, 10), 3);
        for i in 0..20 {
            write(&mut grid, &format!("line{i}\n"));
        }
        assert_eq!(grid.len(), 5);
        assert_eq!(grid.scrollback_len(), 3);
    }

    #[test]
    fn test_erase_in_display_from_cursor() {
        let mut grid = Grid::new(Dimensions::new(3, 5), 0);
        write(&mut grid, "XXXXX\nXXXXX\nXXXXX");
        grid.move_cursor_to(1, 2);
        grid.erase_in_display(0);
        assert_eq!(grid.to_plain_text(), "XXXXX\nXX\n");
    }

    #[test]
    fn test_erase_whole_display_keeps_cursor() {
        let mut grid = Grid::new(Dimensions::new(3, 5), 10);
        write(&mut grid, "abc\ndef");
        grid.move_cursor_to(1, 3);
        grid.erase_in_display(2);
        assert_eq!(grid.to_plain_text(), "\n\n");
        assert_eq!((grid.cursor().row, grid.cursor().col), (1, 3));
    }

    #[test]
    fn test_move_cursor_by_large_offsets_clamps() {
        let mut grid = Grid::new(Dimensions::new(3, 5), 0);
        grid.move_cursor_to(1, 1);
        grid.move_cursor_by(0, i32::MAX);
        assert_eq!(grid.cursor().col, 4);
        grid.move_cursor_by(i32::MAX, i32::MIN);
        assert_eq!((grid.cursor().row, grid.cursor().col), (2, 0));
        grid.move_cursor_by(70_000, 70_000);
        assert_eq!((grid.cursor().row, grid.cursor().col), (2, 4));
    }

    #[test]
    fn test_erase_in_display_scrollback() {
        let mut grid = Grid::new(Dimensions::new(2, 5), 10);
        write(&mut grid, "a\nb\nc\nd");
        assert!(grid.scrollback_len() > 0);
        grid.erase_in_display(3);
        assert_eq!(grid.scrollback_len(), 0);
        assert_eq!(grid.to_plain_text(), "\n");
    }

    #[test]
    fn test_erase_in_line_modes() {
        let mut grid = Grid::new(Dimensions::new(1, 6), 0);
        write(&mut grid, "abcdef");
        grid.move_cursor_to(0, 2);
        grid.erase_in_line(1);
        assert_eq!(grid.to_plain_text(), "   def");
        grid.erase_in_line(2);
        assert_eq!(grid.to_plain_text(), "");
    }

    #[test]
    fn test_insert_and_delete_chars() {
        let mut grid = Grid::new(Dimensions::new(1, 6), 0);
        write(&mut grid, "abcdef");
        grid.move_cursor_to(0, 1);
        grid.insert_chars(2);
        assert_eq!(grid.to_plain_text(), "a  bcd");
        grid.delete_chars(2);
        assert_eq!(grid.to_plain_text(), "abcd");
    }

    #[test]
    fn test_insert_and_delete_lines() {
        let mut grid = Grid::new(Dimensions::new(3, 3), 0);
        write(&mut grid, "a\nb\nc");
        grid.move_cursor_to(1, 0);
        grid.insert_lines(1);
        assert_eq!(grid.to_plain_text(), "a\n\nb");
        grid.delete_lines(1);
        assert_eq!(grid.to_plain_text(), "a\nb\n");
    }

    #[test]
    fn test_reverse_index_at_top_scrolls_down() {
        let mut grid = Grid::new(Dimensions::new(2, 3), 0);
        write(&mut grid, "a\nb");
        grid.move_cursor_to(0, 0);
        grid.reverse_index();
        assert_eq!(grid.to_plain_text(), "\na");
    }

    #[test]
    fn test_cursor_save_restore() {
        let mut grid = Grid::new(Dimensions::new(24, 80), 0);
        grid.move_cursor_to(5, 10);
        grid.save_cursor();
        grid.move_cursor_to(0, 0);
        grid.restore_cursor();
        assert_eq!((grid.cursor().row, grid.cursor().col), (5, 10));
    }

    #[test]
    fn test_resize_width_preserves_content() {
        let mut grid = Grid::new(Dimensions::new(2, 6), 0);
        write(&mut grid, "abcdef");
        grid.resize(Dimensions::new(2, 3));
        assert_eq!(grid.to_plain_text(), "abc\n");
        grid.resize(Dimensions::new(2, 8));
        assert_eq!(grid.row(0).unwrap().len(), 8);
    }

    #[test]
    fn test_resize_shrink_drops_blank_bottom_lines_first() {
        let mut grid = Grid::new(Dimensions::new(5, 4), 10);
        write(&mut grid, "a\nb");
        grid.resize(Dimensions::new(2, 4));
        assert_eq!(grid.to_plain_text(), "a\nb");
        assert_eq!(grid.scrollback_len(), 0);
        assert_eq!(grid.cursor().row, 1);
    }

    #[test]
    fn test_resize_shrink_pushes_into_scrollback() {
        let mut grid = Grid::new(Dimensions::new(3, 4), 10);
        write(&mut grid, "a\nb\nc");
        grid.resize(Dimensions::new(1, 4));
        assert_eq!(grid.to_plain_text(), "c");
        assert_eq!(grid.scrollback_len(), 2);
        assert_eq!(grid.cursor().row, 0);
    }

    #[test]
    fn test_resize_grow_adds_rows() {
        let mut grid = Grid::new(Dimensions::new(2, 4), 10);
        write(&mut grid, "a\nb");
        grid.resize(Dimensions::new(4, 4));
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.to_plain_text(), "a\nb\n\n");
    }
}
