//! Screen model abstraction consumed by sessions.
//!
//! A [`ScreenModel`] turns a byte stream into queryable terminal state. Rows
//! are addressed in buffer coordinates: row 0 is the oldest retained
//! scrollback line and the visible screen starts at
//! [`ScreenModel::viewport_offset`].

use termpilot_core::{Cell, CursorPosition, Dimensions};
use tracing::debug;

use crate::parser::{OobHandler, Parser};

/// Callback run once a written chunk has been applied.
pub type AppliedCallback = Box<dyn FnOnce() + Send>;

/// Terminal state fed by a byte stream.
pub trait ScreenModel: Send {
    /// Apply `bytes`, then run `on_applied`.
    ///
    /// Implementations may apply asynchronously, but must run `on_applied`
    /// exactly once per call and in write order.
    fn write(&mut self, bytes: &[u8], on_applied: AppliedCallback);

    /// Change the visible size.
    fn resize(&mut self, dimensions: Dimensions);

    /// Visible size.
    fn dimensions(&self) -> Dimensions;

    /// Cursor in buffer coordinates.
    fn cursor(&self) -> CursorPosition;

    /// Cells of buffer row `index`, if retained.
    fn line(&self, index: usize) -> Option<&[Cell]>;

    /// Buffer row of the first visible line.
    fn viewport_offset(&self) -> usize;

    /// Number of retained rows, scrollback included.
    fn buffer_len(&self) -> usize;

    /// Whether the alternate screen is active.
    fn is_alternate_screen(&self) -> bool;

    /// Register an out-of-band sequence handler for `code`.
    ///
    /// Handlers for the same code are tried newest first until one returns
    /// `true`.
    fn register_oob_handler(&mut self, code: u16, handler: OobHandler);

    /// Release resources. Later writes are ignored.
    fn dispose(&mut self);
}

/// [`ScreenModel`] backed by the `vte` parser and in-memory grids.
///
/// Writes are applied synchronously, so `on_applied` runs before `write`
/// returns.
pub struct VtScreen {
    parser: Parser,
    disposed: bool,
}

impl std::fmt::Debug for VtScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VtScreen")
            .field("dimensions", &self.dimensions())
            .field("alternate_screen", &self.is_alternate_screen())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl VtScreen {
    /// Blank screen of `dimensions` keeping up to `scrollback` lines of
    /// history.
    pub fn new(dimensions: Dimensions, scrollback: usize) -> Self {
        Self {
            parser: Parser::new(dimensions, scrollback),
            disposed: false,
        }
    }

    /// Plain text of the visible screen, one line per row.
    pub fn visible_text(&self) -> String {
        self.parser.terminal().active().to_plain_text()
    }
}

impl ScreenModel for VtScreen {
    fn write(&mut self, bytes: &[u8], on_applied: AppliedCallback) {
        if self.disposed {
            debug!("Dropping {} bytes written to disposed screen", bytes.len());
        } else {
            self.parser.process(bytes);
        }
        on_applied();
    }

    fn resize(&mut self, dimensions: Dimensions) {
        if self.disposed {
            return;
        }
        self.parser.terminal_mut().resize(dimensions);
    }

    fn dimensions(&self) -> Dimensions {
        self.parser.terminal().active().dimensions()
    }

    fn cursor(&self) -> CursorPosition {
        let grid = self.parser.terminal().active();
        let cursor = grid.cursor();
        CursorPosition {
            x: cursor.col as usize,
            y: grid.base() + cursor.row as usize,
        }
    }

    fn line(&self, index: usize) -> Option<&[Cell]> {
        self.parser.terminal().active().line(index)
    }

    fn viewport_offset(&self) -> usize {
        self.parser.terminal().active().base()
    }

    fn buffer_len(&self) -> usize {
        self.parser.terminal().active().len()
    }

    fn is_alternate_screen(&self) -> bool {
        self.parser.terminal().is_alternate_screen()
    }

    fn register_oob_handler(&mut self, code: u16, handler: OobHandler) {
        if self.disposed {
            return;
        }
        self.parser
            .terminal_mut()
            .register_oob_handler(code, handler);
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.parser.terminal_mut().clear_oob_handlers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use termpilot_core::render_cells;

    fn write(screen: &mut VtScreen, bytes: &[u8]) {
        screen.write(bytes, Box::new(|| {}));
    }

    fn row_text(screen: &VtScreen, index: usize) -> String {
        render_cells(screen.line(index).unwrap_or(&[]), true)
    }

    #[test]
    fn test_on_applied_runs_once_per_write() {
        let mut screen = VtScreen::new(Dimensions::new(5, 20), 10);
        let count = Arc::new(AtomicUsize::new(0));
        for chunk in [&b"a"[..], b"b", b"c"] {
            let count = Arc::clone(&count);
            screen.write(
                chunk,
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(row_text(&screen, 0), "abc");
    }

    #[test]
    fn test_cursor_is_absolute_after_scroll() {
        let mut screen = VtScreen::new(Dimensions::new(3, 20), 100);
        write(&mut screen, b"1\r\n2\r\n3\r\n4\r\n5");
        assert_eq!(screen.buffer_len(), 5);
        assert_eq!(screen.viewport_offset(), 2);
        assert_eq!(screen.cursor(), CursorPosition { x: 1, y: 4 });
        assert_eq!(row_text(&screen, 0), "1");
        assert_eq!(row_text(&screen, 4), "5");
        assert!(screen.line(5).is_none());
    }

    #[test]
    fn test_scrollback_capacity() {
        let mut screen = VtScreen::new(Dimensions::new(2, 10), 3);
        for i in 0..10 {
            write(&mut screen, format!("{i}\r\n").as_bytes());
        }
        assert_eq!(screen.buffer_len(), 5);
        assert_eq!(screen.viewport_offset(), 3);
    }

    #[test]
    fn test_alternate_screen_has_no_scrollback() {
        let mut screen = VtScreen::new(Dimensions::new(3, 10), 100);
        write(&mut screen, b"a\r\nb\r\nc\r\nd");
        assert_eq!(screen.viewport_offset(), 1);

        write(&mut screen, b"\x1b[?1049h");
        assert!(screen.is_alternate_screen());
        assert_eq!(screen.viewport_offset(), 0);
        assert_eq!(screen.buffer_len(), 3);

        write(&mut screen, b"\x1b[?1049l");
        assert!(!screen.is_alternate_screen());
        assert_eq!(row_text(&screen, 3), "d");
    }

    #[test]
    fn test_oob_handler_receives_payload() {
        let mut screen = VtScreen::new(Dimensions::new(3, 20), 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        screen.register_oob_handler(
            133,
            Box::new(move |payload| {
                sink.lock().unwrap().push(payload.to_string());
                true
            }),
        );
        write(&mut screen, b"x\x1b]133;D;0\x07y");
        assert_eq!(*seen.lock().unwrap(), vec!["D;0"]);
        assert_eq!(row_text(&screen, 0), "xy");
    }

    #[test]
    fn test_resize_updates_dimensions() {
        let mut screen = VtScreen::new(Dimensions::new(3, 20), 10);
        screen.resize(Dimensions::new(5, 30));
        assert_eq!(screen.dimensions(), Dimensions::new(5, 30));
    }

    #[test]
    fn test_disposed_screen_ignores_writes_but_completes() {
        let mut screen = VtScreen::new(Dimensions::new(3, 20), 10);
        screen.dispose();
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        screen.write(
            b"ignored",
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(screen.visible_text().trim(), "");
    }

    #[test]
    fn test_clear_screen_keeps_cursor_position() {
        let mut screen = VtScreen::new(Dimensions::new(5, 20), 10);
        write(&mut screen, b"\r\n\r\nabc\x1b[2J");
        assert_eq!(screen.cursor(), CursorPosition { x: 3, y: 2 });
        assert_eq!(screen.visible_text().trim(), "");
    }

    #[test]
    fn test_debug_reports_geometry() {
        let screen = VtScreen::new(Dimensions::new(4, 12), 10);
        let debug = format!("{screen:?}");
        assert!(debug.starts_with("VtScreen"));
        assert!(debug.contains("rows: 4"));
        assert!(debug.contains("disposed: false"));
    }
}
