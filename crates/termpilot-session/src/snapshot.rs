//! Snapshot engine: renders a row range of the screen model into a value.

use std::ops::Range;
use std::sync::Arc;

use termpilot_core::{
    render_cells, Cell, CursorPosition, RelativeCursor, Snapshot, SnapshotMeta, SnapshotRange,
};

use crate::session::Session;

/// Row indices passed to a [`LineFormatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineContext {
    /// Row in buffer coordinates
    pub buffer_row: usize,
    /// Row within the snapshot, starting at 0
    pub snapshot_row: usize,
}

/// Renders one row of cells. Missing rows receive an empty slice.
pub type LineFormatter = Arc<dyn Fn(&[Cell], LineContext) -> String + Send + Sync>;

/// Options for [`Session::snapshot_with`].
#[derive(Clone, Default)]
pub struct SnapshotOptions {
    /// Rows to capture
    pub range: SnapshotRange,
    /// Custom row renderer; defaults to the cell text with trailing
    /// whitespace removed
    pub formatter: Option<LineFormatter>,
}

impl std::fmt::Debug for SnapshotOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotOptions")
            .field("range", &self.range)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

impl SnapshotOptions {
    /// Options for `range` with the default formatter.
    pub fn range(range: SnapshotRange) -> Self {
        Self {
            range,
            formatter: None,
        }
    }

    /// Use `formatter` to render rows.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&[Cell], LineContext) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }
}

/// Buffer rows covered by `range`.
///
/// The viewport spans `rows` lines from `viewport_offset`, cut at the end of
/// the buffer.
pub fn range_bounds(
    range: SnapshotRange,
    viewport_offset: usize,
    rows: usize,
    buffer_len: usize,
) -> Range<usize> {
    match range {
        SnapshotRange::Viewport => {
            let start = viewport_offset;
            let end = buffer_len.min(start + rows);
            start..end.max(start)
        }
        SnapshotRange::All => 0..buffer_len,
    }
}

impl Session {
    /// Snapshot of the visible viewport.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_with(&SnapshotOptions::default())
    }

    /// Snapshot of `range` with the default formatter.
    pub fn snapshot_range(&self, range: SnapshotRange) -> Snapshot {
        self.snapshot_with(&SnapshotOptions::range(range))
    }

    /// Snapshot with explicit options.
    ///
    /// Rows are copied out of the screen before the formatter runs, so a
    /// formatter may call back into the session.
    pub fn snapshot_with(&self, options: &SnapshotOptions) -> Snapshot {
        let (dims, viewport_offset, bounds, rows, cursor, alternate_screen) = {
            let screen = self.screen();
            let dims = screen.dimensions();
            let viewport_offset = screen.viewport_offset();
            let bounds = range_bounds(
                options.range,
                viewport_offset,
                dims.rows as usize,
                screen.buffer_len(),
            );
            let rows: Vec<Vec<Cell>> = bounds
                .clone()
                .map(|buffer_row| {
                    screen
                        .line(buffer_row)
                        .map(<[Cell]>::to_vec)
                        .unwrap_or_default()
                })
                .collect();
            let cursor: CursorPosition = screen.cursor();
            (
                dims,
                viewport_offset,
                bounds,
                rows,
                cursor,
                screen.is_alternate_screen(),
            )
        };

        let lines: Vec<String> = rows
            .iter()
            .zip(bounds.clone())
            .enumerate()
            .map(|(snapshot_row, (cells, buffer_row))| match &options.formatter {
                Some(format) => format(
                    cells,
                    LineContext {
                        buffer_row,
                        snapshot_row,
                    },
                ),
                None => render_cells(cells, true),
            })
            .collect();

        Snapshot {
            text: lines.join("\n"),
            cursor,
            cursor_relative: RelativeCursor {
                x: cursor.x as i64,
                y: cursor.y as i64 - bounds.start as i64,
            },
            meta: SnapshotMeta {
                alternate_screen,
                viewport_offset,
                rows: dims.rows,
                cols: dims.cols,
                start_row: bounds.start,
                end_row: bounds.end,
                range: options.range,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termpilot_core::Dimensions;
    use termpilot_emulator::MemoryTransport;

    use crate::session::SessionOptions;

    fn session(rows: u16, cols: u16) -> (Session, MemoryTransport) {
        let transport = MemoryTransport::new();
        let session = Session::new(
            Arc::new(transport.clone()),
            SessionOptions {
                dimensions: Dimensions::new(rows, cols),
                scrollback: 100,
            },
        );
        session.spawn().unwrap();
        (session, transport)
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(range_bounds(SnapshotRange::Viewport, 0, 24, 24), 0..24);
        assert_eq!(range_bounds(SnapshotRange::Viewport, 10, 24, 30), 10..30);
        assert_eq!(range_bounds(SnapshotRange::Viewport, 5, 3, 2), 5..5);
        assert_eq!(range_bounds(SnapshotRange::All, 10, 24, 34), 0..34);
    }

    #[test]
    fn test_viewport_snapshot_of_fresh_screen() {
        let (session, transport) = session(3, 10);
        transport.emit("hi");
        let snap = session.snapshot();
        assert_eq!(snap.text, "hi\n\n");
        assert_eq!(snap.row_count(), 3);
        assert_eq!(snap.cursor, CursorPosition { x: 2, y: 0 });
        assert_eq!(snap.cursor_relative, RelativeCursor { x: 2, y: 0 });
        assert_eq!(snap.meta.range, SnapshotRange::Viewport);
        assert!(!snap.meta.alternate_screen);
    }

    #[test]
    fn test_all_range_includes_scrollback() {
        let (session, transport) = session(2, 10);
        transport.emit("a\r\nb\r\nc\r\nd");

        let viewport = session.snapshot();
        assert_eq!(viewport.text, "c\nd");
        assert_eq!(viewport.meta.start_row, 2);
        assert_eq!(viewport.meta.viewport_offset, 2);
        assert_eq!(viewport.cursor.y, 3);
        assert_eq!(viewport.cursor_relative.y, 1);

        let all = session.snapshot_range(SnapshotRange::All);
        assert_eq!(all.text, "a\nb\nc\nd");
        assert_eq!(all.meta.start_row, 0);
        assert_eq!(all.meta.end_row, 4);
        assert_eq!(all.cursor_relative.y, 3);
        assert_eq!(all.lines().count(), all.row_count());
    }

    #[test]
    fn test_custom_formatter_receives_indices() {
        let (session, transport) = session(2, 10);
        transport.emit("x\r\ny\r\nz");
        let options = SnapshotOptions::range(SnapshotRange::All).with_formatter(|cells, ctx| {
            format!(
                "{}:{}:{}",
                ctx.buffer_row,
                ctx.snapshot_row,
                render_cells(cells, true)
            )
        });
        let snap = session.snapshot_with(&options);
        assert_eq!(snap.text, "0:0:x\n1:1:y\n2:2:z");
    }

    #[test]
    fn test_formatter_may_query_session() {
        let (session, transport) = session(2, 10);
        let session = Arc::new(session);
        transport.emit("ab");
        let inner = Arc::clone(&session);
        let options = SnapshotOptions::default().with_formatter(move |cells, _| {
            let cols = inner.dimensions().cols;
            format!("{}/{}", render_cells(cells, true), cols)
        });
        let snap = session.snapshot_with(&options);
        assert_eq!(snap.text, "ab/10\n/10");
    }

    #[test]
    fn test_alternate_screen_flag() {
        let (session, transport) = session(3, 10);
        transport.emit("\x1b[?1049hTUI");
        let snap = session.snapshot();
        assert!(snap.meta.alternate_screen);
        assert!(snap.text.starts_with("TUI"));
    }
}
