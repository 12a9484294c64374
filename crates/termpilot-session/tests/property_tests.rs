//! Property-based tests for snapshots and locators.
//!
//! Uses proptest to generate random screens and verify range and matching
//! invariants.

use proptest::prelude::*;
use std::sync::Arc;

use termpilot_core::{Dimensions, Rect, SnapshotRange, TextPattern};
use termpilot_emulator::MemoryTransport;
use termpilot_session::{crop_text, find_text, range_bounds, Session, SessionOptions};

/// Generate a random terminal size within reasonable bounds.
fn screen_dimensions() -> impl Strategy<Value = (u16, u16)> {
    (1u16..30, 2u16..100)
}

/// Generate printable output lines.
fn output_lines() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9 ]{0,40}", 0..60)
}

fn session_with(rows: u16, cols: u16, lines: &[String]) -> Session {
    let transport = MemoryTransport::new();
    let session = Session::new(
        Arc::new(transport.clone()),
        SessionOptions {
            dimensions: Dimensions::new(rows, cols),
            scrollback: 20,
        },
    );
    session.spawn().unwrap();
    transport.emit(lines.join("\r\n"));
    session
}

proptest! {
    /// Rendered line count always equals the covered row span.
    #[test]
    fn snapshot_rows_match_range((rows, cols) in screen_dimensions(), lines in output_lines()) {
        let session = session_with(rows, cols, &lines);
        for range in [SnapshotRange::Viewport, SnapshotRange::All] {
            let snap = session.snapshot_range(range);
            prop_assert_eq!(snap.lines().count(), snap.meta.end_row - snap.meta.start_row);
            prop_assert_eq!(
                snap.cursor_relative.y,
                snap.cursor.y as i64 - snap.meta.start_row as i64
            );
        }
    }

    /// The viewport never spans more rows than the terminal height.
    #[test]
    fn viewport_bounded_by_height(
        offset in 0usize..100,
        rows in 1usize..50,
        len in 0usize..200,
    ) {
        let bounds = range_bounds(SnapshotRange::Viewport, offset, rows, len);
        prop_assert!(bounds.end - bounds.start <= rows);
        prop_assert!(bounds.end <= len.max(offset));
    }

    /// Cropping always yields exactly `height` lines.
    #[test]
    fn crop_has_requested_height(
        lines in output_lines(),
        x in 0usize..50,
        y in 0usize..80,
        width in 0usize..50,
        height in 1usize..20,
    ) {
        let session = session_with(24, 80, &lines);
        let snap = session.snapshot();
        let cropped = crop_text(&snap, Rect::new(x, y, width, height));
        prop_assert_eq!(cropped.split('\n').count(), height);
        for line in cropped.split('\n') {
            prop_assert!(line.chars().count() <= width);
        }
    }

    /// Every reported match is found again at its coordinates, and repeated
    /// searches agree.
    #[test]
    fn find_text_is_repeatable(lines in output_lines(), needle in "[a-z]{1,3}") {
        let session = session_with(24, 80, &lines);
        let snap = session.snapshot();
        let pattern = TextPattern::regex(&needle).unwrap();
        let first = find_text(&snap, &pattern);
        prop_assert_eq!(&first, &find_text(&snap, &pattern));
        for m in &first {
            let width = m.text.chars().count();
            prop_assert_eq!(crop_text(&snap, Rect::new(m.x, m.y, width, 1)), m.text.clone());
        }
    }
}
