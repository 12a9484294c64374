//! Integration tests for sessions driven through the memory transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use termpilot_core::{
    Dimensions, Rect, ShellIntegrationKind, SnapshotRange, TextPattern,
};
use termpilot_emulator::MemoryTransport;
use termpilot_session::{crop_text, find_text, Session, SessionOptions, WaitOptions};

fn session(rows: u16, cols: u16) -> (Session, MemoryTransport) {
    let transport = MemoryTransport::new();
    let session = Session::new(
        Arc::new(transport.clone()),
        SessionOptions {
            dimensions: Dimensions::new(rows, cols),
            scrollback: 1000,
        },
    );
    session.spawn().unwrap();
    (session, transport)
}

#[tokio::test]
async fn test_echo_round_trip_reaches_snapshot() {
    let transport = MemoryTransport::echo();
    let session = Session::new(Arc::new(transport), SessionOptions::default());
    session.spawn().unwrap();

    session.execute_line("echo ABC");
    session.drain().await;
    session
        .wait_for_text(&TextPattern::literal("echo ABC"), WaitOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_split_osc_sequence_is_decoded_once() {
    let (session, transport) = session(5, 40);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = session.on_shell_integration(move |event| sink.lock().unwrap().push(event.clone()));

    transport.emit("out\x1b]13");
    transport.emit("3;D;");
    transport.emit("7\x07");

    let events = seen.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ShellIntegrationKind::CommandFinished);
    assert_eq!(events[0].exit_code(), Some(7.0));
    assert_eq!(session.snapshot().lines().next(), Some("out"));
}

#[tokio::test]
async fn test_dispose_releases_pending_drain() {
    let transport = MemoryTransport::new();
    let session = Session::with_screen(
        Arc::new(transport.clone()),
        Box::new(DeferredScreen::default()),
    );
    session.spawn().unwrap();
    transport.emit("never applied");
    assert_eq!(session.pending_writes(), 1);

    let session = Arc::new(session);
    let waiter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.drain().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    session.dispose();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_locators_over_scrolled_output() {
    let (session, transport) = session(3, 20);
    transport.emit("0123456789\r\nabcdefghij\r\nline three\r\nline four");

    let viewport = session.snapshot();
    assert_eq!(viewport.text, "abcdefghij\nline three\nline four");

    let all = session.snapshot_range(SnapshotRange::All);
    assert_eq!(crop_text(&all, Rect::new(7, 0, 3, 2)), "789\nhij");

    let matches = find_text(&all, &TextPattern::literal("line"));
    let rows: Vec<_> = matches.iter().map(|m| m.y).collect();
    assert_eq!(rows, vec![2, 3]);
}

/// Screen model that never reports chunks as applied.
#[derive(Default)]
struct DeferredScreen {
    held: Vec<termpilot_emulator::AppliedCallback>,
}

impl termpilot_emulator::ScreenModel for DeferredScreen {
    fn write(&mut self, _bytes: &[u8], on_applied: termpilot_emulator::AppliedCallback) {
        self.held.push(on_applied);
    }

    fn resize(&mut self, _dimensions: Dimensions) {}

    fn dimensions(&self) -> Dimensions {
        Dimensions::default()
    }

    fn cursor(&self) -> termpilot_core::CursorPosition {
        termpilot_core::CursorPosition::default()
    }

    fn line(&self, _index: usize) -> Option<&[termpilot_core::Cell]> {
        None
    }

    fn viewport_offset(&self) -> usize {
        0
    }

    fn buffer_len(&self) -> usize {
        0
    }

    fn is_alternate_screen(&self) -> bool {
        false
    }

    fn register_oob_handler(&mut self, _code: u16, _handler: termpilot_emulator::OobHandler) {}

    fn dispose(&mut self) {}
}
