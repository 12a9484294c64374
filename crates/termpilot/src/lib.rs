//! # termpilot
//!
//! Drive interactive terminal processes the way a user would and observe
//! what they render.
//!
//! This crate provides the [`Driver`] facade:
//! - Launching a process behind a local PTY or any other [`Transport`]
//! - Queued key presses, typing and command execution
//! - Actions followed by a wait and a snapshot
//! - Structured command runs completed by `OSC 133` markers
//!
//! ## Architecture
//!
//! This is Layer 3 - the facade and the `termpilot` binary, tying together:
//! - termpilot-core: Core types
//! - termpilot-emulator: Transports and the screen model
//! - termpilot-session: Sessions, snapshots and waits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod driver;
pub mod queue;
pub mod run;

// Re-export commonly used types
pub use action::{
    ActionKind, ActionMeta, ActionOptions, ActionResult, WaitKind, WaitSpec,
    DEFAULT_DRAIN_BUDGET, MAX_DRAIN_BUDGET, SETTLE_DRAIN_BUDGET,
};
pub use driver::{Driver, LaunchOptions, ShellIntegrationOptions, TransportSpec};
pub use queue::{ActionQueue, Permit, Ticket};
pub use run::{
    strip_ansi, CompletionMethod, RunMeta, RunOptions, RunResult, SnapshotMode,
    RUN_SNAPSHOT_DRAIN_BUDGET,
};

pub use termpilot_core::{
    Dimensions, DriverConfig, Error, Rect, Result, Shell, ShellIntegrationEvent,
    ShellIntegrationKind, Snapshot, SnapshotMeta, SnapshotRange, Subscription, TextPattern,
    TransportConfig,
};
pub use termpilot_emulator::{ExitStatus, LocalPty, MemoryTransport, Transport};
pub use termpilot_session::{Session, TextMatch};
