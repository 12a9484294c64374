//! # termpilot-session
//!
//! Session coordination for termpilot.
//!
//! This crate provides:
//! - Sessions binding a transport to a screen model, with drain tracking
//! - Shell-integration marker decoding and script injection
//! - The snapshot engine
//! - Text, change, stable and silence waits
//! - Locator helpers over snapshots
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on termpilot-core
//! and termpilot-emulator to coordinate terminal sessions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod drain;
pub mod locator;
pub mod session;
pub mod shell;
pub mod snapshot;
pub mod wait;

// Re-export commonly used types
pub use drain::DrainTracker;
pub use locator::{crop_text, find_text, TextMatch};
pub use session::{Session, SessionOptions, DEFAULT_SCROLLBACK};
pub use shell::{
    encode_script_for_shell, integration_script, BASH_INTEGRATION_SCRIPT,
    DEFAULT_VERIFY_TIMEOUT, PWSH_INTEGRATION_SCRIPT,
};
pub use snapshot::{range_bounds, LineContext, LineFormatter, SnapshotOptions};
pub use wait::{
    WaitOptions, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DURATION, DEFAULT_WAIT_TIMEOUT,
};
