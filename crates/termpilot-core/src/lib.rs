//! # termpilot-core
//!
//! Core types for termpilot.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other termpilot crates. It provides:
//!
//! - Geometry types (Dimensions, Rect)
//! - Cell and color types for screen buffers
//! - Key types for input handling
//! - Text patterns for waits and locators
//! - Snapshot values
//! - Shell-integration events
//! - Listener registries and subscriptions
//! - Configuration and error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other termpilot crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod config;
pub mod error;
pub mod geometry;
pub mod integration;
pub mod key;
pub mod listener;
pub mod pattern;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use cell::{render_cells, Cell, CellAttributes, Color};
pub use config::{DriverConfig, ShellIntegrationSettings, TerminalSettings, TransportConfig};
pub use error::{Error, Result};
pub use geometry::{Dimensions, Rect};
pub use integration::{
    parse_exit_code, Shell, ShellIntegrationEvent, ShellIntegrationKind, SHELL_INTEGRATION_OSC,
};
pub use key::Key;
pub use listener::{ListenerRegistry, Subscription};
pub use pattern::{PatternMatch, TextPattern};
pub use session::SessionId;
pub use snapshot::{CursorPosition, RelativeCursor, Snapshot, SnapshotMeta, SnapshotRange};
