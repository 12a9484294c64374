//! # termpilot-emulator
//!
//! Process transports and the terminal screen model for termpilot.
//!
//! This crate provides:
//! - The [`Transport`] trait with a local PTY and an in-memory implementation
//! - VTE-driven terminal state with scrollback and an alternate screen
//! - The [`ScreenModel`] trait sessions read snapshots from
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on termpilot-core
//! and is consumed by termpilot-session.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod grid;
pub mod memory;
pub mod parser;
pub mod pty;
pub mod screen;
pub mod transport;

// Re-export commonly used types
pub use grid::{Cursor, Grid};
pub use memory::MemoryTransport;
pub use parser::{OobHandler, Parser, Terminal};
pub use pty::LocalPty;
pub use screen::{AppliedCallback, ScreenModel, VtScreen};
pub use transport::{create_transport, DataListener, ExitListener, ExitStatus, Transport};
