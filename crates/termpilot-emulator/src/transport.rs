//! Byte-stream transport between a session and a child process.
//!
//! A transport owns the process side of a terminal: it spawns the child,
//! accepts input bytes, reports output chunks and the exit status to its
//! listeners, and follows resize requests. Sessions only talk to the
//! [`Transport`] trait, so a pseudo-terminal and an in-memory fake are
//! interchangeable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use termpilot_core::{Dimensions, Result, Subscription, TransportConfig};

use crate::pty::LocalPty;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code reported by the platform
    pub code: u32,
    /// Signal that terminated the process, when known
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Exit status with a code and no signal.
    pub fn with_code(code: u32) -> Self {
        Self { code, signal: None }
    }

    /// True for a zero exit code without a signal.
    pub fn success(&self) -> bool {
        self.code == 0 && self.signal.is_none()
    }
}

/// Data listener callback type.
pub type DataListener = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Exit listener callback type.
pub type ExitListener = Box<dyn Fn(&ExitStatus) + Send + Sync>;

/// Contract between a session and the process it drives.
///
/// Output chunks are delivered to data listeners in the order the process
/// produced them. After `dispose()` no further events are delivered and
/// every other operation fails or does nothing.
pub trait Transport: Send + Sync {
    /// Start the child process.
    ///
    /// Fails with `TransportAlreadySpawned` on a second call and with
    /// `TransportDisposed` after disposal.
    fn spawn(&self) -> Result<()>;

    /// Send input bytes to the child.
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Propagate a terminal size change to the child.
    fn resize(&self, dimensions: Dimensions) -> Result<()>;

    /// Register an output listener.
    fn on_data(&self, listener: DataListener) -> Subscription;

    /// Register an exit listener.
    fn on_exit(&self, listener: ExitListener) -> Subscription;

    /// Kill the child if it is running and drop every listener.
    fn dispose(&self);

    /// Operating-system process id, once spawned.
    fn id(&self) -> Option<u32>;

    /// Short name of the child program, used for shell detection.
    fn process_name(&self) -> String;
}

/// Build the transport selected by `config`.
///
/// The returned transport is not spawned yet.
pub fn create_transport(
    config: &TransportConfig,
    dimensions: Dimensions,
    term: &str,
) -> Result<Arc<dyn Transport>> {
    match config {
        TransportConfig::LocalPty {
            program,
            args,
            cwd,
            env,
        } => {
            let mut pty = LocalPty::new(program.clone(), dimensions)
                .with_args(args.clone())
                .with_env("TERM", term);
            if let Some(dir) = cwd {
                pty = pty.with_cwd(dir);
            }
            for (key, value) in env {
                pty = pty.with_env(key, value);
            }
            Ok(Arc::new(pty))
        }
    }
}
