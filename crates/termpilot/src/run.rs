//! Structured command runs.
//!
//! `run()` executes one command line and waits for the shell to report
//! completion through an `OSC 133 ; D` marker. Without shell integration the
//! run ends at its timeout, as a fallback completion or as an error in
//! strict mode.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use termpilot_core::{Error, Result, ShellIntegrationKind, Snapshot, SnapshotRange};

use crate::driver::Driver;

/// Longest drain before the post-run snapshot.
pub const RUN_SNAPSHOT_DRAIN_BUDGET: Duration = Duration::from_millis(250);

lazy_static! {
    static ref OSC_SEQUENCE: Regex =
        Regex::new(r"(?s)\x1b\].*?(?:\x07|\x1b\\)").expect("valid OSC pattern");
    static ref CSI_SEQUENCE: Regex =
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("valid CSI pattern");
    static ref SHORT_ESCAPE: Regex = Regex::new(r"\x1b[@-Z\\\]^_]").expect("valid escape pattern");
}

/// Remove OSC, CSI and two-character escape sequences, in that order.
pub fn strip_ansi(input: &str) -> String {
    let text = OSC_SEQUENCE.replace_all(input, "");
    let text = CSI_SEQUENCE.replace_all(&text, "");
    SHORT_ESCAPE.replace_all(&text, "").into_owned()
}

/// Snapshot taken after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// Visible rows
    #[default]
    Viewport,
    /// Whole buffer including scrollback
    All,
    /// No snapshot
    None,
}

impl SnapshotMode {
    /// Range to capture, if any.
    pub fn range(self) -> Option<SnapshotRange> {
        match self {
            SnapshotMode::Viewport => Some(SnapshotRange::Viewport),
            SnapshotMode::All => Some(SnapshotRange::All),
            SnapshotMode::None => None,
        }
    }
}

/// How a run was judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum CompletionMethod {
    /// A command-finished marker arrived
    #[serde(rename = "osc133")]
    Osc133,
    /// The timeout expired
    #[serde(rename = "fallback")]
    Fallback,
}

/// Options for [`Driver::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Completion timeout; the driver default when unset
    pub timeout: Option<Duration>,
    /// Fail instead of falling back when no marker arrives
    pub strict: bool,
    /// Snapshot to take afterwards
    pub snapshot: SnapshotMode,
}

impl RunOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail on timeout.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set the snapshot mode.
    pub fn with_snapshot(mut self, mode: SnapshotMode) -> Self {
        self.snapshot = mode;
        self
    }
}

/// Metadata for a [`RunResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunMeta {
    /// How completion was detected
    pub method: CompletionMethod,
    /// Snapshot mode used
    pub snapshot_mode: SnapshotMode,
    /// Whether a shell-integration marker ended the run
    pub shell_integration_used: bool,
}

/// Outcome of [`Driver::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunResult {
    /// Exit status from the command-finished marker
    pub exit_code: Option<f64>,
    /// Output with escape sequences removed
    pub output_text: String,
    /// Output as received
    pub output_raw: String,
    /// Screen after the run
    pub snapshot: Option<Snapshot>,
    /// Time from submission to result
    pub duration_ms: u64,
    /// How the result was produced
    pub meta: RunMeta,
}

struct RunCapture {
    raw: Vec<u8>,
    done: bool,
    exit_code: Option<f64>,
    method: CompletionMethod,
}

fn lock(capture: &Mutex<RunCapture>) -> MutexGuard<'_, RunCapture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Driver {
    /// Execute `command` and wait for it to finish.
    ///
    /// The queue slot is reserved when this is called, so runs started in
    /// sequence write their commands in that order.
    pub fn run(
        &self,
        command: &str,
        options: RunOptions,
    ) -> impl Future<Output = Result<RunResult>> + '_ {
        let ticket = self.queue.ticket();
        let command = command.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.run_admitted(&command, options).await
        }
    }

    async fn run_admitted(&self, command: &str, options: RunOptions) -> Result<RunResult> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        info!(
            "Running command: id={}, command={:?}, timeout={}ms",
            self.session.id(),
            command,
            timeout.as_millis()
        );

        let capture = Arc::new(Mutex::new(RunCapture {
            raw: Vec::new(),
            done: false,
            exit_code: None,
            method: CompletionMethod::Fallback,
        }));
        let finished = Arc::new(Notify::new());

        let output_sub = {
            let capture = Arc::clone(&capture);
            self.session.on_output(move |chunk| {
                let mut capture = lock(&capture);
                if !capture.done {
                    capture.raw.extend_from_slice(chunk);
                }
            })
        };
        let shell_sub = {
            let capture = Arc::clone(&capture);
            let finished = Arc::clone(&finished);
            self.session.on_shell_integration(move |event| {
                if event.kind != ShellIntegrationKind::CommandFinished {
                    return;
                }
                {
                    let mut capture = lock(&capture);
                    if capture.done {
                        return;
                    }
                    capture.done = true;
                    capture.exit_code = event.exit_code();
                    capture.method = CompletionMethod::Osc133;
                }
                finished.notify_one();
            })
        };

        self.session.execute_line(command);

        let timed_out = tokio::time::timeout(timeout, finished.notified())
            .await
            .is_err();
        let timed_out = {
            let mut capture = lock(&capture);
            if timed_out && !capture.done {
                capture.done = true;
                true
            } else {
                false
            }
        };
        output_sub.unsubscribe();
        shell_sub.unsubscribe();

        if timed_out {
            if options.strict {
                warn!(
                    "Run timed out: id={}, command={:?}",
                    self.session.id(),
                    command
                );
                return Err(Error::timeout("run", timeout));
            }
            debug!("Run completed by fallback: id={}", self.session.id());
        }

        let snapshot = match options.snapshot.range() {
            Some(range) => {
                let remaining = timeout.saturating_sub(start.elapsed());
                self.best_effort_drain(remaining.min(RUN_SNAPSHOT_DRAIN_BUDGET))
                    .await;
                Some(self.session.snapshot_range(range))
            }
            None => None,
        };

        let (raw, exit_code, method) = {
            let mut capture = lock(&capture);
            (
                std::mem::take(&mut capture.raw),
                capture.exit_code,
                capture.method,
            )
        };
        let output_raw = String::from_utf8_lossy(&raw).into_owned();

        Ok(RunResult {
            exit_code,
            output_text: strip_ansi(&output_raw),
            output_raw,
            snapshot,
            duration_ms: start.elapsed().as_millis() as u64,
            meta: RunMeta {
                method,
                snapshot_mode: options.snapshot,
                shell_integration_used: method == CompletionMethod::Osc133,
            },
        })
    }
}
