//! Action types: post-action wait policy and action results.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use termpilot_core::{Snapshot, SnapshotRange, TextPattern};

/// Default budget for [`WaitSpec::Drain`].
pub const DEFAULT_DRAIN_BUDGET: Duration = Duration::from_millis(50);

/// Upper bound on any drain budget.
pub const MAX_DRAIN_BUDGET: Duration = Duration::from_secs(5);

/// Drain budget before baselines and final snapshots.
pub const SETTLE_DRAIN_BUDGET: Duration = Duration::from_millis(25);

/// What to wait for after an action, before the final snapshot.
///
/// Unset durations fall back to the driver defaults.
#[derive(Debug, Clone)]
pub enum WaitSpec {
    /// Snapshot right away
    None,
    /// Give pending output up to `budget` to reach the screen
    Drain {
        /// Drain budget, capped at five seconds
        budget: Option<Duration>,
    },
    /// Wait for the captured range to differ from its pre-action text
    Change {
        /// Overall timeout
        timeout: Option<Duration>,
        /// Delay between polls
        interval: Option<Duration>,
    },
    /// Wait for the viewport to stop changing
    Stable {
        /// Quiet period
        duration: Option<Duration>,
        /// Overall timeout
        timeout: Option<Duration>,
        /// Delay between polls
        interval: Option<Duration>,
    },
    /// Wait for output to stop arriving
    Silence {
        /// Quiet period
        duration: Option<Duration>,
        /// Overall timeout
        timeout: Option<Duration>,
    },
    /// Wait for a pattern to appear in the viewport
    Text {
        /// Pattern to find
        pattern: TextPattern,
        /// Overall timeout
        timeout: Option<Duration>,
        /// Delay between polls
        interval: Option<Duration>,
    },
}

impl WaitSpec {
    /// Drain with the default budget.
    pub fn drain() -> Self {
        WaitSpec::Drain { budget: None }
    }

    /// Change with default timing.
    pub fn change() -> Self {
        WaitSpec::Change {
            timeout: None,
            interval: None,
        }
    }

    /// Stable with default timing.
    pub fn stable() -> Self {
        WaitSpec::Stable {
            duration: None,
            timeout: None,
            interval: None,
        }
    }

    /// Silence with default timing.
    pub fn silence() -> Self {
        WaitSpec::Silence {
            duration: None,
            timeout: None,
        }
    }

    /// Text with default timing.
    pub fn text(pattern: impl Into<TextPattern>) -> Self {
        WaitSpec::Text {
            pattern: pattern.into(),
            timeout: None,
            interval: None,
        }
    }

    /// Kind reported in result metadata.
    pub fn kind(&self) -> WaitKind {
        match self {
            WaitSpec::None => WaitKind::None,
            WaitSpec::Drain { .. } => WaitKind::Drain,
            WaitSpec::Change { .. } => WaitKind::Change,
            WaitSpec::Stable { .. } => WaitKind::Stable,
            WaitSpec::Silence { .. } => WaitKind::Silence,
            WaitSpec::Text { .. } => WaitKind::Text,
        }
    }
}

/// Wait strategy that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    /// No wait
    None,
    /// Best-effort drain
    Drain,
    /// Screen change
    Change,
    /// Screen stable
    Stable,
    /// Output silence
    Silence,
    /// Text match
    Text,
}

/// High-level action that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Key press
    Press,
    /// Typed text
    Type,
    /// Executed command line
    Execute,
}

/// Options for the `*_and_snapshot` actions.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Wait policy; each action has its own default
    pub wait: Option<WaitSpec>,
    /// Rows to capture
    pub snapshot: SnapshotRange,
}

impl ActionOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait policy.
    pub fn with_wait(mut self, wait: WaitSpec) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Set the snapshot range.
    pub fn with_snapshot(mut self, range: SnapshotRange) -> Self {
        self.snapshot = range;
        self
    }
}

/// Metadata for an [`ActionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionMeta {
    /// Action performed
    pub action: ActionKind,
    /// Wait applied after the action
    pub waited: WaitKind,
    /// Range captured
    pub snapshot_range: SnapshotRange,
}

/// Outcome of an action followed by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionResult {
    /// Screen after the wait
    pub snapshot: Snapshot,
    /// Time from the action to the snapshot
    pub duration_ms: u64,
    /// How the result was produced
    pub meta: ActionMeta,
}
