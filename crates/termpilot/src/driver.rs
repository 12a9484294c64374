//! The driver: one launched terminal with queued actions.
//!
//! A [`Driver`] owns a [`Session`] and an [`ActionQueue`]. Input actions
//! and runs take their place in the queue when called, so callers that fire
//! several of them without awaiting still see them performed in call order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use termpilot_core::{
    Dimensions, DriverConfig, Error, Rect, Result, Shell, ShellIntegrationEvent, Snapshot,
    SnapshotRange, Subscription, TextPattern, TransportConfig,
};
use termpilot_emulator::{create_transport, ExitStatus, Transport};
use termpilot_session::{
    crop_text, find_text, Session, SessionOptions, TextMatch, WaitOptions, DEFAULT_POLL_INTERVAL,
    DEFAULT_SCROLLBACK, DEFAULT_SETTLE_DURATION, DEFAULT_VERIFY_TIMEOUT, DEFAULT_WAIT_TIMEOUT,
};

use crate::action::{
    ActionKind, ActionMeta, ActionOptions, ActionResult, WaitSpec, DEFAULT_DRAIN_BUDGET,
    MAX_DRAIN_BUDGET, SETTLE_DRAIN_BUDGET,
};
use crate::queue::ActionQueue;

/// Where the driver's process transport comes from.
#[derive(Clone)]
pub enum TransportSpec {
    /// Build a transport from configuration
    Config(TransportConfig),
    /// Use a transport that already exists; it must not be spawned yet
    Instance(Arc<dyn Transport>),
}

impl Default for TransportSpec {
    fn default() -> Self {
        TransportSpec::Config(TransportConfig::default())
    }
}

impl fmt::Debug for TransportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSpec::Config(config) => f.debug_tuple("Config").field(config).finish(),
            TransportSpec::Instance(transport) => f
                .debug_tuple("Instance")
                .field(&transport.process_name())
                .finish(),
        }
    }
}

/// Shell-integration setup performed during launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellIntegrationOptions {
    /// Inject the integration script
    pub enable: bool,
    /// Shell family; guessed from the process name when unset
    pub shell: Option<Shell>,
    /// Fail the launch when verification fails
    pub strict: bool,
    /// How long to wait for the verification sentinel
    pub verify_timeout: Duration,
}

impl Default for ShellIntegrationOptions {
    fn default() -> Self {
        Self {
            enable: false,
            shell: None,
            strict: false,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }
}

/// Options for [`Driver::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Initial terminal size
    pub dimensions: Dimensions,
    /// Scrollback capacity in lines
    pub scrollback: usize,
    /// `TERM` for configured transports
    pub term: String,
    /// Process transport
    pub transport: TransportSpec,
    /// Shell-integration setup
    pub shell_integration: ShellIntegrationOptions,
    /// Default timeout for waits and runs
    pub timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::new(24, 80),
            scrollback: DEFAULT_SCROLLBACK,
            term: "xterm-256color".to_string(),
            transport: TransportSpec::default(),
            shell_integration: ShellIntegrationOptions::default(),
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl LaunchOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from a validated [`DriverConfig`].
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let settings = &config.shell_integration;
        let shell = settings
            .shell
            .as_deref()
            .map(str::parse::<Shell>)
            .transpose()?;

        Ok(Self {
            dimensions: config.terminal.dimensions(),
            scrollback: config.terminal.scrollback_lines,
            term: config.terminal.term.clone(),
            transport: TransportSpec::Config(config.transport.clone()),
            shell_integration: ShellIntegrationOptions {
                enable: settings.enable,
                shell,
                strict: settings.strict,
                verify_timeout: Duration::from_millis(settings.verify_timeout_ms),
            },
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Set the terminal size.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the scrollback capacity.
    pub fn with_scrollback(mut self, lines: usize) -> Self {
        self.scrollback = lines;
        self
    }

    /// Use an existing transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = TransportSpec::Instance(transport);
        self
    }

    /// Build the transport from `config`.
    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = TransportSpec::Config(config);
        self
    }

    /// Set the shell-integration setup.
    pub fn with_shell_integration(mut self, options: ShellIntegrationOptions) -> Self {
        self.shell_integration = options;
        self
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A launched terminal driven through queued actions.
#[derive(Debug)]
pub struct Driver {
    pub(crate) session: Session,
    pub(crate) default_timeout: Duration,
    pub(crate) queue: ActionQueue,
}

impl Driver {
    /// Create the transport and session, spawn the process and optionally
    /// enable shell integration.
    ///
    /// Listeners are wired before the process starts, so no early output is
    /// lost. With strict shell integration a failed verification disposes
    /// the driver and returns [`Error::ShellIntegration`].
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let transport = match &options.transport {
            TransportSpec::Config(config) => {
                create_transport(config, options.dimensions, &options.term)?
            }
            TransportSpec::Instance(transport) => Arc::clone(transport),
        };

        let session = Session::new(
            transport,
            SessionOptions {
                dimensions: options.dimensions,
                scrollback: options.scrollback,
            },
        );
        session.spawn()?;

        info!(
            "Launched driver: id={}, process={}, size={}",
            session.id(),
            session.process_name(),
            options.dimensions
        );

        let driver = Self {
            session,
            default_timeout: options.timeout,
            queue: ActionQueue::new(),
        };

        let integration = &options.shell_integration;
        if integration.enable {
            let ok = driver
                .session
                .enable_shell_integration(integration.shell, integration.verify_timeout)
                .await;
            if !ok && integration.strict {
                driver.dispose();
                return Err(Error::ShellIntegration(
                    "verification sentinel not seen".to_string(),
                ));
            }
        }

        Ok(driver)
    }

    /// Launch from a [`DriverConfig`].
    pub async fn launch_with_config(config: &DriverConfig) -> Result<Self> {
        Self::launch(LaunchOptions::from_config(config)?).await
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Action queue.
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Timeout used when an operation does not set its own.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Send raw bytes, bypassing the queue.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        self.session.write(data);
    }

    /// Resize the terminal; values are clamped to at least 2x1.
    pub fn resize(&self, cols: i32, rows: i32) {
        self.session.resize(cols, rows);
    }

    /// Snapshot of the viewport.
    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    /// Snapshot of `range`.
    pub fn snapshot_range(&self, range: SnapshotRange) -> Snapshot {
        self.session.snapshot_range(range)
    }

    /// Press a key or chord such as `Enter` or `Ctrl+C`.
    pub fn press(&self, key: &str) -> impl Future<Output = ()> + '_ {
        let ticket = self.queue.ticket();
        let key = key.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.session.press_key(&key);
        }
    }

    /// Type `text` verbatim.
    pub fn type_text(&self, text: &str) -> impl Future<Output = ()> + '_ {
        let ticket = self.queue.ticket();
        let text = text.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.session.type_text(&text);
        }
    }

    /// Send `command` followed by Enter.
    pub fn execute(&self, command: &str) -> impl Future<Output = ()> + '_ {
        let ticket = self.queue.ticket();
        let command = command.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.session.execute_line(&command);
        }
    }

    /// Press a key, wait (default: screen change) and snapshot.
    pub fn press_and_snapshot(
        &self,
        key: &str,
        options: ActionOptions,
    ) -> impl Future<Output = Result<ActionResult>> + '_ {
        let ticket = self.queue.ticket();
        let key = key.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.act_and_snapshot(ActionKind::Press, options, WaitSpec::change(), || {
                self.session.press_key(&key)
            })
            .await
        }
    }

    /// Type text, wait (default: drain) and snapshot.
    pub fn type_and_snapshot(
        &self,
        text: &str,
        options: ActionOptions,
    ) -> impl Future<Output = Result<ActionResult>> + '_ {
        let ticket = self.queue.ticket();
        let text = text.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.act_and_snapshot(ActionKind::Type, options, WaitSpec::drain(), || {
                self.session.type_text(&text)
            })
            .await
        }
    }

    /// Execute a command line, wait (default: drain) and snapshot.
    pub fn execute_and_snapshot(
        &self,
        command: &str,
        options: ActionOptions,
    ) -> impl Future<Output = Result<ActionResult>> + '_ {
        let ticket = self.queue.ticket();
        let command = command.to_string();
        async move {
            let _permit = ticket.admitted().await;
            self.act_and_snapshot(ActionKind::Execute, options, WaitSpec::drain(), || {
                self.session.execute_line(&command)
            })
            .await
        }
    }

    async fn act_and_snapshot<F>(
        &self,
        action: ActionKind,
        options: ActionOptions,
        default_wait: WaitSpec,
        act: F,
    ) -> Result<ActionResult>
    where
        F: FnOnce(),
    {
        let wait = options.wait.unwrap_or(default_wait);
        let range = options.snapshot;

        let baseline = match wait {
            WaitSpec::Change { .. } => {
                self.best_effort_drain(SETTLE_DRAIN_BUDGET).await;
                Some(self.session.snapshot_range(range).text)
            }
            _ => None,
        };

        let start = Instant::now();
        act();

        debug!(
            "Action performed: id={}, action={:?}, wait={:?}",
            self.session.id(),
            action,
            wait.kind()
        );
        let waited = wait.kind();
        match wait {
            WaitSpec::None => {}
            WaitSpec::Drain { budget } => {
                let budget = budget.unwrap_or(DEFAULT_DRAIN_BUDGET).min(MAX_DRAIN_BUDGET);
                self.best_effort_drain(budget).await;
            }
            WaitSpec::Change { timeout, interval } => {
                let baseline = baseline.unwrap_or_default();
                self.wait_for_change_from(
                    &baseline,
                    range,
                    timeout.unwrap_or(self.default_timeout),
                    interval.unwrap_or(DEFAULT_POLL_INTERVAL),
                )
                .await?;
            }
            WaitSpec::Stable {
                duration,
                timeout,
                interval,
            } => {
                self.wait_for_stable(duration, timeout, interval).await?;
            }
            WaitSpec::Silence { duration, timeout } => {
                self.wait_for_silence(duration, timeout).await?;
            }
            WaitSpec::Text {
                pattern,
                timeout,
                interval,
            } => {
                self.wait_for_text(&pattern, timeout, interval).await?;
            }
        }

        self.best_effort_drain(SETTLE_DRAIN_BUDGET).await;
        let snapshot = self.session.snapshot_range(range);

        Ok(ActionResult {
            snapshot,
            duration_ms: start.elapsed().as_millis() as u64,
            meta: ActionMeta {
                action,
                waited,
                snapshot_range: range,
            },
        })
    }

    /// Poll `range` until its text differs from `baseline`.
    ///
    /// Each poll first lets pending output reach the screen for up to
    /// `min(interval, 25ms)`.
    async fn wait_for_change_from(
        &self,
        baseline: &str,
        range: SnapshotRange,
        timeout: Duration,
        interval: Duration,
    ) -> Result<()> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            self.best_effort_drain(interval.min(SETTLE_DRAIN_BUDGET))
                .await;
            if self.session.snapshot_range(range).text != baseline {
                debug!("Screen changed: id={}", self.session.id());
                return Ok(());
            }
            sleep(interval).await;
        }
        Err(Error::timeout("wait_for_change", timeout))
    }

    /// Wait for pending output to reach the screen, giving up after
    /// `budget`.
    pub async fn best_effort_drain(&self, budget: Duration) {
        if budget.is_zero() {
            return;
        }
        if tokio::time::timeout(budget, self.session.drain())
            .await
            .is_err()
        {
            debug!(
                "Drain budget spent: id={}, budget={}ms, pending={}",
                self.session.id(),
                budget.as_millis(),
                self.session.pending_writes()
            );
        }
    }

    /// Wait until `pattern` appears in the viewport.
    pub async fn wait_for_text(
        &self,
        pattern: &TextPattern,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<()> {
        self.session
            .wait_for_text(pattern, self.wait_options(timeout, interval))
            .await
    }

    /// Wait until the viewport differs from its current text.
    pub async fn wait_for_change(
        &self,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<()> {
        self.session
            .wait_for_change(self.wait_options(timeout, interval))
            .await
    }

    /// Wait until the viewport stays unchanged for `duration` (default 500ms).
    pub async fn wait_for_stable(
        &self,
        duration: Option<Duration>,
        timeout: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<()> {
        self.session
            .wait_for_stable(
                duration.unwrap_or(DEFAULT_SETTLE_DURATION),
                self.wait_options(timeout, interval),
            )
            .await
    }

    /// Wait until no output arrives for `duration` (default 500ms).
    pub async fn wait_for_silence(
        &self,
        duration: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.session
            .wait_for_silence(
                duration.unwrap_or(DEFAULT_SETTLE_DURATION),
                timeout.unwrap_or(self.default_timeout),
            )
            .await
    }

    fn wait_options(&self, timeout: Option<Duration>, interval: Option<Duration>) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout.unwrap_or(self.default_timeout))
            .with_poll_interval(interval.unwrap_or(DEFAULT_POLL_INTERVAL))
    }

    /// Text of `range`.
    pub fn screen_text(&self, range: SnapshotRange) -> String {
        self.session.snapshot_range(range).text
    }

    /// Whether `pattern` matches the text of `range`.
    pub fn has_text(&self, pattern: &TextPattern, range: SnapshotRange) -> bool {
        pattern.is_match(&self.screen_text(range))
    }

    /// Every occurrence of `pattern` in `range`.
    pub fn find_text(&self, pattern: &TextPattern, range: SnapshotRange) -> Vec<TextMatch> {
        find_text(&self.session.snapshot_range(range), pattern)
    }

    /// Text inside `rect`, in coordinates of `range`.
    pub fn crop_text(&self, rect: Rect, range: SnapshotRange) -> String {
        crop_text(&self.session.snapshot_range(range), rect)
    }

    /// Listen to raw output.
    pub fn on_output<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.session.on_output(listener)
    }

    /// Listen for process exit.
    pub fn on_exit<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExitStatus) + Send + Sync + 'static,
    {
        self.session.on_exit(listener)
    }

    /// Listen for shell-integration events.
    pub fn on_shell_integration<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ShellIntegrationEvent) + Send + Sync + 'static,
    {
        self.session.on_shell_integration(listener)
    }

    /// Resolve once received output has reached the screen.
    pub async fn drain(&self) {
        self.session.drain().await;
    }

    /// Dispose the session and its process. Idempotent.
    pub fn dispose(&self) {
        if !self.session.is_disposed() {
            info!("Disposing driver: id={}", self.session.id());
        }
        if self.queue.pending() > 0 {
            warn!(
                "Disposing driver with queued actions: id={}, pending={}",
                self.session.id(),
                self.queue.pending()
            );
        }
        self.session.dispose();
    }
}
