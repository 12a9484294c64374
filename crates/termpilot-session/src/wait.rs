//! Wait conditions for terminal state changes.
//!
//! Each wait uses only the public session surface: viewport snapshots for
//! the polling waits and the raw output stream for the silence wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tracing::debug;

use termpilot_core::{Error, Result, TextPattern};

use crate::session::Session;

/// Default overall timeout for waits.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default quiet period for stable and silence waits.
pub const DEFAULT_SETTLE_DURATION: Duration = Duration::from_millis(500);

/// Timing for polling waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Maximum time to wait
    pub timeout: Duration,

    /// Delay between polls
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    /// Default timing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

impl Session {
    fn viewport_text(&self) -> String {
        self.snapshot().text
    }

    /// Wait until `pattern` matches the viewport text.
    ///
    /// Checks once before the first sleep, so a pattern already on screen
    /// resolves immediately.
    pub async fn wait_for_text(&self, pattern: &TextPattern, options: WaitOptions) -> Result<()> {
        let deadline = Instant::now() + options.timeout;
        loop {
            if pattern.is_match(&self.viewport_text()) {
                debug!("Pattern matched: id={}, pattern={}", self.id(), pattern);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::PatternNotFound {
                    pattern: pattern.to_string(),
                    timeout_ms: millis(options.timeout),
                });
            }
            sleep(options.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait until the viewport text differs from its text at call time.
    pub async fn wait_for_change(&self, options: WaitOptions) -> Result<()> {
        let baseline = self.viewport_text();
        self.wait_for_change_from(&baseline, options).await
    }

    /// Wait until the viewport text differs from `baseline`.
    ///
    /// The first comparison happens after one poll interval.
    pub async fn wait_for_change_from(&self, baseline: &str, options: WaitOptions) -> Result<()> {
        let deadline = Instant::now() + options.timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout("wait_for_change", options.timeout));
            }
            sleep(options.poll_interval.min(deadline - now)).await;

            if self.viewport_text() != baseline {
                debug!("Screen changed: id={}", self.id());
                return Ok(());
            }
        }
    }

    /// Wait until the viewport text stays unchanged for `duration`.
    ///
    /// Every observed difference restarts the quiet period. Only polls taken
    /// after a sleep are compared.
    pub async fn wait_for_stable(&self, duration: Duration, options: WaitOptions) -> Result<()> {
        let deadline = Instant::now() + options.timeout;
        let mut last_text = self.viewport_text();
        let mut last_changed = Instant::now();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout("wait_for_stable", options.timeout));
            }
            sleep(options.poll_interval.min(deadline - now)).await;

            let text = self.viewport_text();
            let now = Instant::now();
            if text != last_text {
                last_text = text;
                last_changed = now;
            } else if now.duration_since(last_changed) >= duration {
                debug!("Screen stable: id={}", self.id());
                return Ok(());
            }
        }
    }

    /// Wait until no output arrives for `duration`.
    ///
    /// Output seen at the same moment the quiet period would end restarts
    /// the wait.
    pub async fn wait_for_silence(&self, duration: Duration, timeout: Duration) -> Result<()> {
        let notify = Arc::new(Notify::new());
        let _subscription = {
            let notify = Arc::clone(&notify);
            self.on_output(move |_| notify.notify_one())
        };

        let overall = sleep(timeout);
        tokio::pin!(overall);
        loop {
            tokio::select! {
                biased;
                _ = notify.notified() => {
                    debug!("Output during silence wait: id={}", self.id());
                }
                _ = sleep(duration) => {
                    debug!("Output silent: id={}", self.id());
                    return Ok(());
                }
                _ = &mut overall => {
                    return Err(Error::timeout("wait_for_silence", timeout));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termpilot_core::Dimensions;
    use termpilot_emulator::MemoryTransport;

    use crate::session::SessionOptions;

    fn session() -> (Session, MemoryTransport) {
        let transport = MemoryTransport::new();
        let session = Session::new(
            Arc::new(transport.clone()),
            SessionOptions {
                dimensions: Dimensions::new(5, 40),
                scrollback: 100,
            },
        );
        session.spawn().unwrap();
        (session, transport)
    }

    fn quick(timeout_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_wait_options_default() {
        let options = WaitOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.poll_interval, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_for_text_already_present() {
        let (session, transport) = session();
        transport.emit("ready> ");
        let options = WaitOptions::new().with_poll_interval(Duration::from_secs(5));
        let started = std::time::Instant::now();
        session
            .wait_for_text(&TextPattern::literal("ready>"), options)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_for_text_appears_later() {
        let (session, transport) = session();
        let pattern = TextPattern::regex(r"port \d+").unwrap();
        let emitter = async {
            sleep(Duration::from_millis(30)).await;
            transport.emit("listening on port 8080");
        };
        let (result, _) = tokio::join!(session.wait_for_text(&pattern, quick(1000)), emitter);
        result.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_text_timeout() {
        let (session, _transport) = session();
        let err = session
            .wait_for_text(&TextPattern::literal("never"), quick(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(
            err,
            Error::PatternNotFound { ref pattern, timeout_ms: 50 } if pattern == "never"
        ));
    }

    #[tokio::test]
    async fn test_wait_for_change_requires_difference() {
        let (session, transport) = session();
        transport.emit("before");
        let emitter = async {
            sleep(Duration::from_millis(30)).await;
            transport.emit(" after");
        };
        let (result, _) = tokio::join!(session.wait_for_change(quick(1000)), emitter);
        result.unwrap();

        let err = session.wait_for_change(quick(50)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref operation, .. } if operation == "wait_for_change"));
    }

    #[tokio::test]
    async fn test_wait_for_stable_resolves_on_quiet_screen() {
        let (session, _transport) = session();
        let started = std::time::Instant::now();
        session
            .wait_for_stable(Duration::from_millis(30), quick(1000))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_wait_for_stable_times_out_on_busy_screen() {
        let (session, transport) = session();
        let busy = async {
            for i in 0..20 {
                transport.emit(format!("{i} "));
                sleep(Duration::from_millis(10)).await;
            }
        };
        let (result, _) = tokio::join!(
            session.wait_for_stable(Duration::from_millis(100), quick(120)),
            busy
        );
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_wait_for_silence_restarts_on_output() {
        let (session, transport) = session();
        let started = std::time::Instant::now();
        let chatter = async {
            for _ in 0..3 {
                sleep(Duration::from_millis(20)).await;
                transport.emit("tick");
            }
        };
        let (result, _) = tokio::join!(
            session.wait_for_silence(Duration::from_millis(50), Duration::from_secs(2)),
            chatter
        );
        result.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_wait_for_silence_times_out_under_chatter() {
        let (session, transport) = session();
        let chatter = async {
            for _ in 0..10 {
                transport.emit("x");
                sleep(Duration::from_millis(10)).await;
            }
        };
        let (result, _) = tokio::join!(
            session.wait_for_silence(Duration::from_millis(50), Duration::from_millis(60)),
            chatter
        );
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref operation, .. } if operation == "wait_for_silence"));

        let seen = Arc::new(std::sync::Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let _probe = session.on_output(move |_| *sink.lock().unwrap() += 1);
        transport.emit("y");
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
