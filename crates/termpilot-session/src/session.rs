//! Terminal session: one transport bound to one screen model.
//!
//! Every output chunk from the transport is counted as pending, broadcast
//! raw to output listeners, then applied to the screen model. Shell
//! integration markers found while applying are queued and delivered after
//! the screen lock is released, so listeners may call back into the session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use termpilot_core::{
    Dimensions, Key, ListenerRegistry, Result, SessionId, ShellIntegrationEvent, Subscription,
    SHELL_INTEGRATION_OSC,
};
use termpilot_emulator::{ExitStatus, ScreenModel, Transport, VtScreen};

use crate::drain::DrainTracker;

/// Default scrollback capacity, in lines.
pub const DEFAULT_SCROLLBACK: usize = 5000;

/// Construction options for a [`Session`] with the built-in screen model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Initial terminal size
    pub dimensions: Dimensions,
    /// Scrollback capacity, in lines
    pub scrollback: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            scrollback: DEFAULT_SCROLLBACK,
        }
    }
}

pub(crate) type SharedScreen = Arc<Mutex<Box<dyn ScreenModel>>>;

/// A terminal session.
pub struct Session {
    /// Session identifier
    id: SessionId,

    /// Process side
    transport: Arc<dyn Transport>,

    /// Terminal state
    screen: SharedScreen,

    /// Chunks received but not yet applied
    drain: Arc<DrainTracker>,

    /// Raw output listeners
    output: ListenerRegistry<[u8]>,

    /// Process exit listeners
    exit: ListenerRegistry<ExitStatus>,

    /// Shell-integration listeners
    shell_events: ListenerRegistry<ShellIntegrationEvent>,

    /// Subscriptions on the transport
    wiring: Mutex<Vec<Subscription>>,

    /// Set once by `dispose()`
    disposed: Arc<AtomicBool>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("process", &self.transport.process_name())
            .field("pending", &self.drain.pending())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Bind `transport` to a new [`VtScreen`].
    ///
    /// The transport is not spawned; call [`Session::spawn`].
    pub fn new(transport: Arc<dyn Transport>, options: SessionOptions) -> Self {
        let screen = VtScreen::new(options.dimensions, options.scrollback);
        Self::with_screen(transport, Box::new(screen))
    }

    /// Bind `transport` to a caller-supplied screen model.
    pub fn with_screen(transport: Arc<dyn Transport>, screen: Box<dyn ScreenModel>) -> Self {
        let id = SessionId::new();
        let screen: SharedScreen = Arc::new(Mutex::new(screen));
        let drain = Arc::new(DrainTracker::new());
        let output = ListenerRegistry::new();
        let exit = ListenerRegistry::new();
        let shell_events = ListenerRegistry::new();
        let disposed = Arc::new(AtomicBool::new(false));
        let queued: Arc<Mutex<VecDeque<ShellIntegrationEvent>>> =
            Arc::new(Mutex::new(VecDeque::new()));

        {
            let queued = Arc::clone(&queued);
            lock(&screen).register_oob_handler(
                SHELL_INTEGRATION_OSC,
                Box::new(move |payload| {
                    match ShellIntegrationEvent::decode(payload) {
                        Some(event) => lock(&queued).push_back(event),
                        None => debug!("Ignoring shell-integration payload: {:?}", payload),
                    }
                    true
                }),
            );
        }

        let data_sub = {
            let screen = Arc::clone(&screen);
            let drain = Arc::clone(&drain);
            let output = output.clone();
            let shell_events = shell_events.clone();
            let disposed = Arc::clone(&disposed);
            transport.on_data(Box::new(move |chunk| {
                if disposed.load(Ordering::SeqCst) {
                    return;
                }
                drain.begin();
                output.emit(chunk);
                {
                    let tracker = Arc::clone(&drain);
                    lock(&screen).write(chunk, Box::new(move || tracker.complete()));
                }
                let events: Vec<ShellIntegrationEvent> = lock(&queued).drain(..).collect();
                for event in &events {
                    shell_events.emit(event);
                }
            }))
        };

        let exit_sub = {
            let exit = exit.clone();
            let disposed = Arc::clone(&disposed);
            transport.on_exit(Box::new(move |status| {
                if disposed.load(Ordering::SeqCst) {
                    return;
                }
                info!("Session process exited: id={}, code={}", id, status.code);
                exit.emit(status);
            }))
        };

        info!(
            "Session created: id={}, process={}",
            id,
            transport.process_name()
        );

        Self {
            id,
            transport,
            screen,
            drain,
            output,
            exit,
            shell_events,
            wiring: Mutex::new(vec![data_sub, exit_sub]),
            disposed,
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Name of the driven process.
    pub fn process_name(&self) -> String {
        self.transport.process_name()
    }

    /// Whether `dispose()` has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn screen(&self) -> MutexGuard<'_, Box<dyn ScreenModel>> {
        lock(&self.screen)
    }

    /// Current terminal size.
    pub fn dimensions(&self) -> Dimensions {
        self.screen().dimensions()
    }

    /// Start the process behind the transport.
    pub fn spawn(&self) -> Result<()> {
        info!("Spawning session process: id={}", self.id);
        self.transport.spawn()
    }

    /// Send bytes to the process.
    ///
    /// Writes before spawn or after dispose are dropped with a warning.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        let data = data.as_ref();
        if self.is_disposed() {
            warn!(
                "Dropping write to disposed session: id={}, {} bytes",
                self.id,
                data.len()
            );
            return;
        }
        debug!("Writing to session: id={}, {} bytes", self.id, data.len());
        if let Err(e) = self.transport.write(data) {
            warn!(
                "Dropping write: id={}, {} bytes: {}",
                self.id,
                data.len(),
                e
            );
        }
    }

    /// Type `text` verbatim.
    pub fn type_text(&self, text: &str) {
        self.write(text);
    }

    /// Send `command` followed by a carriage return.
    pub fn execute_line(&self, command: &str) {
        self.write(format!("{command}\r"));
    }

    /// Press a named key or a `+`-joined chord such as `Ctrl+C`.
    ///
    /// Unknown names are dropped with a warning.
    pub fn press_key(&self, name: &str) {
        match Key::parse(name) {
            Ok(key) => self.send_key(&key),
            Err(e) => warn!("Dropping key press: id={}: {}", self.id, e),
        }
    }

    /// Press a chord given as separate parts; the last part is the base key.
    pub fn chord(&self, keys: &[&str]) {
        match Key::chord(keys) {
            Ok(key) => self.send_key(&key),
            Err(e) => warn!("Dropping chord: id={}: {}", self.id, e),
        }
    }

    fn send_key(&self, key: &Key) {
        let bytes = key.to_escape_sequence();
        if bytes.is_empty() {
            warn!("Key has no escape sequence: id={}, key={}", self.id, key);
            return;
        }
        self.write(bytes);
    }

    /// Resize to `cols` x `rows`, clamped to at least 2 columns and 1 row.
    ///
    /// Applies to the screen model and the transport.
    pub fn resize(&self, cols: i32, rows: i32) {
        let dims = Dimensions::clamped(cols, rows);
        if self.is_disposed() {
            return;
        }
        info!("Resizing session: id={}, size={}", self.id, dims);
        self.screen().resize(dims);
        if let Err(e) = self.transport.resize(dims) {
            warn!("Transport resize failed: id={}: {}", self.id, e);
        }
    }

    /// Resolve once every received chunk has been applied to the screen.
    ///
    /// Resolves immediately when nothing is pending or the session is
    /// disposed.
    pub async fn drain(&self) {
        if self.is_disposed() {
            return;
        }
        self.drain.drained().await;
    }

    /// Number of received chunks not yet applied.
    pub fn pending_writes(&self) -> usize {
        self.drain.pending()
    }

    /// Listen to raw output chunks, delivered before screen application.
    pub fn on_output<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.output.subscribe(listener)
    }

    /// Listen for process exit.
    pub fn on_exit<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExitStatus) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.exit.subscribe(listener)
    }

    /// Listen for decoded shell-integration markers.
    pub fn on_shell_integration<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ShellIntegrationEvent) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.shell_events.subscribe(listener)
    }

    /// Tear the session down. Later calls do nothing.
    ///
    /// Clears listeners, releases pending drain waiters and disposes the
    /// transport and the screen model.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Disposing session: id={}", self.id);

        self.output.clear();
        self.exit.clear();
        self.shell_events.clear();
        lock(&self.wiring).clear();
        self.drain.release_all();
        self.transport.dispose();
        self.screen().dispose();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}
