//! In-process transport for tests and scripted sessions.
//!
//! [`MemoryTransport`] never starts a process. Writes are recorded, output is
//! injected with [`MemoryTransport::emit`], and an optional responder can
//! answer each write the way a program would.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use termpilot_core::{Dimensions, Error, ListenerRegistry, Result, Subscription};
use tracing::debug;

use crate::transport::{DataListener, ExitListener, ExitStatus, Transport};

type Responder = Arc<dyn Fn(&[u8], &MemoryTransport) + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    spawned: bool,
    disposed: bool,
    spawn_count: usize,
    writes: Vec<Vec<u8>>,
    resizes: Vec<Dimensions>,
}

struct Inner {
    process_name: String,
    state: Mutex<MemoryState>,
    responder: Mutex<Option<Responder>>,
    data: ListenerRegistry<[u8]>,
    exit: ListenerRegistry<ExitStatus>,
}

/// Scriptable transport backed by memory.
///
/// Cloning yields another handle to the same transport, so a test can keep
/// one handle while a session owns the other.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryTransport")
            .field("process_name", &self.inner.process_name)
            .field("spawned", &state.spawned)
            .field("disposed", &state.disposed)
            .field("writes", &state.writes.len())
            .finish()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Silent transport named `bash`.
    pub fn new() -> Self {
        Self::with_process_name("bash")
    }

    /// Silent transport reporting `name` as its process name.
    pub fn with_process_name(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                process_name: name.into(),
                state: Mutex::new(MemoryState::default()),
                responder: Mutex::new(None),
                data: ListenerRegistry::new(),
                exit: ListenerRegistry::new(),
            }),
        }
    }

    /// Transport that echoes every write back as output.
    pub fn echo() -> Self {
        let transport = Self::new();
        transport.respond_with(|data, transport| transport.emit(data));
        transport
    }

    /// Answer each write with `responder`, called after the write is
    /// recorded and outside every internal lock.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&[u8], &MemoryTransport) + Send + Sync + 'static,
    {
        *self
            .inner
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(responder));
    }

    /// Deliver `data` to output listeners. Ignored after disposal.
    pub fn emit(&self, data: impl AsRef<[u8]>) {
        if self.is_disposed() {
            return;
        }
        self.inner.data.emit(data.as_ref());
    }

    /// Deliver an exit status to exit listeners. Ignored after disposal.
    pub fn emit_exit(&self, status: ExitStatus) {
        if self.is_disposed() {
            return;
        }
        self.inner.exit.emit(&status);
    }

    /// Every write received, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Every write received, decoded lossily.
    pub fn written_text(&self) -> Vec<String> {
        self.state()
            .writes
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Every resize received, in order.
    pub fn resizes(&self) -> Vec<Dimensions> {
        self.state().resizes.clone()
    }

    /// Number of successful `spawn()` calls.
    pub fn spawn_count(&self) -> usize {
        self.state().spawn_count
    }

    /// Whether `spawn()` succeeded.
    pub fn is_spawned(&self) -> bool {
        self.state().spawned
    }

    /// Whether `dispose()` was called.
    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn spawn(&self) -> Result<()> {
        let mut state = self.state();
        if state.disposed {
            return Err(Error::TransportDisposed);
        }
        if state.spawned {
            return Err(Error::TransportAlreadySpawned);
        }
        state.spawned = true;
        state.spawn_count += 1;
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        {
            let mut state = self.state();
            if state.disposed {
                return Err(Error::TransportDisposed);
            }
            if !state.spawned {
                return Err(Error::TransportNotSpawned);
            }
            debug!("Memory transport received {} bytes", data.len());
            state.writes.push(data.to_vec());
        }

        let responder = self
            .inner
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(responder) = responder {
            responder(data, self);
        }
        Ok(())
    }

    fn resize(&self, dimensions: Dimensions) -> Result<()> {
        let mut state = self.state();
        if state.disposed {
            return Err(Error::TransportDisposed);
        }
        state.resizes.push(dimensions);
        Ok(())
    }

    fn on_data(&self, listener: DataListener) -> Subscription {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.inner.data.subscribe(move |chunk: &[u8]| listener(chunk))
    }

    fn on_exit(&self, listener: ExitListener) -> Subscription {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.inner
            .exit
            .subscribe(move |status: &ExitStatus| listener(status))
    }

    fn dispose(&self) {
        {
            let mut state = self.state();
            if state.disposed {
                return;
            }
            state.disposed = true;
        }
        self.inner.data.clear();
        self.inner.exit.clear();
        *self
            .inner
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn id(&self) -> Option<u32> {
        None
    }

    fn process_name(&self) -> String {
        self.inner.process_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(transport: &MemoryTransport) -> (Arc<Mutex<Vec<u8>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = transport.on_data(Box::new(move |chunk| {
            sink.lock().unwrap().extend_from_slice(chunk);
        }));
        (seen, sub)
    }

    #[test]
    fn test_spawn_lifecycle() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.write(b"x"),
            Err(Error::TransportNotSpawned)
        ));

        transport.spawn().unwrap();
        assert!(matches!(
            transport.spawn(),
            Err(Error::TransportAlreadySpawned)
        ));
        assert_eq!(transport.spawn_count(), 1);

        transport.write(b"ls\r").unwrap();
        assert_eq!(transport.written_text(), vec!["ls\r"]);

        transport.dispose();
        transport.dispose();
        assert!(matches!(transport.write(b"x"), Err(Error::TransportDisposed)));
        assert!(matches!(transport.spawn(), Err(Error::TransportDisposed)));
    }

    #[test]
    fn test_echo_responder() {
        let transport = MemoryTransport::echo();
        let (seen, _sub) = collect(&transport);
        transport.spawn().unwrap();
        transport.write(b"hello").unwrap();
        assert_eq!(&*seen.lock().unwrap(), b"hello");
    }

    #[test]
    fn test_custom_responder_sees_clone() {
        let transport = MemoryTransport::new();
        transport.respond_with(|data, transport| {
            if data == b"ping\r" {
                transport.emit("pong\r\n");
            }
        });
        let (seen, _sub) = collect(&transport);
        transport.spawn().unwrap();
        transport.write(b"other\r").unwrap();
        transport.write(b"ping\r").unwrap();
        assert_eq!(&*seen.lock().unwrap(), b"pong\r\n");
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let transport = MemoryTransport::new();
        let (seen, sub) = collect(&transport);
        transport.emit("a");
        sub.unsubscribe();
        transport.emit("b");
        assert_eq!(&*seen.lock().unwrap(), b"a");
    }

    #[test]
    fn test_dispose_clears_listeners() {
        let transport = MemoryTransport::new();
        let (seen, _sub) = collect(&transport);
        transport.dispose();
        transport.emit("late");
        assert!(seen.lock().unwrap().is_empty());

        let noop = transport.on_exit(Box::new(|_| panic!("disposed transport delivered exit")));
        transport.emit_exit(ExitStatus::with_code(0));
        drop(noop);
    }

    #[test]
    fn test_resizes_recorded() {
        let transport = MemoryTransport::new();
        transport.resize(Dimensions::new(10, 40)).unwrap();
        assert_eq!(transport.resizes(), vec![Dimensions::new(10, 40)]);
        assert_eq!(transport.process_name(), "bash");
        assert_eq!(transport.id(), None);
    }
}
