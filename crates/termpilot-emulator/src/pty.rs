//! Local pseudo-terminal transport.
//!
//! Wraps `portable-pty` behind the [`Transport`] trait. Output is read on a
//! dedicated thread and handed to data listeners as it arrives; a second
//! thread waits for the child and reports its exit status.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use termpilot_core::{Dimensions, Error, ListenerRegistry, Result, Subscription};
use tracing::{debug, error, info, warn};

use crate::transport::{DataListener, ExitListener, ExitStatus, Transport};

const READ_CHUNK: usize = 4096;

fn default_program() -> String {
    if cfg!(windows) {
        "powershell.exe".to_string()
    } else {
        "bash".to_string()
    }
}

#[derive(Default)]
struct PtyState {
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    pid: Option<u32>,
    spawned: bool,
}

/// Child process attached to a local pseudo-terminal.
pub struct LocalPty {
    program: String,
    args: Vec<String>,
    cwd: Option<String>,
    env: Vec<(String, String)>,
    dimensions: Mutex<Dimensions>,
    state: Mutex<PtyState>,
    data: ListenerRegistry<[u8]>,
    exit: ListenerRegistry<ExitStatus>,
    disposed: Arc<AtomicBool>,
}

impl std::fmt::Debug for LocalPty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPty")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("pid", &self.id())
            .finish()
    }
}

impl LocalPty {
    /// Describe a child to run in a pseudo-terminal of `dimensions`.
    ///
    /// `program` falls back to the platform shell. Nothing is started until
    /// [`Transport::spawn`].
    pub fn new(program: Option<String>, dimensions: Dimensions) -> Self {
        Self {
            program: program.unwrap_or_else(default_program),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            dimensions: Mutex::new(dimensions),
            state: Mutex::new(PtyState::default()),
            data: ListenerRegistry::new(),
            exit: ListenerRegistry::new(),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set program arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable. Later values for the same key win.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program that will be (or was) started.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Current pseudo-terminal size.
    pub fn dimensions(&self) -> Dimensions {
        *self
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, PtyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn command(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    fn start_reader(&self, mut reader: Box<dyn Read + Send>) -> Result<()> {
        let data = self.data.clone();
        let disposed = Arc::clone(&self.disposed);
        thread::Builder::new()
            .name(format!("pty-reader-{}", self.program))
            .spawn(move || {
                let mut buffer = [0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut buffer) {
                        Ok(0) => {
                            debug!("PTY reader reached EOF");
                            break;
                        }
                        Ok(n) => {
                            if disposed.load(Ordering::SeqCst) {
                                break;
                            }
                            debug!("Read {} bytes from PTY", n);
                            data.emit(&buffer[..n]);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            debug!("PTY reader stopped: {}", e);
                            break;
                        }
                    }
                }
            })
            .map(|_| ())
            .map_err(Error::Io)
    }

    fn start_exit_watcher(
        &self,
        mut child: Box<dyn portable_pty::Child + Send + Sync>,
    ) -> Result<()> {
        let exit = self.exit.clone();
        let disposed = Arc::clone(&self.disposed);
        thread::Builder::new()
            .name(format!("pty-exit-{}", self.program))
            .spawn(move || {
                let status = match child.wait() {
                    Ok(status) => ExitStatus::with_code(status.exit_code()),
                    Err(e) => {
                        error!("Failed to wait for PTY child: {}", e);
                        return;
                    }
                };
                info!("PTY child exited: code={}", status.code);
                if !disposed.load(Ordering::SeqCst) {
                    exit.emit(&status);
                }
            })
            .map(|_| ())
            .map_err(Error::Io)
    }
}

impl Transport for LocalPty {
    fn spawn(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::TransportDisposed);
        }
        let mut state = self.state();
        if state.spawned {
            return Err(Error::TransportAlreadySpawned);
        }

        let dims = self.dimensions();
        info!(
            "Spawning PTY: program={}, args={:?}, size={}",
            self.program, self.args, dims
        );

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: dims.rows,
                cols: dims.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::PtyError(format!("Failed to open PTY: {e}")))?;

        let child = pair
            .slave
            .spawn_command(self.command())
            .map_err(|e| Error::PtyError(format!("Failed to spawn {}: {e}", self.program)))?;
        // The slave end belongs to the child now.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::PtyError(format!("Failed to clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::PtyError(format!("Failed to take writer: {e}")))?;

        state.pid = child.process_id();
        state.killer = Some(child.clone_killer());
        state.master = Some(pair.master);
        state.writer = Some(writer);
        state.spawned = true;
        drop(state);

        self.start_reader(reader)?;
        self.start_exit_watcher(child)?;

        if cfg!(windows) && self.process_name().to_ascii_lowercase().contains("powershell") {
            self.write(b"chcp 65001\r")?;
            self.write(b"Clear-Host\r")?;
        }

        info!("PTY spawned: pid={:?}", self.id());
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::TransportDisposed);
        }
        let mut state = self.state();
        let writer = state.writer.as_mut().ok_or(Error::TransportNotSpawned)?;

        debug!("Writing {} bytes to PTY", data.len());
        writer.write_all(data).map_err(Error::Io)?;
        writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    fn resize(&self, dimensions: Dimensions) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::TransportDisposed);
        }
        info!("Resizing PTY: size={}", dimensions);

        {
            let state = self.state();
            if let Some(master) = state.master.as_ref() {
                master
                    .resize(PtySize {
                        rows: dimensions.rows,
                        cols: dimensions.cols,
                        pixel_width: 0,
                        pixel_height: 0,
                    })
                    .map_err(|e| Error::PtyError(format!("Resize failed: {e}")))?;
            }
        }

        *self
            .dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = dimensions;
        Ok(())
    }

    fn on_data(&self, listener: DataListener) -> Subscription {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.data.subscribe(move |chunk: &[u8]| listener(chunk))
    }

    fn on_exit(&self, listener: ExitListener) -> Subscription {
        if self.is_disposed() {
            return Subscription::noop();
        }
        self.exit.subscribe(move |status: &ExitStatus| listener(status))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Disposing PTY: program={}, pid={:?}", self.program, self.id());

        self.data.clear();
        self.exit.clear();

        let mut state = self.state();
        if let Some(mut killer) = state.killer.take() {
            if let Err(e) = killer.kill() {
                // The child may already be gone.
                warn!("Failed to kill PTY child: {}", e);
            }
        }
        state.writer = None;
        state.master = None;
    }

    fn id(&self) -> Option<u32> {
        self.state().pid
    }

    fn process_name(&self) -> String {
        Path::new(&self.program)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.program)
            .to_string()
    }
}

impl Drop for LocalPty {
    fn drop(&mut self) {
        self.dispose();
    }
}
