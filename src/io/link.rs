// src/io/link.rs
//
// Link manager for the base station serial port.
//
// - open: waits for the hardware, retrying forever at a fixed interval
// - read loop: one blocking task that frames, decodes and dispatches votes,
//   reconnecting whenever the port errors out
// - write: commands go out one at a time under the link lock
//
// The read loop works on its own clone of the port handle, so reads never
// wait on writers. That clone lives in a slot the link can empty: ports are
// opened exclusively, so every reopen first takes the reader's handle away.
// Each successful open bumps a generation counter; when the read loop loses
// the port it reports the generation it saw fail, and only reopens if no
// writer has done so already.

use serde::Serialize;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec::{Command, VoteCodec, VoteFrame};
use super::error::LinkError;
use super::serial::{Connector, LineFramer, SerialFrame, SerialStream};
use crate::question::CommandSink;
use crate::settings::AppSettings;

/// Longest single sleep while backing off, so shutdown is noticed promptly
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// ============================================================================
// Types
// ============================================================================

/// Receives every vote the read loop decodes
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, frame: VoteFrame);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub state: LinkState,
    pub device_path: Option<String>,
    /// Successful opens after the first one
    pub reconnects: u64,
}

struct Connection {
    port: Box<dyn SerialStream>,
    path: String,
}

struct LinkInner {
    conn: Option<Connection>,
    /// Bumped on every successful open
    generation: u64,
}

// ============================================================================
// Link Manager
// ============================================================================

pub struct LinkManager {
    connector: Arc<dyn Connector>,
    reconnect_interval: Duration,
    max_frame_length: usize,
    inner: Mutex<LinkInner>,
    /// Read loop's handle. Locked only for the duration of one read.
    reader_port: Mutex<Option<Box<dyn SerialStream>>>,
    status: RwLock<LinkStatus>,
    shutdown: AtomicBool,
}

impl LinkManager {
    pub fn new(connector: Arc<dyn Connector>, settings: &AppSettings) -> Self {
        Self {
            connector,
            reconnect_interval: settings.reconnect_interval(),
            max_frame_length: settings.max_frame_length,
            inner: Mutex::new(LinkInner {
                conn: None,
                generation: 0,
            }),
            reader_port: Mutex::new(None),
            status: RwLock::new(LinkStatus {
                state: LinkState::Disconnected,
                device_path: None,
                reconnects: 0,
            }),
            shutdown: AtomicBool::new(false),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, LinkInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_reader_port(&self) -> MutexGuard<'_, Option<Box<dyn SerialStream>>> {
        self.reader_port
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close the read loop's handle. Waits at most one read timeout.
    fn release_reader_port(&self) {
        if self.lock_reader_port().take().is_some() {
            debug!("[link] Released read loop handle");
        }
    }

    fn device_label(&self) -> String {
        self.status()
            .device_path
            .unwrap_or_else(|| "base station".to_string())
    }

    fn set_status(&self, state: LinkState, device_path: Option<&str>, generation: u64) {
        if let Ok(mut status) = self.status.write() {
            status.state = state;
            if let Some(path) = device_path {
                status.device_path = Some(path.to_string());
            }
            status.reconnects = generation.saturating_sub(1);
        }
    }

    pub fn status(&self) -> LinkStatus {
        match self.status.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop reconnect attempts and the read loop. Blocked callers return
    /// `LinkError::Shutdown` within one poll interval.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("[link] Shutdown requested");
        }
    }

    pub fn discover_device_path(&self) -> Option<String> {
        self.connector.discover()
    }

    /// Sleep for the reconnect interval. Returns false if shutdown fired meanwhile.
    fn backoff(&self) -> bool {
        let deadline = Instant::now() + self.reconnect_interval;
        loop {
            if self.is_shutdown() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    /// Open the base station, waiting as long as it takes for it to appear.
    fn open(&self, generation: u64) -> Result<Connection, LinkError> {
        loop {
            if self.is_shutdown() {
                return Err(LinkError::Shutdown);
            }
            self.set_status(LinkState::Connecting, None, generation);
            // The device refuses a second open while any handle is live
            self.release_reader_port();

            match self.discover_device_path() {
                Some(path) => match self.connector.connect(&path) {
                    Ok(port) => {
                        info!("[link] Connected to {}", path);
                        return Ok(Connection { port, path });
                    }
                    Err(e) => warn!("[link] {}", e),
                },
                None => info!("[link] Base station not detected, please connect it before continuing"),
            }

            debug!("[link] Retrying in {:?}", self.reconnect_interval);
            if !self.backoff() {
                return Err(LinkError::Shutdown);
            }
        }
    }

    fn drop_connection(&self, inner: &mut LinkInner) {
        if let Some(conn) = inner.conn.take() {
            debug!("[link] Closing {}", conn.path);
        }
        self.set_status(LinkState::Disconnected, None, inner.generation);
    }

    fn reopen(&self, inner: &mut LinkInner) -> Result<(), LinkError> {
        self.drop_connection(inner);
        let conn = self.open(inner.generation)?;
        inner.generation += 1;
        self.set_status(LinkState::Connected, Some(&conn.path), inner.generation);
        inner.conn = Some(conn);
        Ok(())
    }

    /// Block until the link is up. Returns immediately if it already is.
    pub fn connect(&self) -> Result<(), LinkError> {
        let mut inner = self.lock_inner();
        if inner.conn.is_none() {
            self.reopen(&mut inner)?;
        }
        Ok(())
    }

    /// Write one command followed by the frame delimiter.
    ///
    /// Holds the link lock for the whole attempt, so commands never
    /// interleave. A failed write reconnects and sends the command again.
    pub fn write(&self, command: &Command) -> Result<(), LinkError> {
        let bytes = command.to_wire();
        let mut inner = self.lock_inner();

        loop {
            if self.is_shutdown() {
                return Err(LinkError::Shutdown);
            }
            if inner.conn.is_none() {
                self.reopen(&mut inner)?;
            }

            let (result, path) = match inner.conn.as_mut() {
                Some(conn) => (
                    conn.port.write_all(&bytes).and_then(|_| conn.port.flush()),
                    conn.path.clone(),
                ),
                None => continue,
            };

            match result {
                Ok(()) => {
                    debug!("[link] Sent {:?} to {}", command.to_string(), path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("[link] {}, reconnecting", LinkError::write(path, e.to_string()));
                    self.drop_connection(&mut inner);
                }
            }
        }
    }

    /// Install a fresh handle for the read loop and return its generation.
    ///
    /// `failed_generation` is the connection the reader just lost; it is only
    /// reopened if nobody has replaced it yet.
    fn attach_reader(&self, failed_generation: Option<u64>) -> Result<u64, LinkError> {
        let mut inner = self.lock_inner();

        loop {
            if self.is_shutdown() {
                return Err(LinkError::Shutdown);
            }
            if inner.conn.is_none() || failed_generation == Some(inner.generation) {
                self.reopen(&mut inner)?;
            }

            let cloned = match inner.conn.as_ref() {
                Some(conn) => conn.port.try_clone_stream(),
                None => continue,
            };

            match cloned {
                Ok(port) => {
                    *self.lock_reader_port() = Some(port);
                    return Ok(inner.generation);
                }
                Err(e) => {
                    warn!("[link] Cannot clone port handle: {}", e);
                    self.drop_connection(&mut inner);
                    if !self.backoff() {
                        return Err(LinkError::Shutdown);
                    }
                }
            }
        }
    }

    fn dispatch(&self, frame: &SerialFrame, handler: &dyn FrameHandler) {
        if frame.incomplete {
            warn!("[link] Dropping over-long frame ({} bytes)", frame.bytes.len());
            return;
        }

        match VoteCodec::decode(&frame.bytes) {
            Ok(vote) => handler.on_frame(vote),
            Err(e) => warn!("[link] Dropping malformed frame: {}", e),
        }
    }

    /// Blocking read loop. Runs until shutdown; port errors only cost the
    /// current connection.
    pub fn run_read_loop(&self, handler: &dyn FrameHandler) {
        let mut generation = match self.attach_reader(None) {
            Ok(generation) => generation,
            Err(_) => {
                info!("[link] Read loop stopped before connecting");
                return;
            }
        };

        let mut framer = LineFramer::new(self.max_frame_length);
        let mut buf = [0u8; 256];
        info!("[link] Read loop started");

        while !self.is_shutdown() {
            // Slot lock is released before dispatching, acks may reopen the port
            let read = self.lock_reader_port().as_mut().map(|port| port.read(&mut buf));

            let Some(result) = read else {
                debug!("[link] Read handle taken by a reconnect, reattaching");
                framer.clear();
                match self.attach_reader(Some(generation)) {
                    Ok(g) => generation = g,
                    Err(_) => break,
                }
                continue;
            };

            let lost = match result {
                Ok(0) => Some("device closed the stream".to_string()),
                Ok(n) => {
                    for frame in framer.feed(&buf[..n]) {
                        self.dispatch(&frame, handler);
                    }
                    None
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    None
                }
                Err(e) => Some(e.to_string()),
            };

            if let Some(reason) = lost {
                warn!("[link] {}, reconnecting", LinkError::read(self.device_label(), reason));
                framer.clear();
                self.release_reader_port();

                match self.attach_reader(Some(generation)) {
                    Ok(g) => {
                        generation = g;
                        info!("[link] Read loop resumed");
                    }
                    Err(_) => break,
                }
            }
        }

        self.release_reader_port();
        info!("[link] Read loop stopped");
    }

    /// Run the read loop on the blocking pool. Requires a tokio runtime.
    pub fn spawn_reader(self: &Arc<Self>, handler: Arc<dyn FrameHandler>) -> ReaderTask {
        let link = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || link.run_read_loop(handler.as_ref()));

        ReaderTask {
            link: Arc::clone(self),
            handle,
        }
    }
}

impl CommandSink for LinkManager {
    fn send(&self, command: Command) -> Result<(), LinkError> {
        self.write(&command)
    }
}

/// Handle to the running read loop
pub struct ReaderTask {
    link: Arc<LinkManager>,
    handle: JoinHandle<()>,
}

impl ReaderTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Shut the link down and wait for the read loop to exit.
    pub async fn stop(self) {
        self.link.shutdown();
        if let Err(e) = self.handle.await {
            warn!("[link] Read loop task panicked: {:?}", e);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
