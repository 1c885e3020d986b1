// src/testing.rs
//
// In-memory stand-ins for the base station, shared by the unit tests.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::io::codec::Command;
use crate::io::error::LinkError;
use crate::io::serial::{Connector, SerialStream};
use crate::question::CommandSink;
use crate::settings::AppSettings;

/// Defaults with a short reconnect interval
pub(crate) fn test_settings() -> AppSettings {
    AppSettings {
        reconnect_interval_ms: 5,
        ..AppSettings::default()
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// Command sink
// ============================================================================

#[derive(Default)]
pub(crate) struct RecordingSink {
    commands: Mutex<Vec<Command>>,
    failure: Mutex<Option<LinkError>>,
}

impl RecordingSink {
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Make every following send fail with `error`
    pub(crate) fn fail_with(&self, error: LinkError) {
        *self.failure.lock().unwrap() = Some(error);
    }
}

impl CommandSink for RecordingSink {
    fn send(&self, command: Command) -> Result<(), LinkError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

// ============================================================================
// Mock device
// ============================================================================

enum ReadStep {
    Data(Vec<u8>),
    Fail(ErrorKind),
}

/// One plugged-in base station. Every stream opened on it shares this state.
#[derive(Default)]
pub(crate) struct MockDevice {
    reads: Mutex<VecDeque<ReadStep>>,
    written: Mutex<Vec<u8>>,
    write_failures: AtomicUsize,
    write_chunk: AtomicUsize,
}

impl MockDevice {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_data(&self, bytes: &[u8]) {
        self.reads.lock().unwrap().push_back(ReadStep::Data(bytes.to_vec()));
    }

    pub(crate) fn push_failure(&self, kind: ErrorKind) {
        self.reads.lock().unwrap().push_back(ReadStep::Fail(kind));
    }

    pub(crate) fn pending_reads(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    /// Fail the next `count` writes
    pub(crate) fn fail_writes(&self, count: usize) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    /// Accept at most `chunk` bytes per write call
    pub(crate) fn set_write_chunk(&self, chunk: usize) {
        self.write_chunk.store(chunk, Ordering::SeqCst);
    }

    pub(crate) fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).to_string()
    }
}

pub(crate) struct MockStream {
    device: Arc<MockDevice>,
    live: Arc<AtomicUsize>,
}

impl MockStream {
    fn open(device: Arc<MockDevice>, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { device, live }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let step = self.device.reads.lock().unwrap().pop_front();
        match step {
            Some(ReadStep::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.device.reads.lock().unwrap().push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
            Some(ReadStep::Fail(kind)) => Err(io::Error::from(kind)),
            None => {
                std::thread::sleep(Duration::from_millis(2));
                Err(io::Error::from(ErrorKind::TimedOut))
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let failing = self
            .device
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::from(ErrorKind::BrokenPipe));
        }

        let n = match self.device.write_chunk.load(Ordering::SeqCst) {
            0 => buf.len(),
            chunk => buf.len().min(chunk),
        };
        self.device.written.lock().unwrap().extend_from_slice(&buf[..n]);
        if n < buf.len() {
            std::thread::yield_now();
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialStream for MockStream {
    fn try_clone_stream(&self) -> io::Result<Box<dyn SerialStream>> {
        Ok(Box::new(MockStream::open(self.device.clone(), self.live.clone())))
    }
}

// ============================================================================
// Mock connector
// ============================================================================

/// Hands out the queued devices in order, one per successful connect.
pub(crate) struct MockConnector {
    devices: Mutex<VecDeque<Arc<MockDevice>>>,
    hidden: AtomicUsize,
    failures: AtomicUsize,
    attempts: AtomicUsize,
    /// Refuse to connect while any stream is open, like a tty opened with TIOCEXCL
    exclusive: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new(devices: Vec<Arc<MockDevice>>) -> Self {
        Self {
            devices: Mutex::new(devices.into()),
            hidden: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            exclusive: AtomicBool::new(false),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn set_exclusive(&self) {
        self.exclusive.store(true, Ordering::SeqCst);
    }

    /// Streams opened and not yet dropped, clones included
    pub(crate) fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Report nothing plugged in for the next `count` discoveries
    pub(crate) fn hide_for(&self, count: usize) {
        self.hidden.store(count, Ordering::SeqCst);
    }

    /// Refuse the next `count` connects
    pub(crate) fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of connect calls so far
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Connector for MockConnector {
    fn discover(&self) -> Option<String> {
        if take_one(&self.hidden) {
            return None;
        }
        Some("/dev/ttyACM0".to_string())
    }

    fn connect(&self, path: &str) -> Result<Box<dyn SerialStream>, LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures)
            || (self.exclusive.load(Ordering::SeqCst) && self.live_handles() > 0)
        {
            return Err(LinkError::connection(path, "Device or resource busy"));
        }

        match self.devices.lock().unwrap().pop_front() {
            Some(device) => Ok(Box::new(MockStream::open(device, self.live.clone()))),
            None => Err(LinkError::connection(path, "No such file or directory")),
        }
    }
}
