use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as channel;
use tracing::{debug, warn};

use super::registry::JobRegistry;
use super::Feed;

/// Bytes drained per chunk; the published estimate grows in these steps.
pub const CHUNK_SIZE: usize = 10240 * 100;

pub const SUBPROCESS_SETTLE: Duration = Duration::from_millis(200);
pub const STDIN_SETTLE: Duration = Duration::from_millis(300);

const REAP_POLL: Duration = Duration::from_millis(50);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReaderKind {
    Subprocess,
    Stdin,
}

impl ReaderKind {
    fn settle(self) -> Duration {
        match self {
            ReaderKind::Subprocess => SUBPROCESS_SETTLE,
            ReaderKind::Stdin => STDIN_SETTLE,
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderKind::Subprocess => f.write_str("subprocess"),
            ReaderKind::Stdin => f.write_str("stdin"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Running,
    Stopped,
}

/// What the poller sees. `Stopped` is end of data, distinct from any count.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Published {
    Idle,
    Running(u64),
    Stopped,
}

/// Where a reader gets its bytes from.
pub enum StreamSource {
    /// Shell command whose standard output is drained.
    Command(String),
    Stdin,
    Reader(Box<dyn Read + Send>),
}

/// Drains a blocking byte stream on its own thread and publishes how much
/// has gone by, so the sampler can poll without ever blocking on I/O.
///
/// The worker is spawned on the first poll. It ends when the stream is
/// exhausted, fails, or a stop is requested; in every case the published
/// value turns into end of data.
pub struct BackgroundReader {
    kind: ReaderKind,
    settle: Duration,
    published: Mutex<Published>,
    stop: AtomicBool,
    source: Mutex<Option<StreamSource>>,
    child: Mutex<Option<Child>>,
    done: Mutex<Option<channel::Receiver<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl BackgroundReader {
    pub fn new(kind: ReaderKind, source: StreamSource, registry: &JobRegistry) -> Arc<Self> {
        let reader = Arc::new(Self {
            kind,
            settle: kind.settle(),
            published: Mutex::new(Published::Idle),
            stop: AtomicBool::new(false),
            source: Mutex::new(Some(source)),
            child: Mutex::new(None),
            done: Mutex::new(None),
            worker: Mutex::new(None),
        });
        registry.register(Arc::clone(&reader));
        reader
    }

    pub fn command(cmd: impl Into<String>, registry: &JobRegistry) -> Arc<Self> {
        Self::new(ReaderKind::Subprocess, StreamSource::Command(cmd.into()), registry)
    }

    pub fn stdin(registry: &JobRegistry) -> Arc<Self> {
        Self::new(ReaderKind::Stdin, StreamSource::Stdin, registry)
    }

    pub fn kind(&self) -> ReaderKind {
        self.kind
    }

    pub fn state(&self) -> ReaderState {
        match *lock(&self.published) {
            Published::Idle => ReaderState::Idle,
            Published::Running(_) => ReaderState::Running,
            Published::Stopped => ReaderState::Stopped,
        }
    }

    /// Bytes drained so far, `None` at end of data.
    ///
    /// The first call starts the worker and returns 0.
    pub fn poll(self: &Arc<Self>) -> Option<u64> {
        let mut published = lock(&self.published);
        match *published {
            Published::Running(n) => Some(n),
            Published::Stopped => None,
            Published::Idle => match self.start() {
                Ok(()) => {
                    *published = Published::Running(0);
                    Some(0)
                }
                Err(e) => {
                    warn!(kind = %self.kind, error = %e, "Failed to start reader");
                    *published = Published::Stopped;
                    None
                }
            },
        }
    }

    /// Ask the worker to stop, publish end of data and give the stream a
    /// moment to wind down. Returns false if the reader had already stopped.
    pub fn stop(&self) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        let was_active = {
            let mut published = lock(&self.published);
            let active = *published != Published::Stopped;
            *published = Published::Stopped;
            active
        };
        self.terminate_child();

        let done = lock(&self.done).clone();
        if let Some(done) = done {
            let _ = done.recv_timeout(self.settle);
        }
        was_active
    }

    /// Wait up to `timeout` for the worker thread to exit. True if it has
    /// exited or never started.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let done = lock(&self.done).clone();
        let finished = match done {
            Some(done) => matches!(
                done.recv_timeout(timeout),
                Err(channel::RecvTimeoutError::Disconnected) | Ok(())
            ),
            None => true,
        };
        if finished {
            if let Some(handle) = lock(&self.worker).take() {
                let _ = handle.join();
            }
        }
        finished
    }

    fn start(self: &Arc<Self>) -> io::Result<()> {
        let source = lock(&self.source)
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "reader already started"))?;
        let stream: Box<dyn Read + Send> = match source {
            StreamSource::Command(cmd) => {
                let mut child = shell(&cmd)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .spawn()?;
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child has no stdout"))?;
                debug!(pid = child.id(), command = %cmd, "Spawned command");
                *lock(&self.child) = Some(child);
                Box::new(stdout)
            }
            StreamSource::Stdin => Box::new(io::stdin()),
            StreamSource::Reader(reader) => reader,
        };

        let (done_tx, done_rx) = channel::bounded::<()>(0);
        *lock(&self.done) = Some(done_rx);
        let reader = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("{}-reader", self.kind))
            .spawn(move || {
                reader.drain(stream);
                drop(done_tx);
            })?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    fn drain(&self, mut stream: Box<dyn Read + Send>) {
        debug!(kind = %self.kind, "Reader started");
        let mut buf = vec![0u8; CHUNK_SIZE];
        while !self.stop.load(Ordering::Relaxed) {
            match fill_chunk(&mut stream, &mut buf) {
                Ok(0) => break,
                Ok(_) => self.advance(),
                Err(e) => {
                    warn!(kind = %self.kind, error = %e, "Read failed, treating as end of data");
                    break;
                }
            }
        }
        *lock(&self.published) = Published::Stopped;
        self.terminate_child();
        self.reap_child();
        debug!(kind = %self.kind, "Reader finished");
    }

    /// Wait for the command to exit without holding the child lock across
    /// the wait, so `stop` is never blocked by a process that outlives its
    /// output. Once a stop is requested the process is killed outright.
    fn reap_child(&self) {
        loop {
            let mut guard = lock(&self.child);
            let Some(child) = guard.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(None) if self.stop.load(Ordering::Relaxed) => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Ok(None) => {
                    drop(guard);
                    thread::sleep(REAP_POLL);
                    continue;
                }
                Ok(Some(_)) | Err(_) => {}
            }
            guard.take();
            return;
        }
    }

    fn advance(&self) {
        let mut published = lock(&self.published);
        if let Published::Running(n) = *published {
            *published = Published::Running(n + CHUNK_SIZE as u64);
        }
    }

    fn terminate_child(&self) {
        if let Some(child) = lock(&self.child).as_mut() {
            terminate(child);
        }
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn fill_chunk(stream: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn shell(cmd: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    // own process group, so the whole pipeline can be signalled at once
    command.process_group(0);
    command
}

#[cfg(not(unix))]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

#[cfg(target_os = "linux")]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if killpg(Pid::from_raw(child.id() as i32), Signal::SIGTERM).is_err() {
        let _ = child.kill();
    }
}

#[cfg(not(target_os = "linux"))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

/// Feed backed by a `BackgroundReader`.
pub struct ReaderFeed {
    reader: Arc<BackgroundReader>,
}

impl ReaderFeed {
    pub fn new(reader: Arc<BackgroundReader>) -> Self {
        Self { reader }
    }
}

impl Feed for ReaderFeed {
    fn sample(&mut self) -> Option<u64> {
        self.reader.poll()
    }
}
