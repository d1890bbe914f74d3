//! Remote Control
//!
//! A phone or another machine can drive the same actions as the physical
//! controls by sending short text commands over TCP, one per line:
//!
//! | Command                     | Effect                                 |
//! |-----------------------------|----------------------------------------|
//! | `E_GRADIENT_POS` / `_NEG`   | next / previous gradient               |
//! | `E_DISPLAY_CHANGE_POS` / `_NEG` | next / previous display            |
//! | `E_REVERSE_GRADIENT_TOGGLE` | flip gradient direction                |
//! | `E_GAIN_BRIGHT_REMOTE`      | take gain/brightness from the remote   |
//! | `E_GAIN_BRIGHT_LOCAL`       | hand gain/brightness back to the knobs |
//! | `E_GAIN_VALUE <int>`        | remote gain                            |
//! | `E_BRIGHT_VALUE <float>`    | remote brightness (0.0 to 1.0)         |
//!
//! # Architecture
//!
//! [`RemoteControl`] is the shared state: a bounded queue of
//! [`ControlEvent`]s drained by the monitor loop, plus the remote levels
//! behind one lock. [`RemoteListener`] owns the TCP side and feeds packets
//! into it from its own threads.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::traits::{ControlEvent, LevelKnobs};

/// Commands beyond this are dropped until the monitor loop catches up
pub const MAX_QUEUED_COMMANDS: usize = 100;

/// Longest command line a client may send before it is disconnected
pub const MAX_LINE_LEN: usize = 256;

/// How often blocked network threads check for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One parsed remote command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Event(ControlEvent),
    UseLocalLevels,
    UseRemoteLevels,
    Gain(i32),
    Brightness(f32),
}

impl RemoteCommand {
    /// Parse one packet, ignoring trailing `\r`, `\n` and NUL bytes
    pub fn parse(packet: &[u8]) -> Option<Self> {
        let end = packet
            .iter()
            .rposition(|&b| !matches!(b, b'\r' | b'\n' | b'\0'))?;
        let text = std::str::from_utf8(&packet[..=end]).ok()?;

        let (name, arg) = match text.split_once(' ') {
            Some((name, arg)) => (name, Some(arg)),
            None => (text, None),
        };

        let command = match (name, arg) {
            ("E_GRADIENT_POS", None) => Self::Event(ControlEvent::GradientNext),
            ("E_GRADIENT_NEG", None) => Self::Event(ControlEvent::GradientPrev),
            ("E_DISPLAY_CHANGE_POS", None) => Self::Event(ControlEvent::DisplayNext),
            ("E_DISPLAY_CHANGE_NEG", None) => Self::Event(ControlEvent::DisplayPrev),
            ("E_REVERSE_GRADIENT_TOGGLE", None) => Self::Event(ControlEvent::ToggleReverse),
            ("E_GAIN_BRIGHT_LOCAL", None) => Self::UseLocalLevels,
            ("E_GAIN_BRIGHT_REMOTE", None) => Self::UseRemoteLevels,
            ("E_GAIN_VALUE", Some(value)) => Self::Gain(value.parse().ok()?),
            ("E_BRIGHT_VALUE", Some(value)) => {
                let brightness: f32 = value.parse().ok()?;
                if !brightness.is_finite() {
                    return None;
                }
                Self::Brightness(brightness.clamp(0.0, 1.0))
            }
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy)]
struct RemoteLevels {
    use_remote: bool,
    gain: i32,
    brightness: f32,
}

/// Command queue and remote levels shared between the network and the pipeline
pub struct RemoteControl {
    tx: Sender<ControlEvent>,
    rx: Receiver<ControlEvent>,
    levels: Mutex<RemoteLevels>,
}

impl RemoteControl {
    pub fn new(use_remote_levels: bool) -> Self {
        let (tx, rx) = bounded(MAX_QUEUED_COMMANDS);
        Self {
            tx,
            rx,
            levels: Mutex::new(RemoteLevels {
                use_remote: use_remote_levels,
                gain: 0,
                brightness: 0.0,
            }),
        }
    }

    /// Apply one received packet
    ///
    /// Returns `false` when the packet was not a valid command or the
    /// queue was full.
    pub fn process_packet(&self, packet: &[u8]) -> bool {
        let Some(command) = RemoteCommand::parse(packet) else {
            debug!(
                "Ignoring invalid remote command: {:?}",
                String::from_utf8_lossy(packet)
            );
            return false;
        };

        match command {
            RemoteCommand::Event(event) => match self.tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(event)) => {
                    debug!("Remote command queue full, dropping {:?}", event);
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
            RemoteCommand::UseLocalLevels => {
                self.levels.lock().use_remote = false;
                true
            }
            RemoteCommand::UseRemoteLevels => {
                self.levels.lock().use_remote = true;
                true
            }
            RemoteCommand::Gain(gain) => {
                self.levels.lock().gain = gain;
                true
            }
            RemoteCommand::Brightness(brightness) => {
                self.levels.lock().brightness = brightness;
                true
            }
        }
    }

    /// Oldest queued event, if any
    pub fn next_event(&self) -> Option<ControlEvent> {
        self.rx.try_recv().ok()
    }

    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Drop all queued events
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn uses_remote_levels(&self) -> bool {
        self.levels.lock().use_remote
    }
}

impl LevelKnobs for RemoteControl {
    /// Remote gain, only while the remote has taken over the levels
    fn gain(&self) -> Option<i32> {
        let levels = self.levels.lock();
        levels.use_remote.then_some(levels.gain)
    }

    fn brightness(&self) -> Option<f32> {
        let levels = self.levels.lock();
        levels.use_remote.then_some(levels.brightness)
    }
}

/// TCP server feeding a [`RemoteControl`]
///
/// One thread accepts connections and one thread serves each connection.
/// All of them stop and are joined when the listener is dropped.
pub struct RemoteListener {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl RemoteListener {
    pub fn bind(port: u16, remote: Arc<RemoteControl>) -> Result<Self, PlatformError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|source| PlatformError::BindFailed { port, source })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let accept_thread = thread::Builder::new()
            .name("specan-remote".to_string())
            .spawn(move || accept_loop(listener, remote, running_clone))?;

        info!("Remote control listening on {}", local_addr);

        Ok(Self {
            local_addr,
            running,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for RemoteListener {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        info!("Remote control stopped");
    }
}

fn accept_loop(listener: TcpListener, remote: Arc<RemoteControl>, running: Arc<AtomicBool>) {
    let mut connections: Vec<JoinHandle<()>> = Vec::new();

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!("Remote control connected: {}", peer);
                let remote = Arc::clone(&remote);
                let running = Arc::clone(&running);
                let spawned = thread::Builder::new()
                    .name(format!("specan-remote-{}", peer))
                    .spawn(move || serve_connection(stream, peer, remote, running));
                match spawned {
                    Ok(handle) => connections.push(handle),
                    Err(e) => warn!("Failed to spawn remote connection thread: {}", e),
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Remote control accept failed: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
        connections.retain(|handle| !handle.is_finished());
    }

    for handle in connections {
        let _ = handle.join();
    }
}

fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    remote: Arc<RemoteControl>,
    running: Arc<AtomicBool>,
) {
    if let Err(e) = stream
        .set_nonblocking(false)
        .and_then(|_| stream.set_read_timeout(Some(POLL_INTERVAL)))
    {
        warn!("Remote connection {} setup failed: {}", peer, e);
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(64);

    while running.load(Ordering::SeqCst) {
        // A timed-out read keeps the partial line for the next attempt
        let limit = MAX_LINE_LEN.saturating_sub(line.len()) as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.last() == Some(&b'\n') {
                    remote.process_packet(&line);
                    line.clear();
                } else if line.len() >= MAX_LINE_LEN {
                    warn!(
                        "Remote connection {} sent a line over {} bytes, disconnecting",
                        peer, MAX_LINE_LEN
                    );
                    line.clear();
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                debug!("Remote connection {} read failed: {}", peer, e);
                break;
            }
        }
    }

    // Unterminated last command
    if !line.is_empty() {
        remote.process_packet(&line);
    }
    info!("Remote control disconnected: {}", peer);
}
