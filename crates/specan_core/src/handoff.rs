//! PCM Hand-off Buffer
//!
//! The capture callback appends samples and signals; the processing thread
//! waits until a whole frame is buffered and drains exactly that many
//! samples. Samples leave in the order they arrived and each one belongs to
//! exactly one frame.
//!
//! The wait is bounded so the caller can treat a timeout as a stalled
//! microphone.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Pending {
    samples: VecDeque<i16>,
    stopped: bool,
}

/// Outcome of [`PcmHandoff::take_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Take {
    /// The output slice holds a full frame
    Frame,
    /// Not enough samples arrived before the deadline
    TimedOut,
    /// [`PcmHandoff::stop`] was called
    Stopped,
}

pub struct PcmHandoff {
    pending: Mutex<Pending>,
    available: Condvar,
}

impl PcmHandoff {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                samples: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append captured samples; called from the capture callback
    pub fn push(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        if pending.stopped {
            return;
        }
        pending.samples.extend(samples.iter().copied());
        drop(pending);
        self.available.notify_one();
    }

    /// Wait up to `timeout` for `frame.len()` samples and move them out
    pub fn take_frame(&self, frame: &mut [i16], timeout: Duration) -> Take {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        loop {
            if pending.stopped {
                return Take::Stopped;
            }
            if pending.samples.len() >= frame.len() {
                break;
            }
            if self
                .available
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                // A push may have landed right at the deadline
                if pending.stopped {
                    return Take::Stopped;
                }
                if pending.samples.len() < frame.len() {
                    return Take::TimedOut;
                }
                break;
            }
        }

        let len = frame.len();
        for (out, sample) in frame.iter_mut().zip(pending.samples.drain(..len)) {
            *out = sample;
        }
        Take::Frame
    }

    /// Wake any waiter and refuse further samples
    pub fn stop(&self) {
        let mut pending = self.pending.lock();
        pending.stopped = true;
        pending.samples.clear();
        drop(pending);
        self.available.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.pending.lock().stopped
    }

    /// Samples buffered but not yet taken
    pub fn pending(&self) -> usize {
        self.pending.lock().samples.len()
    }
}

impl Default for PcmHandoff {
    fn default() -> Self {
        Self::new()
    }
}
