//! One-shot stop signal
//!
//! A [`StopSignal`] fires at most once. Every [`StopListener`] observes the
//! firing, and it stays fired forever after. Listeners are plain
//! crossbeam receivers underneath, so they can take part in `select!`
//! alongside ordinary channel operations.

use crossbeam_channel::{self as cc, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A broadcast flag that can be fired exactly once
///
/// # Example
/// ```ignore
/// let signal = StopSignal::new();
/// let listener = signal.listener();
///
/// std::thread::spawn(move || listener.wait());
///
/// assert!(signal.fire());
/// assert!(!signal.fire()); // already fired
/// ```
pub struct StopSignal {
    fired: AtomicBool,
    // Dropping the sender disconnects every listener.
    trigger: Mutex<Option<cc::Sender<()>>>,
    listener: cc::Receiver<()>,
}

impl StopSignal {
    /// Create a signal that has not fired yet
    pub fn new() -> Self {
        let (tx, rx) = cc::bounded(0);
        Self {
            fired: AtomicBool::new(false),
            trigger: Mutex::new(Some(tx)),
            listener: rx,
        }
    }

    /// Fire the signal
    ///
    /// Returns true only for the call that actually fired it; concurrent and
    /// later calls return false.
    pub fn fire(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        drop(self.trigger.lock().take());
        true
    }

    /// Check if the signal has fired
    #[inline]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Create a listener for this signal
    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.listener.clone(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Waiting side of a [`StopSignal`]
#[derive(Debug, Clone)]
pub struct StopListener {
    pub(crate) rx: cc::Receiver<()>,
}

impl StopListener {
    /// Check if the signal has fired
    #[inline]
    pub fn is_fired(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the signal fires
    pub fn wait(&self) {
        // Nothing is ever sent; recv only returns on disconnect.
        let _ = self.rx.recv();
    }

    /// Block until the signal fires or the timeout elapses
    ///
    /// Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
