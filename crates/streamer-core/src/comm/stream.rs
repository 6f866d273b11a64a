//! Restartable bounded streams
//!
//! A [`Stream`] owns one *generation* at a time: a bounded buffer plus the
//! [`StopSignal`] that cancels blocked senders. `start` retires the current
//! generation and installs a fresh one; `stop` closes it.
//!
//! Two locks guard a stream. The state lock serializes lifecycle changes and
//! every send. The gate lock only covers firing the stop signal, so `stop`
//! can wake a blocked `send_blocking` even though that sender holds the
//! state lock. `stop` always fires the signal before taking the state lock;
//! `start` takes the state lock first and the gate lock second.

use crossbeam_channel::{self as cc, SendTimeoutError, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::channel::{closed_receiver, Receiver};
use super::signal::{StopListener, StopSignal};
use crate::{Error, Result};

/// Configuration for a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Buffer capacity of the first generation
    pub capacity: usize,
    /// How long a drop-oldest send waits for a free slot before evicting
    pub poll_interval: Duration,
    /// Stream name for logging
    pub name: Arc<str>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            poll_interval: Duration::from_millis(10),
            name: Arc::from("stream"),
        }
    }
}

impl StreamConfig {
    /// Create a new config with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Set the stream name
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the drop-oldest retry cadence
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check that the config can drive a stream
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config(format!(
                "{}: poll_interval must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}

/// Cumulative counters for a stream, across all generations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Values accepted into a buffer
    pub delivered: u64,
    /// Buffered values discarded to make room for newer ones
    pub evicted: u64,
    /// Values dropped without ever entering a buffer
    pub abandoned: u64,
    /// Number of generations started
    pub generations: u64,
}

impl StreamStats {
    /// Total values lost, evicted or abandoned
    pub fn discarded(&self) -> u64 {
        self.evicted + self.abandoned
    }
}

/// One buffer generation
struct Buffer<T> {
    /// `None` once the generation is closed
    tx: Option<cc::Sender<T>>,
    rx: cc::Receiver<T>,
    capacity: usize,
    stop: StopListener,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> (Self, StopSignal) {
        // A zero-capacity buffer still holds one value.
        let (tx, rx) = cc::bounded(capacity.max(1));
        let signal = StopSignal::new();
        let buffer = Self {
            tx: Some(tx),
            rx,
            capacity,
            stop: signal.listener(),
        };
        (buffer, signal)
    }
}

/// Stop signal of the live generation
struct Gate {
    generation: u64,
    signal: StopSignal,
}

struct State<T> {
    config: StreamConfig,
    buffer: Option<Buffer<T>>,
    started: bool,
    generation: u64,
    stats: StreamStats,
}

impl<T> State<T> {
    /// Sender of the live generation, if it is accepting values
    fn sender(&self) -> Option<&cc::Sender<T>> {
        if !self.started {
            return None;
        }
        self.buffer.as_ref()?.tx.as_ref()
    }

    /// Close the live generation. Returns false if it was not started.
    fn close(&mut self) -> bool {
        if !self.started {
            return false;
        }
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.tx = None;
        }
        self.started = false;
        true
    }
}

/// A restartable, bounded, drop-oldest message stream
///
/// Producers share a stream by reference (typically through an `Arc`);
/// the consumer reads through [`Stream::receiver`]. `Stream::default()` is
/// a valid zero stream on which every operation is a no-op until `start`.
///
/// # Example
/// ```ignore
/// let stream = Stream::new(2);
/// stream.send("a");
/// stream.send("b");
/// stream.send("c"); // evicts "a"
///
/// let rx = stream.receiver();
/// assert_eq!(rx.drain(), vec!["b", "c"]);
///
/// assert!(stream.stop());
/// assert!(!stream.stop());
/// ```
pub struct Stream<T> {
    state: Mutex<State<T>>,
    gate: Mutex<Option<Gate>>,
}

impl<T> Default for Stream<T> {
    fn default() -> Self {
        Self::zero(StreamConfig::default())
    }
}

impl<T> Stream<T> {
    /// Create a started stream with the given buffer capacity
    ///
    /// A capacity of 0 yields a buffer that holds a single value; a full
    /// zero-capacity stream drops new values instead of evicting.
    pub fn new(capacity: usize) -> Self {
        Self::started(StreamConfig::new(capacity))
    }

    /// Create a started stream from a config
    pub fn with_config(config: StreamConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            tracing::warn!("Rejected stream config: {}", e);
            return Err(e);
        }
        Ok(Self::started(config))
    }

    fn zero(config: StreamConfig) -> Self {
        Self {
            state: Mutex::new(State {
                config,
                buffer: None,
                started: false,
                generation: 0,
                stats: StreamStats::default(),
            }),
            gate: Mutex::new(None),
        }
    }

    fn started(config: StreamConfig) -> Self {
        let capacity = config.capacity;
        let stream = Self::zero(config);
        stream.start(capacity);
        stream
    }

    /// Start the stream with a new buffer capacity
    ///
    /// A started stream is stopped first. Values buffered in the previous
    /// generation are not carried over; receivers obtained before the
    /// restart drain them and then report the channel closed.
    pub fn start(&self, capacity: usize) {
        let mut state = self.state.lock();

        // Retire the current generation, whoever ends up reporting it.
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.signal.fire();
        }
        state.close();

        let (buffer, signal) = Buffer::new(capacity);
        state.generation += 1;
        let generation = state.generation;
        *self.gate.lock() = Some(Gate { generation, signal });

        state.buffer = Some(buffer);
        state.started = true;
        state.config.capacity = capacity;
        state.stats.generations += 1;

        tracing::debug!(
            stream = %state.config.name,
            capacity,
            generation,
            "stream started"
        );
    }

    /// Stop the stream and close its buffer
    ///
    /// Blocked [`send_blocking`](Self::send_blocking) calls are woken and
    /// give up. Buffered values stay receivable until drained.
    ///
    /// Returns true only if this call moved the stream from started to
    /// stopped. Stopping a zero or already stopped stream returns false.
    pub fn stop(&self) -> bool {
        let generation = {
            let gate = self.gate.lock();
            match gate.as_ref() {
                Some(gate) if gate.signal.fire() => gate.generation,
                _ => return false,
            }
        };

        let mut state = self.state.lock();
        // A concurrent start already retired this generation.
        if state.generation != generation {
            return false;
        }

        let stopped = state.close();
        if stopped {
            tracing::debug!(stream = %state.config.name, generation, "stream stopped");
        }
        stopped
    }

    /// Check if the stream is stopped (zero streams count as stopped)
    pub fn is_stopped(&self) -> bool {
        !self.state.lock().started
    }

    /// Check if the stream has never been started
    pub fn is_zero(&self) -> bool {
        self.state.lock().buffer.is_none()
    }

    /// Get a receiver for the current buffer
    ///
    /// On a zero stream the receiver is already exhausted, so reads never
    /// block.
    ///
    /// This takes the state lock, which a `send_blocking` waiting on a full
    /// buffer holds until it is unblocked. Consumers should take their
    /// receiver before producers start; asking for one only after a producer
    /// has blocked waits until the stream is stopped.
    pub fn receiver(&self) -> Receiver<T> {
        match self.state.lock().buffer.as_ref() {
            Some(buffer) => Receiver {
                inner: buffer.rx.clone(),
            },
            None => closed_receiver(),
        }
    }

    /// Capacity of the current generation, `None` for a zero stream
    pub fn capacity(&self) -> Option<usize> {
        self.state.lock().buffer.as_ref().map(|b| b.capacity)
    }

    /// Number of values buffered in the current generation
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .buffer
            .as_ref()
            .map_or(0, |b| b.rx.len())
    }

    /// Check if the current generation has nothing buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the cumulative statistics
    pub fn stats(&self) -> StreamStats {
        self.state.lock().stats
    }

    /// Get the stream configuration
    pub fn config(&self) -> StreamConfig {
        self.state.lock().config.clone()
    }

    /// Send a value, evicting the oldest buffered value if the buffer is full
    ///
    /// Does nothing on a stopped or zero stream. When the buffer is full the
    /// call waits up to one poll interval for the consumer to make room, then
    /// evicts the oldest value and retries, once per interval, until the value
    /// is in. A full zero-capacity buffer drops the value instead.
    ///
    /// Sends are serialized with each other and with `start`/`stop`, so a
    /// slow retry here delays a concurrent `stop`.
    pub fn send(&self, value: T) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(tx) = state.sender() else {
            return;
        };
        let tx = tx.clone();

        let mut value = match tx.try_send(value) {
            Ok(()) => {
                state.stats.delivered += 1;
                return;
            }
            Err(TrySendError::Full(v)) => v,
            Err(TrySendError::Disconnected(_)) => return,
        };

        let Some(buffer) = state.buffer.as_ref() else {
            return;
        };
        if buffer.capacity == 0 {
            state.stats.abandoned += 1;
            tracing::trace!(
                stream = %state.config.name,
                "zero-capacity buffer full, value dropped"
            );
            return;
        }

        let interval = state.config.poll_interval;
        loop {
            // Delivery first: give the consumer one tick to free a slot.
            value = match tx.send_timeout(value, interval) {
                Ok(()) => {
                    state.stats.delivered += 1;
                    return;
                }
                Err(SendTimeoutError::Timeout(v)) => v,
                Err(SendTimeoutError::Disconnected(_)) => return,
            };

            if buffer.stop.is_fired() {
                state.stats.abandoned += 1;
                tracing::trace!(stream = %state.config.name, "stop requested, value dropped");
                return;
            }

            // Not atomic with the retry below. If the slot is lost in between,
            // the next tick evicts again.
            if buffer.rx.try_recv().is_ok() {
                state.stats.evicted += 1;
                tracing::trace!(stream = %state.config.name, "evicted oldest value");
            }

            value = match tx.try_send(value) {
                Ok(()) => {
                    state.stats.delivered += 1;
                    return;
                }
                Err(TrySendError::Full(v)) => v,
                Err(TrySendError::Disconnected(_)) => return,
            };
        }
    }

    /// Send a value, blocking until there is room or the stream is stopped
    ///
    /// Does nothing on a stopped or zero stream. If [`stop`](Self::stop) is
    /// called while this is blocked, the value is dropped and the call
    /// returns.
    ///
    /// The state lock is held for the whole wait, so `receiver`, `len`,
    /// `stats` and the other queries block until this returns. Only a
    /// receiver obtained beforehand can free the slot.
    pub fn send_blocking(&self, value: T) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(tx) = state.sender() else {
            return;
        };
        let tx = tx.clone();

        let value = match tx.try_send(value) {
            Ok(()) => {
                state.stats.delivered += 1;
                return;
            }
            Err(TrySendError::Full(v)) => v,
            Err(TrySendError::Disconnected(_)) => return,
        };

        let Some(stop) = state.buffer.as_ref().map(|b| b.stop.clone()) else {
            return;
        };

        cc::select! {
            send(tx, value) -> res => {
                if res.is_ok() {
                    state.stats.delivered += 1;
                }
            }
            recv(stop.rx) -> _ => {
                state.stats.abandoned += 1;
                tracing::trace!(
                    stream = %state.config.name,
                    "stop requested, blocking send dropped"
                );
            }
        }
    }

    /// Try to send a value without blocking or evicting
    ///
    /// Returns [`Error::ChannelFull`] if there is no free slot and
    /// [`Error::Stopped`] on a stopped or zero stream. The value is dropped
    /// in both cases.
    pub fn try_send(&self, value: T) -> Result<()> {
        let mut state = self.state.lock();
        let Some(tx) = state.sender() else {
            return Err(Error::Stopped);
        };

        match tx.try_send(value) {
            Ok(()) => {
                state.stats.delivered += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::ChannelFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::Stopped),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Stream")
            .field("name", &state.config.name)
            .field("started", &state.started)
            .field("generation", &state.generation)
            .field("capacity", &state.buffer.as_ref().map(|b| b.capacity))
            .field("stats", &state.stats)
            .finish()
    }
}
