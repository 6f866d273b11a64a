//! Communication primitives for streamer
//!
//! Provides the restartable [`Stream`], its consumer-side [`Receiver`],
//! and the one-shot [`StopSignal`] used to cancel blocked senders.

mod channel;
mod signal;
mod stream;

pub use channel::{closed_receiver, Receiver};
pub use signal::{StopListener, StopSignal};
pub use stream::{Stream, StreamConfig, StreamStats};
