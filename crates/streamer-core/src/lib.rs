//! streamer-core: restartable, bounded message streams
//!
//! A [`Stream`] decouples any number of producers from a single consumer
//! through a fixed-capacity buffer. Producers choose between a drop-oldest
//! [`Stream::send`] and a [`Stream::send_blocking`] that waits for space or
//! gives up once the stream is stopped.
//!
//! # Modules
//!
//! - [`comm`] - Streams, receivers and the one-shot stop signal
//!
//! # Lifecycle
//!
//! ```text
//!   Stream::default()        Stream::new(n) / start(n)
//!  ┌──────────────┐        ┌──────────────┐   stop()   ┌──────────────┐
//!  │     Zero     │──start─►│   Started    │───────────►│   Stopped    │
//!  └──────────────┘        └──────────────┘            └──────────────┘
//!                                 ▲           start(n)          │
//!                                 └─────────────────────────────┘
//! ```
//!
//! A zero stream behaves like a stopped one: sends are no-ops and its
//! receiver is exhausted immediately.

#![warn(unused_must_use)]

pub mod comm;

// Re-exports for convenience
pub use comm::{Receiver, StopListener, StopSignal, Stream, StreamConfig, StreamStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for streamer-core
///
/// Core stream operations never fail; these errors come from the fallible
/// helpers around them (receiving, [`Stream::try_send`], configuration).
///
/// # Example
/// ```ignore
/// match stream.try_send(frame) {
///     Ok(()) => {}
///     Err(Error::ChannelFull) => tracing::debug!("consumer is behind, frame skipped"),
///     Err(Error::Stopped) => return Ok(()),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// The buffer was closed and fully drained, or never existed.
    /// Handle by: treating it as end of stream.
    #[error("Channel closed")]
    ChannelClosed,

    /// No free slot was available for a non-evicting send.
    /// Handle by: retrying later, or using `send` to evict the oldest value.
    #[error("Channel full")]
    ChannelFull,

    /// The stream is stopped or was never started.
    /// Handle by: calling `start` before sending again.
    #[error("Stream stopped")]
    Stopped,

    /// Invalid configuration parameter.
    /// Handle by: validating config before use, checking parameter ranges.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for streamer-core operations
pub type Result<T> = std::result::Result<T, Error>;
