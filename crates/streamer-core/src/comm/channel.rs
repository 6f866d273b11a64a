//! Consumer side of a stream
//!
//! A [`Receiver`] reads one buffer generation of a stream. It keeps working
//! after the stream stops or restarts, until that generation is drained.

use crossbeam_channel::{self as cc, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::{Error, Result};

/// Receiving end of a [`Stream`](super::Stream) buffer
///
/// Once the stream is stopped, values that were already buffered can still
/// be received. After they are drained every read reports
/// [`Error::ChannelClosed`] immediately.
#[derive(Debug)]
pub struct Receiver<T> {
    pub(crate) inner: cc::Receiver<T>,
}

impl<T> Receiver<T> {
    /// Wait for the next value
    ///
    /// Fails with [`Error::ChannelClosed`] once the generation is stopped
    /// and empty.
    #[inline]
    pub fn recv(&self) -> Result<T> {
        self.inner.recv().map_err(|_| Error::ChannelClosed)
    }

    /// Take the next value if one is buffered
    #[inline]
    pub fn try_recv(&self) -> Result<Option<T>> {
        match self.inner.try_recv() {
            Ok(v) => Ok(Some(v)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    /// Wait up to `timeout` for the next value; `Ok(None)` on timeout
    #[inline]
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.inner.recv_timeout(timeout) {
            Ok(v) => Ok(Some(v)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        }
    }

    /// Take everything currently buffered, oldest first
    #[inline]
    pub fn drain(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.inner.len());
        values.extend(self.inner.try_iter());
        values
    }

    /// Take the newest buffered value, discarding the ones before it
    #[inline]
    pub fn latest(&self) -> Option<T> {
        self.inner.try_iter().last()
    }

    /// Whether nothing is buffered right now
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of values buffered right now
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Blocking iterator that ends once the stream is stopped and drained
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.inner.iter()
    }

    /// Non-blocking iterator over the values buffered right now
    #[inline]
    pub fn try_iter(&self) -> impl Iterator<Item = T> + '_ {
        self.inner.try_iter()
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = cc::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

/// Create a receiver that is already exhausted
///
/// Every read returns [`Error::ChannelClosed`] without blocking. This is
/// what a stream that was never started hands out.
pub fn closed_receiver<T>() -> Receiver<T> {
    let (_, rx) = cc::bounded(0);
    Receiver { inner: rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Stream;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_recv_from_producer_thread() {
        let stream = Arc::new(Stream::new(4));
        let rx = stream.receiver();

        let producer = stream.clone();
        let handle = thread::spawn(move || {
            for i in 0..3 {
                producer.send_blocking(i);
            }
        });

        assert_eq!(rx.recv().unwrap(), 0);
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
        handle.join().unwrap();
    }

    #[test]
    fn test_try_recv_empty_then_closed() {
        let stream = Stream::new(2);
        let rx = stream.receiver();
        assert_eq!(rx.try_recv().unwrap(), None);

        stream.send(42);
        assert!(stream.stop());

        assert_eq!(rx.try_recv().unwrap(), Some(42));
        assert!(matches!(rx.try_recv(), Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_recv_timeout_empty() {
        let stream = Stream::<i32>::new(1);
        let rx = stream.receiver();
        let start = Instant::now();
        assert_eq!(rx.recv_timeout(Duration::from_millis(20)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_drain_after_eviction() {
        let stream = Stream::new(3);
        for i in 1..=4 {
            stream.send(i);
        }
        let rx = stream.receiver();
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.drain(), vec![2, 3, 4]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_latest() {
        let stream = Stream::new(10);
        let rx = stream.receiver();
        assert_eq!(rx.latest(), None);
        for i in 1..=3 {
            stream.send(i);
        }
        assert_eq!(rx.latest(), Some(3));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_try_iter_takes_only_buffered() {
        let stream = Stream::new(4);
        let rx = stream.receiver();
        stream.send(1);
        stream.send(2);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rx.try_iter().count(), 0);

        stream.send(3);
        assert!(stream.stop());
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_receiver_survives_restart() {
        let stream = Stream::new(4);
        let old = stream.receiver();
        stream.send(1);
        stream.start(4);
        stream.send(2);

        assert_eq!(old.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(stream.receiver().drain(), vec![2]);
    }

    #[test]
    fn test_closed_receiver() {
        let rx = closed_receiver::<String>();
        let start = Instant::now();

        assert!(matches!(rx.recv(), Err(Error::ChannelClosed)));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(1)),
            Err(Error::ChannelClosed)
        ));
        assert_eq!(rx.iter().count(), 0);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_into_iter_ends_on_stop() {
        let stream = Stream::new(3);
        let rx = stream.receiver();
        stream.send(1);
        stream.send(2);
        assert!(stream.stop());
        assert_eq!(rx.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }
}
