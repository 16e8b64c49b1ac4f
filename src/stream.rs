//! Stream endpoints with single-owner semantics.
//!
//! Endpoints wrap bounded crossbeam channels and are deliberately not `Clone`:
//! an endpoint has exactly one owner at a time, so handing one to another
//! execution context is an ordinary move and the origin keeps nothing usable.
//! Backpressure is the channel's own blocking send on a full buffer.

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, SendError, Sender, TryRecvError};
use std::time::Duration;

/// Writable half of a stream connection.
pub struct Writable<T> {
    tx: Sender<T>,
}

/// Readable half of a stream connection.
pub struct Readable<T> {
    rx: Receiver<T>,
}

/// Creates a connected endpoint pair with the given buffer capacity.
///
/// A capacity of zero gives a rendezvous connection where every send waits
/// for a matching receive.
pub fn bounded<T>(capacity: usize) -> (Writable<T>, Readable<T>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (Writable { tx }, Readable { rx })
}

impl<T> Writable<T> {
    /// Sends an item downstream, blocking while the buffer is full.
    ///
    /// Fails only when the readable half has been dropped; the item is
    /// handed back inside the error.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        self.tx.send(item)
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns true when no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> Readable<T> {
    /// Receives the next item, blocking until one arrives.
    ///
    /// Fails once the writable half is dropped and the buffer is drained.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.rx.recv()
    }

    /// Receives without blocking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    /// Receives with a deadline.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Blocking iterator over incoming items, ending on disconnect.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, T> {
        self.rx.iter()
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true when no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
