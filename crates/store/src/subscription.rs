//! Change-subscription handle.

use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A live view onto one key: a sequence of value snapshots, newest last.
///
/// Designed for single-threaded consumption. Dropping the subscription
/// detaches it; the store prunes dead subscribers on its next notification.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next snapshot is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a snapshot without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every snapshot already queued and return the newest, if any.
    ///
    /// Useful for view consumers that only care about the current state and
    /// not the intermediate churn.
    pub fn latest(&self) -> Option<M> {
        let mut newest = None;
        while let Ok(m) = self.receiver.try_recv() {
            newest = Some(m);
        }
        newest
    }
}
