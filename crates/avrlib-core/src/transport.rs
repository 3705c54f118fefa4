//! Transport trait for receiver communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a receiver.
//! The serial implementation lives in `avrlib-transport`; a scripted mock
//! lives in `avrlib-test-harness`.
//!
//! The protocol engine in `avrlib-denon` operates on a `Transport` rather
//! than directly on a serial port, enabling both real hardware control and
//! deterministic unit testing.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a receiver.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Command framing (carriage-return terminators, newline-delimited
/// responses, idle-gap detection) is handled by the protocol engine that
/// consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the receiver.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying link and flushed.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the receiver into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
