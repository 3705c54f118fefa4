//! Transport implementations for avrlib.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](avrlib_core::Transport) trait for the receiver's RS-232
//! control port (or a USB serial adapter wired to it).
//!
//! # Example
//!
//! ```no_run
//! use avrlib_transport::SerialTransport;
//! use avrlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!
//! // Query power state.
//! transport.send(b"PW?\r").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{BAUD_RATE, SerialTransport};
