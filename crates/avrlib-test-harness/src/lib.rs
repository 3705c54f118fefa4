//! avrlib-test-harness: Test utilities and mock transports for avrlib.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the receiver driver without real hardware, and [`MockHandle`] for
//! inspecting what went over the mock wire after the transport has been
//! moved into a driver.

pub mod mock_serial;

pub use mock_serial::{MockHandle, MockTransport, WireEvent};
