//! avrlib-core: Core traits, types, and error definitions for avrlib.
//!
//! This crate defines the link-level abstractions shared by the receiver
//! driver, the serial transport, and the test harness. Hosting applications
//! depend on these types without pulling in the serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`ExecuteOptions`] / [`Reply`] -- the shape of one command exchange
//! - [`ReceiverEvent`] -- cached state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use avrlib_core::*`.
pub use error::{Error, Result};
pub use events::ReceiverEvent;
pub use transport::Transport;
pub use types::*;
