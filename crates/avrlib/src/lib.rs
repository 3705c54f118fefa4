//! # avrlib -- Denon receiver control over RS-232
//!
//! `avrlib` is an asynchronous Rust library for driving Denon audio/video
//! receivers through their serial control port. One [`DenonReceiver`] owns
//! one connection, serializes every command on it, and keeps a cached
//! [`DeviceState`] so that callers can read power, volume, mute, input,
//! sound mode and zone state without a round trip.
//!
//! ## Quick Start
//!
//! ```no_run
//! use avrlib::ExecuteOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let receiver = avrlib::connect("/dev/ttyUSB0").await?;
//!
//!     let zones = receiver.discover_zones().await?;
//!     println!("zones: {zones:?}");
//!
//!     receiver.select_source("CD").await?;
//!     let reply = receiver.execute("MV?", ExecuteOptions::query_all()).await?;
//!     println!("{:?}", reply.into_lines());
//!     println!("{:?}", receiver.state().await);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `avrlib-core`         | [`Transport`] trait, shared types, errors       |
//! | `avrlib-transport`    | Serial transport (9600 8N1)                      |
//! | `avrlib-test-harness` | Scripted mock transport                          |
//! | `avrlib-denon`        | Protocol, parser, state cache, discovery, driver |
//! | **`avrlib`**          | This facade crate -- re-exports everything      |
//!
//! ## Polling
//!
//! The receiver can be changed from its front panel or remote, and the
//! protocol has no push notifications. Hosting applications call
//! [`DenonReceiver::refresh_all`] on their own schedule (once a minute is
//! typical) and react to [`ReceiverEvent`]s from
//! [`DenonReceiver::subscribe`].

pub use avrlib_core::*;

pub use avrlib_denon::{CodeTable, DenonBuilder, DenonReceiver, DeviceState, ZoneControl, ZoneState};

/// The Denon protocol backend in full: framing, command builders, parser.
pub mod denon {
    pub use avrlib_denon::*;
}

/// Open a receiver on `port` with default settings.
///
/// Verifies the device with a power query and seeds the cache. Zones are
/// not probed; call [`DenonReceiver::discover_zones`] during setup, or use
/// [`DenonBuilder::zones`] with a saved list.
///
/// # Errors
///
/// [`Error::Connection`] if the port cannot be opened,
/// [`Error::UnsupportedDevice`] if the device does not answer like a Denon
/// receiver.
pub async fn connect(port: &str) -> Result<DenonReceiver> {
    DenonBuilder::new().serial_port(port).build().await
}
