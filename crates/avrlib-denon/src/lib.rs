//! Denon RS-232 receiver driver for avrlib.
//!
//! This crate implements the text protocol spoken by Denon AVR-series
//! receivers on their serial control port. It provides:
//!
//! - **Protocol framing** ([`protocol`]) -- carriage-return terminated
//!   commands and loosely terminated response lines.
//! - **Link I/O** ([`io`]) -- byte-at-a-time command writes and the
//!   idle-gap line reader.
//! - **Command builders** ([`commands`]) -- correctly formatted commands for
//!   power, volume, mute, input, sound mode, tuner and zones.
//! - **Response parser** ([`parser`]) -- pure classification of wire lines
//!   into typed facts.
//! - **State cache** ([`state`]) -- the single [`DeviceState`] mirror of the
//!   hardware, updated optimistically by commands and authoritatively by
//!   query responses.
//! - **Zone discovery** ([`discovery`]) -- probing for `Z2`, `Z3` / `Z1`.
//! - **Driver** ([`receiver`]) and **builder** ([`builder`]).
//!
//! # Example
//!
//! ```
//! use avrlib_denon::parser::{parse_line, Fact, Level, ZoneFact};
//! use avrlib_core::ZoneId;
//!
//! // `Z210` on a confirmed zone 2 is a volume, not a source called "10".
//! let fact = parse_line("Z210", &[ZoneId::Zone2]).unwrap();
//! assert_eq!(
//!     fact,
//!     Some(Fact::Zone { zone: ZoneId::Zone2, fact: ZoneFact::Volume(Level::Set(10)) })
//! );
//! ```

pub mod builder;
pub mod commands;
pub mod discovery;
pub mod io;
pub mod parser;
pub mod protocol;
pub mod receiver;
pub mod sources;
pub mod state;

pub use builder::DenonBuilder;
pub use receiver::{DenonReceiver, ZoneControl};
pub use sources::CodeTable;
pub use state::{DeviceState, ZoneState};
