//! Receiver state change events.
//!
//! Events are emitted by the driver through a `tokio::sync::broadcast`
//! channel whenever the cached device state changes value, whether the change
//! came from a command just sent or from a query response. Hosting layers
//! subscribe to these instead of polling the snapshot.

use crate::types::{PowerState, ZoneId, ZonePower};

/// An event emitted by the driver when cached receiver state changes.
///
/// Delivery is best-effort through a bounded broadcast channel; slow
/// consumers may miss events and should fall back to a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Main-unit power changed.
    PowerChanged { power: PowerState },

    /// Master volume changed (already normalized, `99` on the wire is `0`).
    VolumeChanged { volume: u8 },

    /// The device reported a new top-of-scale volume.
    VolumeMaxChanged { volume_max: u8 },

    /// Mute was switched on or off.
    MuteChanged { muted: bool },

    /// The selected input changed.
    SourceChanged {
        /// Wire code of the new input (e.g. `"DVD"`).
        code: String,
    },

    /// The surround/sound mode changed.
    SoundModeChanged {
        /// Wire code of the new mode (e.g. `"STEREO"`).
        code: String,
    },

    /// A zone was confirmed and added to the cache.
    ZoneAdded { zone: ZoneId },

    /// Power of an auxiliary zone changed.
    ZonePowerChanged { zone: ZoneId, power: ZonePower },

    /// Volume of an auxiliary zone changed.
    ZoneVolumeChanged { zone: ZoneId, volume: u8 },

    /// Input of an auxiliary zone changed.
    ZoneSourceChanged { zone: ZoneId, code: String },

    /// A full resynchronization with the hardware finished.
    Refreshed,
}
