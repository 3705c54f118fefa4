//! Cached receiver state.
//!
//! One [`DeviceState`] exists per connection. The driver mutates it only
//! while it holds the transport lock, via [`DeviceState::apply`] (for both
//! optimistic command deltas and authoritative response deltas) and
//! [`DeviceState::register_zone`]. Callers only ever see cloned snapshots.

use std::collections::BTreeMap;

use tracing::debug;

use avrlib_core::{PowerState, ReceiverEvent, ZoneId, ZonePower};

use crate::parser::{DEFAULT_VOLUME_MAX, Fact, Level, StateDelta, ZONE_VOLUME_MAX, ZoneFact};

/// Cached state of one auxiliary zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneState {
    pub power: ZonePower,
    /// Zone volume in `0..=ZONE_VOLUME_MAX`.
    pub volume: u8,
    /// Wire code of the zone's input; empty until reported.
    pub source: String,
}

impl ZoneState {
    /// Volume as a fraction of the fixed zone scale.
    pub fn volume_level(&self) -> f32 {
        f32::from(self.volume) / f32::from(ZONE_VOLUME_MAX)
    }
}

/// Snapshot of everything the driver knows about the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub power: PowerState,
    /// Master volume in `0..=volume_max`, `99` on the wire already mapped to `0`.
    pub volume: u8,
    /// Top of the volume scale as last reported by `MVMAX`.
    pub volume_max: u8,
    pub muted: bool,
    /// Wire code of the selected input. Unknown codes are kept verbatim.
    pub source: String,
    /// Wire code of the surround mode.
    pub sound_mode: String,
    /// Confirmed zones only.
    pub zones: BTreeMap<ZoneId, ZoneState>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            power: PowerState::Unknown,
            volume: 0,
            volume_max: DEFAULT_VOLUME_MAX,
            muted: false,
            source: String::new(),
            sound_mode: String::new(),
            zones: BTreeMap::new(),
        }
    }
}

fn step(current: u8, level: Level, max: u8) -> u8 {
    match level {
        Level::Up => current.saturating_add(1).min(max),
        Level::Down => current.saturating_sub(1),
        Level::Set(value) => value.min(max),
    }
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Master volume as a fraction of `volume_max`.
    pub fn volume_level(&self) -> f32 {
        if self.volume_max == 0 {
            return 0.0;
        }
        f32::from(self.volume) / f32::from(self.volume_max)
    }

    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneState> {
        self.zones.get(&zone)
    }

    /// Confirmed zone identifiers, in probe order.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.keys().copied().collect()
    }

    /// Add a confirmed zone. Returns the event if the zone is new.
    pub(crate) fn register_zone(&mut self, zone: ZoneId) -> Option<ReceiverEvent> {
        if self.zones.contains_key(&zone) {
            return None;
        }
        debug!(zone = %zone, "zone registered");
        self.zones.insert(zone, ZoneState::default());
        Some(ReceiverEvent::ZoneAdded { zone })
    }

    /// Apply every fact in `delta`, returning an event per changed value.
    ///
    /// `MVMAX` facts are applied first so that the result does not depend
    /// on the order in which the device sent `MVMAX` and `MV` lines. Facts
    /// for zones that are not registered are dropped.
    pub(crate) fn apply(&mut self, delta: &StateDelta) -> Vec<ReceiverEvent> {
        let (max_facts, other_facts): (Vec<&Fact>, Vec<&Fact>) = delta
            .facts
            .iter()
            .partition(|fact| matches!(fact, Fact::VolumeMax(_)));

        let mut events = Vec::new();
        for fact in max_facts.into_iter().chain(other_facts) {
            if let Some(event) = self.apply_fact(fact) {
                events.push(event);
            }
        }
        events
    }

    fn apply_fact(&mut self, fact: &Fact) -> Option<ReceiverEvent> {
        match fact {
            Fact::Power(power) => {
                (self.power != *power).then(|| {
                    self.power = *power;
                    ReceiverEvent::PowerChanged { power: *power }
                })
            }
            Fact::Volume(level) => {
                let volume = step(self.volume, *level, self.volume_max);
                (self.volume != volume).then(|| {
                    self.volume = volume;
                    ReceiverEvent::VolumeChanged { volume }
                })
            }
            Fact::VolumeMax(volume_max) => {
                if self.volume_max == *volume_max {
                    return None;
                }
                self.volume_max = *volume_max;
                self.volume = self.volume.min(*volume_max);
                Some(ReceiverEvent::VolumeMaxChanged {
                    volume_max: *volume_max,
                })
            }
            Fact::Mute(muted) => (self.muted != *muted).then(|| {
                self.muted = *muted;
                ReceiverEvent::MuteChanged { muted: *muted }
            }),
            Fact::Source(code) => (self.source != *code).then(|| {
                self.source = code.clone();
                ReceiverEvent::SourceChanged { code: code.clone() }
            }),
            Fact::SoundMode(code) => (self.sound_mode != *code).then(|| {
                self.sound_mode = code.clone();
                ReceiverEvent::SoundModeChanged { code: code.clone() }
            }),
            Fact::Zone { zone, fact } => {
                let Some(state) = self.zones.get_mut(zone) else {
                    debug!(zone = %zone, "fact for unregistered zone dropped");
                    return None;
                };
                apply_zone_fact(*zone, state, fact)
            }
        }
    }
}

fn apply_zone_fact(zone: ZoneId, state: &mut ZoneState, fact: &ZoneFact) -> Option<ReceiverEvent> {
    match fact {
        ZoneFact::Power(power) => (state.power != *power).then(|| {
            state.power = *power;
            ReceiverEvent::ZonePowerChanged { zone, power: *power }
        }),
        ZoneFact::Volume(level) => {
            let volume = step(state.volume, *level, ZONE_VOLUME_MAX);
            (state.volume != volume).then(|| {
                state.volume = volume;
                ReceiverEvent::ZoneVolumeChanged { zone, volume }
            })
        }
        ZoneFact::Source(code) => (state.source != *code).then(|| {
            state.source = code.clone();
            ReceiverEvent::ZoneSourceChanged {
                zone,
                code: code.clone(),
            }
        }),
    }
}
