//! Denon command builders.
//!
//! Each function returns the command text without its carriage return;
//! [`crate::io::write_command`] appends the terminator on the wire. Builders
//! that take caller input validate it and return
//! [`Error::InvalidParameter`] rather than producing a command the receiver
//! would silently ignore.

use avrlib_core::{Error, Result, ZoneId};

/// Wire code of the tuner input.
pub const TUNER_SOURCE: &str = "TUNER";

/// Lowest FM frequency accepted by `TF`, in 10 kHz units (88.00 MHz).
pub const TUNER_FREQ_MIN: u32 = 8800;

/// Highest FM frequency accepted by `TF`, in 10 kHz units (108.00 MHz).
pub const TUNER_FREQ_MAX: u32 = 10800;

/// Highest value a two-digit volume field can carry.
const VOLUME_FIELD_MAX: u8 = 99;

fn validate_code(kind: &str, code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(Error::InvalidParameter(format!("empty {kind} code")));
    }
    if code.bytes().any(|b| !(0x20..0x7f).contains(&b) || b == b'?') {
        return Err(Error::InvalidParameter(format!("{kind} code {code:?}")));
    }
    Ok(())
}

fn volume_field(volume: u8) -> Result<String> {
    if volume > VOLUME_FIELD_MAX {
        return Err(Error::InvalidParameter(format!("volume {volume}")));
    }
    Ok(format!("{volume:02}"))
}

/// Convert a `0.0..=1.0` fraction into an absolute volume on a `max` scale.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `level` is not a finite value in
/// `0.0..=1.0`.
pub fn volume_from_level(level: f32, max: u8) -> Result<u8> {
    if !level.is_finite() || !(0.0..=1.0).contains(&level) {
        return Err(Error::InvalidParameter(format!("volume level {level}")));
    }
    Ok((level * f32::from(max)).round() as u8)
}

// ---------------------------------------------------------------
// Main zone
// ---------------------------------------------------------------

/// `PW?`
pub fn cmd_query_power() -> String {
    "PW?".into()
}

/// `PWON` or `PWSTANDBY`.
pub fn cmd_power(on: bool) -> String {
    String::from(if on { "PWON" } else { "PWSTANDBY" })
}

/// `MV?`, answered with `MV<nn>` and usually `MVMAX <nn>`.
pub fn cmd_query_volume() -> String {
    "MV?".into()
}

pub fn cmd_volume_up() -> String {
    "MVUP".into()
}

pub fn cmd_volume_down() -> String {
    "MVDOWN".into()
}

/// `MV<nn>`, zero-padded to two digits.
pub fn cmd_set_volume(volume: u8) -> Result<String> {
    Ok(format!("MV{}", volume_field(volume)?))
}

/// `MU?`
pub fn cmd_query_mute() -> String {
    "MU?".into()
}

/// `MUON` or `MUOFF`.
pub fn cmd_mute(muted: bool) -> String {
    String::from(if muted { "MUON" } else { "MUOFF" })
}

/// `SI?`
pub fn cmd_query_source() -> String {
    "SI?".into()
}

/// `SI<code>`, e.g. `SIPHONO`.
pub fn cmd_select_source(code: &str) -> Result<String> {
    validate_code("source", code)?;
    Ok(format!("SI{code}"))
}

/// `MS?`
pub fn cmd_query_sound_mode() -> String {
    "MS?".into()
}

/// `MS<code>`, e.g. `MSSTEREO`.
pub fn cmd_select_sound_mode(code: &str) -> Result<String> {
    validate_code("sound mode", code)?;
    Ok(format!("MS{code}"))
}

/// Tuner preset or frequency command for a media id.
///
/// - A band letter `A`..`G` followed by a preset digit `0`..`8` (`"A1"`)
///   selects a preset: `TPA1`.
/// - An FM frequency in 10 kHz units within
///   [`TUNER_FREQ_MIN`]..=[`TUNER_FREQ_MAX`] (`"9850"`) tunes directly:
///   `TF009850`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for any other id.
pub fn cmd_tuner(media_id: &str) -> Result<String> {
    let bytes = media_id.as_bytes();
    let is_preset = bytes.len() >= 2
        && (b'A'..=b'G').contains(&bytes[0])
        && (b'0'..=b'8').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_alphanumeric);
    if is_preset {
        return Ok(format!("TP{media_id}"));
    }

    if !media_id.is_empty() && bytes.iter().all(u8::is_ascii_digit) {
        if let Ok(freq) = media_id.parse::<u32>() {
            if (TUNER_FREQ_MIN..=TUNER_FREQ_MAX).contains(&freq) {
                return Ok(format!("TF{freq:06}"));
            }
        }
    }

    Err(Error::InvalidParameter(format!("tuner media id {media_id:?}")))
}

// ---------------------------------------------------------------
// Auxiliary zones
// ---------------------------------------------------------------

/// `<zone>?`, answered with power, source and volume lines.
pub fn cmd_query_zone(zone: ZoneId) -> String {
    format!("{zone}?")
}

/// `<zone>ON` or `<zone>OFF`.
pub fn cmd_zone_power(zone: ZoneId, on: bool) -> String {
    format!("{zone}{}", if on { "ON" } else { "OFF" })
}

pub fn cmd_zone_volume_up(zone: ZoneId) -> String {
    format!("{zone}UP")
}

pub fn cmd_zone_volume_down(zone: ZoneId) -> String {
    format!("{zone}DOWN")
}

/// `<zone><nn>`, zero-padded to two digits.
pub fn cmd_zone_set_volume(zone: ZoneId, volume: u8) -> Result<String> {
    Ok(format!("{zone}{}", volume_field(volume)?))
}

/// `<zone><code>`.
///
/// All-digit codes and the literal `ON`/`OFF`/`UP`/`DOWN` are rejected
/// since the receiver would read them as a volume or power command.
pub fn cmd_zone_select_source(zone: ZoneId, code: &str) -> Result<String> {
    validate_code("source", code)?;
    let reserved = matches!(code, "ON" | "OFF" | "UP" | "DOWN")
        || code.bytes().all(|b| b.is_ascii_digit());
    if reserved {
        return Err(Error::InvalidParameter(format!(
            "{code:?} is not a zone source code"
        )));
    }
    Ok(format!("{zone}{code}"))
}
