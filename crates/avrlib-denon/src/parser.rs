//! Response parser: wire lines to typed state facts.
//!
//! Every line is classified by an explicit ordered predicate chain, so
//! overlapping prefixes resolve the same way every time:
//!
//! 1. `PWON` / `PWSTANDBY`
//! 2. `MVMAX` (before `MV`, which it also matches)
//! 3. `MVUP` / `MVDOWN`
//! 4. `MV<nn>`
//! 5. `MUON` / `MUOFF`
//! 6. `SI<code>` / `MS<code>`
//! 7. `<zone><field>` for confirmed zones only, where the field is tried as
//!    `ON`/`OFF`, then all digits (volume), then `UP`/`DOWN`, and anything
//!    else is a source code.
//!
//! The functions here are pure. [`interpret_command`] describes what a
//! just-written command implies; [`interpret_response`] describes what the
//! lines answering a query establish. Lines that match nothing, or that
//! belong to a different family than the command that produced them, are
//! logged and dropped.

use tracing::debug;

use avrlib_core::{Error, PowerState, Result, ZoneId, ZonePower};

use crate::protocol::is_query;

/// Top of the main volume scale until the device reports `MVMAX`.
pub const DEFAULT_VOLUME_MAX: u8 = 60;

/// Fixed top of every zone's volume scale.
pub const ZONE_VOLUME_MAX: u8 = 60;

/// Wire volume that stands for the bottom of the scale.
pub const MIN_VOLUME_ALIAS: u8 = 99;

/// A volume change: relative step or absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Up,
    Down,
    /// Absolute value, already normalized.
    Set(u8),
}

/// One fact about an auxiliary zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneFact {
    Power(ZonePower),
    Volume(Level),
    Source(String),
}

/// One fact about the device, decoded from a single wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    Power(PowerState),
    Volume(Level),
    VolumeMax(u8),
    Mute(bool),
    Source(String),
    SoundMode(String),
    Zone { zone: ZoneId, fact: ZoneFact },
}

impl Fact {
    /// The command family this fact belongs to.
    pub fn family(&self) -> Family {
        match self {
            Fact::Power(_) => Family::Power,
            Fact::Volume(_) | Fact::VolumeMax(_) => Family::Volume,
            Fact::Mute(_) => Family::Mute,
            Fact::Source(_) => Family::Source,
            Fact::SoundMode(_) => Family::SoundMode,
            Fact::Zone { zone, .. } => Family::Zone(*zone),
        }
    }
}

/// Command family, keyed by the command's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Power,
    Volume,
    Mute,
    Source,
    SoundMode,
    Zone(ZoneId),
    /// Anything else (tuner, unknown prefixes). Carries no cached state.
    Other,
}

impl Family {
    /// Classify a command or response line by its prefix.
    pub fn of(text: &str) -> Family {
        if let Some((zone, _)) = ZoneId::split_prefix(text) {
            return Family::Zone(zone);
        }
        match text.get(..2) {
            Some("PW") => Family::Power,
            Some("MV") => Family::Volume,
            Some("MU") => Family::Mute,
            Some("SI") => Family::Source,
            Some("MS") => Family::SoundMode,
            _ => Family::Other,
        }
    }
}

/// The facts established by one command or one response, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub facts: Vec<Fact>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

// ---------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------

/// Parse a two-digit volume field, mapping `99` to `0`.
///
/// Only the first two characters are significant; trailing digits (the
/// half-step suffix some models send, as in `MV455`) are ignored.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the field does not start with two
/// ASCII digits.
pub fn parse_volume(field: &str) -> Result<u8> {
    let digits = field
        .get(..2)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::MalformedResponse(format!("volume field {field:?}")))?;
    let value: u8 = digits
        .parse()
        .map_err(|e| Error::MalformedResponse(format!("volume field {field:?} ({e})")))?;
    Ok(if value == MIN_VOLUME_ALIAS { 0 } else { value })
}

/// Parse the field following `MVMAX` (e.g. `" 80"`).
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the trimmed field does not start
/// with two ASCII digits.
pub fn parse_volume_max(field: &str) -> Result<u8> {
    let field = field.trim();
    field
        .get(..2)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| Error::MalformedResponse(format!("MVMAX field {field:?}")))
}

/// Resolve the field after a zone prefix.
fn parse_zone_field(field: &str) -> Result<Option<ZoneFact>> {
    let fact = match field {
        "" => return Ok(None),
        "ON" => ZoneFact::Power(ZonePower::On),
        "OFF" => ZoneFact::Power(ZonePower::Off),
        f if f.bytes().all(|b| b.is_ascii_digit()) => ZoneFact::Volume(Level::Set(parse_volume(f)?)),
        "UP" => ZoneFact::Volume(Level::Up),
        "DOWN" => ZoneFact::Volume(Level::Down),
        code => ZoneFact::Source(code.to_string()),
    };
    Ok(Some(fact))
}

/// Classify one wire line.
///
/// `zones` are the confirmed zone identifiers; zone lines for any other
/// identifier are not recognized. Returns `Ok(None)` for lines that carry
/// no state (queries, tuner commands, unknown prefixes).
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] when the line's prefix is known but
/// its field is not (e.g. `MVxx`).
pub fn parse_line(line: &str, zones: &[ZoneId]) -> Result<Option<Fact>> {
    if is_query(line) {
        return Ok(None);
    }
    if let Some(power) = PowerState::from_wire(line) {
        return Ok(Some(Fact::Power(power)));
    }
    if let Some(field) = line.strip_prefix("MVMAX") {
        return parse_volume_max(field).map(|max| Some(Fact::VolumeMax(max)));
    }
    match line {
        "MVUP" => return Ok(Some(Fact::Volume(Level::Up))),
        "MVDOWN" => return Ok(Some(Fact::Volume(Level::Down))),
        "MUON" => return Ok(Some(Fact::Mute(true))),
        "MUOFF" => return Ok(Some(Fact::Mute(false))),
        _ => {}
    }
    if let Some(field) = line.strip_prefix("MV") {
        return parse_volume(field).map(|v| Some(Fact::Volume(Level::Set(v))));
    }
    if let Some(code) = line.strip_prefix("SI").filter(|c| !c.is_empty()) {
        return Ok(Some(Fact::Source(code.to_string())));
    }
    if let Some(code) = line.strip_prefix("MS").filter(|c| !c.is_empty()) {
        return Ok(Some(Fact::SoundMode(code.to_string())));
    }
    match ZoneId::split_prefix(line) {
        Some((zone, field)) if zones.contains(&zone) => {
            Ok(parse_zone_field(field)?.map(|fact| Fact::Zone { zone, fact }))
        }
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------
// Command / response interpretation
// ---------------------------------------------------------------

/// What a just-written command implies about device state.
///
/// Queries imply nothing; their answers are handled by
/// [`interpret_response`].
pub fn interpret_command(command: &str, zones: &[ZoneId]) -> StateDelta {
    let mut delta = StateDelta::default();
    if is_query(command) {
        return delta;
    }
    match parse_line(command, zones) {
        Ok(Some(fact)) => delta.facts.push(fact),
        Ok(None) => {}
        Err(e) => debug!(command = %command, error = %e, "command implies no state"),
    }
    delta
}

/// What the response lines to `command` establish.
///
/// Lines outside the command's family, unrecognized lines and malformed
/// lines are skipped individually; the rest of the batch still applies.
pub fn interpret_response(command: &str, lines: &[String], zones: &[ZoneId]) -> StateDelta {
    let family = Family::of(command);
    let mut delta = StateDelta::default();
    for line in lines {
        match parse_line(line, zones) {
            Ok(Some(fact)) if fact.family() == family => delta.facts.push(fact),
            Ok(Some(_)) => {
                debug!(command = %command, line = %line, "line outside command family, skipped")
            }
            Ok(None) => debug!(command = %command, line = %line, "unrecognized line, skipped"),
            Err(e) => debug!(command = %command, line = %line, error = %e, "skipping line"),
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONES: &[ZoneId] = &[ZoneId::Zone2, ZoneId::Zone1];

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn parse(line: &str) -> Option<Fact> {
        parse_line(line, ZONES).unwrap()
    }

    // ---------------------------------------------------------------
    // Field parsers
    // ---------------------------------------------------------------

    #[test]
    fn volume_wire_values_normalize() {
        for v in 0..=99u8 {
            let field = format!("{v:02}");
            let expected = if v == 99 { 0 } else { v };
            assert_eq!(parse_volume(&field).unwrap(), expected, "wire {field}");
        }
    }

    #[test]
    fn volume_ignores_half_step_suffix() {
        assert_eq!(parse_volume("455").unwrap(), 45);
    }

    #[test]
    fn volume_rejects_short_or_non_digit() {
        assert!(matches!(parse_volume("5"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_volume("x5"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_volume(""), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn volume_max_with_and_without_space() {
        assert_eq!(parse_volume_max(" 80").unwrap(), 80);
        assert_eq!(parse_volume_max("80").unwrap(), 80);
        assert_eq!(parse_volume_max(" 805").unwrap(), 80);
        assert!(parse_volume_max(" x").is_err());
    }

    // ---------------------------------------------------------------
    // Line classification
    // ---------------------------------------------------------------

    #[test]
    fn power_lines() {
        assert_eq!(parse("PWON"), Some(Fact::Power(PowerState::On)));
        assert_eq!(parse("PWSTANDBY"), Some(Fact::Power(PowerState::Standby)));
        assert_eq!(parse("PWOFF"), None);
    }

    #[test]
    fn volume_max_checked_before_volume() {
        assert_eq!(parse("MVMAX 80"), Some(Fact::VolumeMax(80)));
        assert_eq!(parse("MV45"), Some(Fact::Volume(Level::Set(45))));
        assert_eq!(parse("MV99"), Some(Fact::Volume(Level::Set(0))));
        assert_eq!(parse("MVUP"), Some(Fact::Volume(Level::Up)));
        assert_eq!(parse("MVDOWN"), Some(Fact::Volume(Level::Down)));
    }

    #[test]
    fn malformed_volume_is_an_error() {
        assert!(matches!(parse_line("MVxx", ZONES), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_line("MVMAX", ZONES), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn mute_source_and_sound_mode() {
        assert_eq!(parse("MUON"), Some(Fact::Mute(true)));
        assert_eq!(parse("MUOFF"), Some(Fact::Mute(false)));
        assert_eq!(parse("SIPHONO"), Some(Fact::Source("PHONO".into())));
        assert_eq!(parse("SIV.AUX"), Some(Fact::Source("V.AUX".into())));
        assert_eq!(parse("MSDOLBY DIGITAL"), Some(Fact::SoundMode("DOLBY DIGITAL".into())));
        assert_eq!(parse("SI"), None);
    }

    #[test]
    fn zone_digits_are_volume_not_source() {
        assert_eq!(
            parse("Z210"),
            Some(Fact::Zone {
                zone: ZoneId::Zone2,
                fact: ZoneFact::Volume(Level::Set(10)),
            })
        );
        assert_eq!(
            parse("Z299"),
            Some(Fact::Zone {
                zone: ZoneId::Zone2,
                fact: ZoneFact::Volume(Level::Set(0)),
            })
        );
    }

    #[test]
    fn zone_field_precedence() {
        let zone = ZoneId::Zone2;
        assert_eq!(
            parse("Z2ON"),
            Some(Fact::Zone { zone, fact: ZoneFact::Power(ZonePower::On) })
        );
        assert_eq!(
            parse("Z2OFF"),
            Some(Fact::Zone { zone, fact: ZoneFact::Power(ZonePower::Off) })
        );
        assert_eq!(
            parse("Z2UP"),
            Some(Fact::Zone { zone, fact: ZoneFact::Volume(Level::Up) })
        );
        assert_eq!(
            parse("Z2DVD"),
            Some(Fact::Zone { zone, fact: ZoneFact::Source("DVD".into()) })
        );
        // Mixed text is a source code, never a partial number.
        assert_eq!(
            parse("Z2VCR-1"),
            Some(Fact::Zone { zone, fact: ZoneFact::Source("VCR-1".into()) })
        );
        assert_eq!(parse("Z2"), None);
    }

    #[test]
    fn single_digit_zone_volume_is_malformed() {
        assert!(matches!(parse_line("Z25", ZONES), Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn unconfirmed_zone_lines_are_not_recognized() {
        assert_eq!(parse("Z3ON"), None);
        assert_eq!(parse_line("Z3ON", &[]).unwrap(), None);
    }

    #[test]
    fn queries_and_tuner_commands_carry_no_fact() {
        assert_eq!(parse("PW?"), None);
        assert_eq!(parse("Z2?"), None);
        assert_eq!(parse("TPA1"), None);
        assert_eq!(parse("TF009850"), None);
    }

    #[test]
    fn family_of_commands() {
        assert_eq!(Family::of("PW?"), Family::Power);
        assert_eq!(Family::of("MVMAX 80"), Family::Volume);
        assert_eq!(Family::of("MU?"), Family::Mute);
        assert_eq!(Family::of("SI?"), Family::Source);
        assert_eq!(Family::of("MS?"), Family::SoundMode);
        assert_eq!(Family::of("Z1?"), Family::Zone(ZoneId::Zone1));
        assert_eq!(Family::of("TPA1"), Family::Other);
        assert_eq!(Family::of(""), Family::Other);
    }

    // ---------------------------------------------------------------
    // interpret_command / interpret_response
    // ---------------------------------------------------------------

    #[test]
    fn query_command_implies_nothing() {
        assert!(interpret_command("MV?", ZONES).is_empty());
        assert!(interpret_command("Z2?", ZONES).is_empty());
    }

    #[test]
    fn set_command_implies_fact() {
        let delta = interpret_command("SIPHONO", ZONES);
        assert_eq!(delta.facts, vec![Fact::Source("PHONO".into())]);
    }

    #[test]
    fn volume_response_both_orders() {
        let a = interpret_response("MV?", &lines(&["MVMAX 80", "MV45"]), ZONES);
        let b = interpret_response("MV?", &lines(&["MV45", "MVMAX 80"]), ZONES);
        assert!(a.facts.contains(&Fact::VolumeMax(80)));
        assert!(a.facts.contains(&Fact::Volume(Level::Set(45))));
        assert_eq!(a.facts.len(), 2);
        assert_eq!(b.facts.len(), 2);
    }

    #[test]
    fn bad_line_does_not_abort_batch() {
        let delta = interpret_response("MV?", &lines(&["MVxx", "garbage", "MVMAX 70"]), ZONES);
        assert_eq!(delta.facts, vec![Fact::VolumeMax(70)]);
    }

    #[test]
    fn out_of_family_lines_are_skipped() {
        let delta = interpret_response("PW?", &lines(&["PWON", "MV45", "Z2ON"]), ZONES);
        assert_eq!(delta.facts, vec![Fact::Power(PowerState::On)]);
    }

    #[test]
    fn zone_query_response() {
        let delta = interpret_response("Z2?", &lines(&["Z2ON", "Z2CD", "Z250"]), ZONES);
        assert_eq!(
            delta.facts,
            vec![
                Fact::Zone { zone: ZoneId::Zone2, fact: ZoneFact::Power(ZonePower::On) },
                Fact::Zone { zone: ZoneId::Zone2, fact: ZoneFact::Source("CD".into()) },
                Fact::Zone { zone: ZoneId::Zone2, fact: ZoneFact::Volume(Level::Set(50)) },
            ]
        );
    }
}
