//! Core types used throughout avrlib.
//!
//! These types describe the receiver's power and zone vocabulary and the
//! shape of a single command exchange on the serial link.

use std::fmt;
use std::str::FromStr;

/// Main-unit power state as reported by the `PW` command family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerState {
    /// The receiver is on (`PWON`).
    On,
    /// The receiver is in standby (`PWSTANDBY`).
    Standby,
    /// No power report has been seen yet.
    #[default]
    Unknown,
}

impl PowerState {
    /// Map a complete `PW` line to a power state.
    ///
    /// Returns `None` for anything other than the two literal tokens.
    pub fn from_wire(line: &str) -> Option<Self> {
        match line {
            "PWON" => Some(PowerState::On),
            "PWSTANDBY" => Some(PowerState::Standby),
            _ => None,
        }
    }

    /// Whether the receiver is known to be on.
    pub fn is_on(&self) -> bool {
        *self == PowerState::On
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::On => "on",
            PowerState::Standby => "standby",
            PowerState::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Power state of an auxiliary zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZonePower {
    On,
    #[default]
    Off,
}

impl fmt::Display for ZonePower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZonePower::On => write!(f, "on"),
            ZonePower::Off => write!(f, "off"),
        }
    }
}

/// Wire identifier of an auxiliary zone.
///
/// The identifier doubles as the command prefix for everything addressed
/// to the zone (`Z2ON`, `Z245`, `Z2DVD`, `Z2?`). Depending on the model the
/// third zone answers either to `Z3` or to `Z1`, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZoneId {
    /// Zone 2 (`Z2`).
    Zone2,
    /// Zone 3 (`Z3`).
    Zone3,
    /// Alternate name for the third zone on some models (`Z1`).
    Zone1,
}

impl ZoneId {
    /// All identifiers the protocol defines, in probe order.
    pub const ALL: [ZoneId; 3] = [ZoneId::Zone2, ZoneId::Zone3, ZoneId::Zone1];

    /// The two-character wire token for this zone.
    pub fn token(&self) -> &'static str {
        match self {
            ZoneId::Zone2 => "Z2",
            ZoneId::Zone3 => "Z3",
            ZoneId::Zone1 => "Z1",
        }
    }

    /// Look up a zone by its exact wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Z2" => Some(ZoneId::Zone2),
            "Z3" => Some(ZoneId::Zone3),
            "Z1" => Some(ZoneId::Zone1),
            _ => None,
        }
    }

    /// Split a wire line into its zone identifier and the remaining field.
    ///
    /// Only the first two characters are considered; whether the zone is
    /// actually present on the device is up to the caller.
    pub fn split_prefix(line: &str) -> Option<(Self, &str)> {
        let token = line.get(..2)?;
        let zone = Self::from_token(token)?;
        Some((zone, &line[2..]))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Error returned when a string cannot be parsed into a [`ZoneId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseZoneIdError(String);

impl fmt::Display for ParseZoneIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown zone identifier: {}", self.0)
    }
}

impl std::error::Error for ParseZoneIdError {}

impl FromStr for ZoneId {
    type Err = ParseZoneIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_token(&s.to_uppercase()).ok_or_else(|| ParseZoneIdError(s.to_string()))
    }
}

/// Options for a single command exchange.
///
/// Replaces keyword flags with an explicit record:
///
/// - `expect_response`: read response lines after the write. When `false`
///   the exchange returns as soon as the carriage return has been written.
/// - `want_all_lines`: return every line collected before the idle gap
///   instead of only the first one. Ignored unless `expect_response`.
/// - `update_cache`: feed the command (optimistically) and any response
///   lines (authoritatively) into the state cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub expect_response: bool,
    pub want_all_lines: bool,
    pub update_cache: bool,
}

impl ExecuteOptions {
    /// Fire-and-forget command that updates the cache (the default).
    pub const fn command() -> Self {
        ExecuteOptions {
            expect_response: false,
            want_all_lines: false,
            update_cache: true,
        }
    }

    /// Query returning the first response line.
    pub const fn query() -> Self {
        ExecuteOptions {
            expect_response: true,
            want_all_lines: false,
            update_cache: true,
        }
    }

    /// Query returning every response line.
    pub const fn query_all() -> Self {
        ExecuteOptions {
            expect_response: true,
            want_all_lines: true,
            update_cache: true,
        }
    }

    /// Same exchange, but leave the state cache untouched.
    pub const fn without_cache_update(mut self) -> Self {
        self.update_cache = false;
        self
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::command()
    }
}

/// What a command exchange hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No response was requested, or a single line was requested and none
    /// arrived before the idle gap.
    None,
    /// The first response line.
    Line(String),
    /// Every response line, possibly empty.
    Lines(Vec<String>),
}

impl Reply {
    /// The first line of the reply, if there is one.
    pub fn line(&self) -> Option<&str> {
        match self {
            Reply::None => None,
            Reply::Line(line) => Some(line),
            Reply::Lines(lines) => lines.first().map(String::as_str),
        }
    }

    /// Consume the reply into a list of lines.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Reply::None => Vec::new(),
            Reply::Line(line) => vec![line],
            Reply::Lines(lines) => lines,
        }
    }

    /// Whether the reply carries no lines at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Reply::None => true,
            Reply::Line(_) => false,
            Reply::Lines(lines) => lines.is_empty(),
        }
    }
}
