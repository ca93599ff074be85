// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Severity levels and write-time filtering
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two views of severity live here. `Severity` is the level an event is
// raised with; it carries a numeric position and drives filtering.
// `SeverityTag` is what ends up in a segment line (debug levels collapse to
// `DEBUG`, unknown tokens become `???`).
//
// Filtering is not a plain `>=`: `LOG` is numerically low but operationally
// important, so for filtering purposes it sorts between `ERROR` and `FATAL`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder rendered for a severity the codec does not recognise.
pub const UNKNOWN_SEVERITY: &str = "???";

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// The level an event is raised with.
///
/// Discriminants are the numeric positions used by the normal ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug5 = 10,
    Debug4 = 11,
    Debug3 = 12,
    #[serde(alias = "debug")]
    Debug2 = 13,
    Debug1 = 14,
    /// Server operational message. Sorts out of numeric order when filtering.
    Log = 15,
    /// Client communication failure, logged like `Log` but never sent to
    /// the client.
    #[serde(rename = "commerror")]
    CommError = 16,
    Info = 17,
    Notice = 18,
    Warning = 19,
    Error = 20,
    Fatal = 21,
    Panic = 22,
}

impl Severity {
    /// All levels in numeric order.
    pub const ALL: [Severity; 13] = [
        Severity::Debug5,
        Severity::Debug4,
        Severity::Debug3,
        Severity::Debug2,
        Severity::Debug1,
        Severity::Log,
        Severity::CommError,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
        Severity::Panic,
    ];

    /// Numeric position in the normal ordering.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a numeric position back to a level.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Whether this is the level that sorts out of numeric order.
    pub fn is_log(self) -> bool {
        matches!(self, Severity::Log | Severity::CommError)
    }

    /// The tag written to a segment line for this level.
    pub fn tag(self) -> SeverityTag {
        match self {
            Severity::Debug5
            | Severity::Debug4
            | Severity::Debug3
            | Severity::Debug2
            | Severity::Debug1 => SeverityTag::Debug,
            Severity::Log | Severity::CommError => SeverityTag::Log,
            Severity::Info => SeverityTag::Info,
            Severity::Notice => SeverityTag::Notice,
            Severity::Warning => SeverityTag::Warning,
            Severity::Error => SeverityTag::Error,
            Severity::Fatal => SeverityTag::Fatal,
            Severity::Panic => SeverityTag::Panic,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug5 => "debug5",
            Severity::Debug4 => "debug4",
            Severity::Debug3 => "debug3",
            Severity::Debug2 => "debug2",
            Severity::Debug1 => "debug1",
            Severity::Log => "log",
            Severity::CommError => "commerror",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        };
        f.write_str(name)
    }
}

/// Error returned when a threshold name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity level: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Parse a threshold name. `debug` alone means `debug2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "debug2" => Ok(Severity::Debug2),
            "debug5" => Ok(Severity::Debug5),
            "debug4" => Ok(Severity::Debug4),
            "debug3" => Ok(Severity::Debug3),
            "debug1" => Ok(Severity::Debug1),
            "info" => Ok(Severity::Info),
            "notice" => Ok(Severity::Notice),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "log" => Ok(Severity::Log),
            "fatal" => Ok(Severity::Fatal),
            "panic" => Ok(Severity::Panic),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Decide whether an event at `level` passes a `threshold`.
///
/// `Log` is treated as if it sat between `Error` and `Fatal`:
/// - a `Log` event passes a `Log` threshold or any threshold at or below
///   `Error`;
/// - with a `Log` threshold, other events pass only at `Fatal` or above;
/// - otherwise the numeric ordering applies.
pub fn should_emit(level: Severity, threshold: Severity) -> bool {
    if level.is_log() {
        threshold.is_log() || threshold.code() <= Severity::Error.code()
    } else if threshold.is_log() {
        level.code() >= Severity::Fatal.code()
    } else {
        level.code() >= threshold.code()
    }
}

// ---------------------------------------------------------------------------
// SeverityTag
// ---------------------------------------------------------------------------

/// Severity as rendered into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTag {
    Debug,
    Log,
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
    Panic,
    /// Any token the codec does not know; rendered as `???`.
    #[serde(rename = "???")]
    Unknown,
}

impl SeverityTag {
    /// Canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTag::Debug => "DEBUG",
            SeverityTag::Log => "LOG",
            SeverityTag::Info => "INFO",
            SeverityTag::Notice => "NOTICE",
            SeverityTag::Warning => "WARNING",
            SeverityTag::Error => "ERROR",
            SeverityTag::Fatal => "FATAL",
            SeverityTag::Panic => "PANIC",
            SeverityTag::Unknown => UNKNOWN_SEVERITY,
        }
    }

    /// Parse a rendered tag. Never fails: unrecognised input maps to
    /// `Unknown`.
    pub fn parse(token: &str) -> Self {
        match token {
            "DEBUG" => SeverityTag::Debug,
            "LOG" => SeverityTag::Log,
            "INFO" => SeverityTag::Info,
            "NOTICE" => SeverityTag::Notice,
            "WARNING" => SeverityTag::Warning,
            "ERROR" => SeverityTag::Error,
            "FATAL" => SeverityTag::Fatal,
            "PANIC" => SeverityTag::Panic,
            _ => SeverityTag::Unknown,
        }
    }
}

impl fmt::Display for SeverityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Severity> for SeverityTag {
    fn from(severity: Severity) -> Self {
        severity.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_passes_second_highest_threshold() {
        assert!(should_emit(Severity::Log, Severity::Error));
        assert!(should_emit(Severity::Log, Severity::Warning));
        assert!(should_emit(Severity::Log, Severity::Log));
        assert!(should_emit(Severity::CommError, Severity::Debug5));
    }

    #[test]
    fn test_log_dropped_above_error() {
        assert!(!should_emit(Severity::Log, Severity::Fatal));
        assert!(!should_emit(Severity::Log, Severity::Panic));
    }

    #[test]
    fn test_log_threshold_only_passes_fatal_and_panic() {
        assert!(!should_emit(Severity::Error, Severity::Log));
        assert!(!should_emit(Severity::Warning, Severity::Log));
        assert!(should_emit(Severity::Fatal, Severity::Log));
        assert!(should_emit(Severity::Panic, Severity::Log));
    }

    #[test]
    fn test_normal_ordering() {
        assert!(should_emit(Severity::Warning, Severity::Warning));
        assert!(should_emit(Severity::Error, Severity::Warning));
        assert!(!should_emit(Severity::Debug1, Severity::Warning));
        assert!(!should_emit(Severity::Notice, Severity::Warning));
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!("debug".parse::<Severity>().unwrap(), Severity::Debug2);
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(" log ".parse::<Severity>().unwrap(), Severity::Log);
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_display_parse_roundtrip() {
        for level in Severity::ALL {
            if level == Severity::CommError {
                continue;
            }
            assert_eq!(level.to_string().parse::<Severity>().unwrap(), level);
        }
    }

    #[test]
    fn test_tag_collapses_debug_levels() {
        assert_eq!(Severity::Debug5.tag(), SeverityTag::Debug);
        assert_eq!(Severity::Debug1.tag(), SeverityTag::Debug);
        assert_eq!(Severity::CommError.tag(), SeverityTag::Log);
    }

    #[test]
    fn test_unknown_tag_placeholder() {
        assert_eq!(SeverityTag::parse("VERBOSE"), SeverityTag::Unknown);
        assert_eq!(SeverityTag::Unknown.as_str(), "???");
        assert_eq!(SeverityTag::parse("???"), SeverityTag::Unknown);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Severity::from_code(19), Some(Severity::Warning));
        assert_eq!(Severity::from_code(99), None);
    }

    #[test]
    fn test_serde_lowercase_names() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        let parsed: Severity = serde_json::from_str("\"fatal\"").unwrap();
        assert_eq!(parsed, Severity::Fatal);
    }
}
