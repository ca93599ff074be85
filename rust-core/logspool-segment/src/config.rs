// SPDX-License-Identifier: PMPL-1.0-or-later
//! Spool configuration.
//!
//! Every field is hot-reloadable through [`crate::writer::SpoolWriter::reconfigure`]
//! or a [`crate::writer::ReloadHandle`]. Changing `directory` schedules a
//! segment rotation.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::segment::{SegmentLayout, DEFAULT_MAX_SEGMENTS};
use crate::severity::Severity;

/// Default spool directory, relative to the host's working directory.
pub const DEFAULT_DIRECTORY: &str = "logspool";

/// How hard the writer pushes each line to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Flush each line to the OS; nothing is buffered in the process.
    #[default]
    Flush,
    /// Flush and `fdatasync` each line.
    Fsync,
}

/// Configuration of the spool writer and of catalogs built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// Directory segments are written to. Empty disables spooling.
    pub directory: PathBuf,
    /// Events below this level are dropped before encoding.
    pub min_severity: Severity,
    /// Cap on the number of segments a catalog lists.
    pub max_segments: usize,
    pub layout: SegmentLayout,
    pub sync_mode: SyncMode,
    /// Events at or above this level carry the statement that raised them.
    pub min_error_statement: Severity,
    /// Whether to record the source location (`function, file:line`).
    pub verbose_location: bool,
}

impl SpoolConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// Return the configuration with its directory canonicalised lexically:
    /// `.` components and trailing separators removed, `..` folded where a
    /// preceding normal component exists. The filesystem is not consulted.
    pub fn normalized(mut self) -> Self {
        self.directory = normalize_path(&self.directory);
        self
    }

    /// Whether a directory is configured at all.
    pub fn is_enabled(&self) -> bool {
        !self.directory.as_os_str().is_empty()
    }
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            min_severity: Severity::Warning,
            max_segments: DEFAULT_MAX_SEGMENTS,
            layout: SegmentLayout::default(),
            sync_mode: SyncMode::default(),
            min_error_statement: Severity::Error,
            verbose_location: false,
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                if matches!(last, Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpoolConfig::default();
        assert_eq!(config.directory, PathBuf::from("logspool"));
        assert_eq!(config.min_severity, Severity::Warning);
        assert_eq!(config.max_segments, 16);
        assert_eq!(config.layout.extension, "dat");
        assert_eq!(config.sync_mode, SyncMode::Flush);
        assert_eq!(config.min_error_statement, Severity::Error);
        assert!(!config.verbose_location);
        assert!(config.is_enabled());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SpoolConfig::from_json(
            r#"{"directory": "/var/spool/./logspool/", "min_severity": "log"}"#,
        )
        .unwrap();
        assert_eq!(config.directory, PathBuf::from("/var/spool/logspool"));
        assert_eq!(config.min_severity, Severity::Log);
        assert_eq!(config.max_segments, 16);
    }

    #[test]
    fn test_from_json_rejects_bad_severity() {
        assert!(SpoolConfig::from_json(r#"{"min_severity": "loud"}"#).is_err());
    }

    #[test]
    fn test_normalize_parent_components() {
        assert_eq!(normalize_path(Path::new("a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("./spool/")), PathBuf::from("spool"));
    }

    #[test]
    fn test_empty_directory_disables() {
        assert!(!SpoolConfig::new("").is_enabled());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = SpoolConfig::new("/tmp/spool").with_min_severity(Severity::Notice);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SpoolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
