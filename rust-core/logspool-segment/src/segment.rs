// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Segment naming and catalog
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Each segment is a single append-only file named
// `{prefix}-{YYYY}-{MM}-{DD}_{HHMMSS}.{ext}` from its creation time (UTC).
// Names sort lexically in creation order. Two rotations within the same
// second produce the same name, and the second one keeps appending to the
// file the first one created.
//
// The catalog is rebuilt from a directory listing on every call and is
// never persisted; files added or removed afterwards are only seen by the
// next listing.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SegmentError, SegmentResult};

/// Default cap on the number of segments a catalog returns.
pub const DEFAULT_MAX_SEGMENTS: usize = 16;

/// Default file name prefix.
pub const DEFAULT_PREFIX: &str = "logspool";

/// Extension of segments written by the spool.
pub const SPOOL_EXTENSION: &str = "dat";

/// Extension of csvlog segments produced by a server's own log collector.
pub const CSVLOG_EXTENSION: &str = "csv";

/// `strftime` pattern of the timestamp part of a segment name.
const NAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

// ---------------------------------------------------------------------------
// SegmentLayout
// ---------------------------------------------------------------------------

/// Prefix and extension shared by every segment of one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLayout {
    pub prefix: String,
    /// Extension without the leading dot.
    pub extension: String,
}

impl SegmentLayout {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Layout for csvlog directories (`.csv`).
    pub fn csvlog() -> Self {
        Self::new(DEFAULT_PREFIX, CSVLOG_EXTENSION)
    }

    /// Whether `name` carries this layout's extension.
    pub fn matches_extension(&self, name: &str) -> bool {
        name.len() > self.extension.len() + 1
            && name
                .strip_suffix(self.extension.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
    }
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, SPOOL_EXTENSION)
    }
}

/// Build the file name of a segment created at `created`.
///
/// Format: `logspool-2026-10-19_081502.dat`
pub fn segment_filename(layout: &SegmentLayout, created: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        layout.prefix,
        created.format(NAME_TIMESTAMP_FORMAT),
        layout.extension
    )
}

/// Build the full path of a segment in `dir`.
pub fn segment_path(dir: &Path, layout: &SegmentLayout, created: DateTime<Utc>) -> PathBuf {
    dir.join(segment_filename(layout, created))
}

/// Recover the creation time from a segment file name.
///
/// Returns `None` if the name does not follow the layout.
pub fn parse_segment_filename(layout: &SegmentLayout, name: &str) -> Option<DateTime<Utc>> {
    let stripped = name.strip_prefix(layout.prefix.as_str())?.strip_prefix('-')?;
    let stamp = stripped
        .strip_suffix(layout.extension.as_str())?
        .strip_suffix('.')?;
    let naive = NaiveDateTime::parse_from_str(stamp, NAME_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

// ---------------------------------------------------------------------------
// SegmentInfo
// ---------------------------------------------------------------------------

/// Metadata about one segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Absolute path to the segment file.
    pub path: PathBuf,

    /// Creation time encoded in the file name, if the name follows the
    /// layout.
    pub created: Option<DateTime<Utc>>,

    /// File size in bytes at listing time.
    pub file_size: u64,
}

impl SegmentInfo {
    fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or_default()
    }

    /// Chronological order: parsed timestamps first (oldest first), then
    /// names that carry no timestamp; ties broken by file name.
    fn chronological_cmp(&self, other: &Self) -> Ordering {
        match (self.created, other.created) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.file_name().cmp(other.file_name()))
    }
}

// ---------------------------------------------------------------------------
// SegmentCatalog
// ---------------------------------------------------------------------------

/// How a catalog orders the segments it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogOrder {
    /// Directory iteration order, truncated as soon as the cap is reached.
    /// Not necessarily chronological.
    Filesystem,
    /// Sorted by the timestamp in each name, oldest first, then capped.
    #[default]
    Chronological,
}

/// Discovers the segments of one directory.
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    dir: PathBuf,
    layout: SegmentLayout,
    max_segments: usize,
    order: CatalogOrder,
}

impl SegmentCatalog {
    /// Catalog over `dir` with the default cap and chronological order.
    pub fn new(dir: impl AsRef<Path>, layout: SegmentLayout) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            layout,
            max_segments: DEFAULT_MAX_SEGMENTS,
            order: CatalogOrder::default(),
        }
    }

    pub fn with_max_segments(mut self, max_segments: usize) -> Self {
        self.max_segments = max_segments;
        self
    }

    pub fn with_order(mut self, order: CatalogOrder) -> Self {
        self.order = order;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn max_segments(&self) -> usize {
        self.max_segments
    }

    /// List the segments currently in the directory.
    ///
    /// A missing directory is an empty catalog. Any other failure to read
    /// the directory is returned as a retryable [`SegmentError::List`].
    pub fn list(&self) -> SegmentResult<Vec<SegmentInfo>> {
        let list_error = |source: io::Error| SegmentError::List {
            dir: self.dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "Segment directory missing, catalog is empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(list_error(e)),
        };
        let base = fs::canonicalize(&self.dir).map_err(list_error)?;

        let mut segments = Vec::new();
        for dir_entry in entries {
            if self.order == CatalogOrder::Filesystem && segments.len() >= self.max_segments {
                break;
            }

            let dir_entry = dir_entry.map_err(list_error)?;
            let file_name = dir_entry.file_name();
            let name = file_name.to_string_lossy();
            if !self.layout.matches_extension(&name) {
                continue;
            }

            let metadata = match dir_entry.metadata() {
                Ok(metadata) => metadata,
                // Removed between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(list_error(e)),
            };
            if !metadata.is_file() {
                continue;
            }

            segments.push(SegmentInfo {
                path: base.join(&file_name),
                created: parse_segment_filename(&self.layout, &name),
                file_size: metadata.len(),
            });
        }

        if self.order == CatalogOrder::Chronological {
            segments.sort_by(SegmentInfo::chronological_cmp);
            segments.truncate(self.max_segments);
        }

        debug!(
            count = segments.len(),
            dir = %self.dir.display(),
            order = ?self.order,
            "Discovered segments"
        );

        Ok(segments)
    }
}
