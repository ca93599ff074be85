// SPDX-License-Identifier: PMPL-1.0-or-later
//! Statistics carried over from an earlier analysis of a relation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page and tuple counts recorded by a previous analysis.
///
/// Only the density (tuples per page) is reused; the current page count is
/// always measured afresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorStats {
    pub pages: u64,
    pub tuples: f64,
    /// When the statistics were gathered.
    pub collected_at: Option<DateTime<Utc>>,
}

impl PriorStats {
    pub fn new(pages: u64, tuples: f64) -> Self {
        Self {
            pages,
            tuples,
            collected_at: None,
        }
    }

    /// Tuples per page, if the statistics are usable.
    pub fn density(&self) -> Option<f64> {
        (self.pages > 0 && self.tuples.is_finite() && self.tuples >= 0.0)
            .then(|| self.tuples / self.pages as f64)
    }

    /// Record the statistics from a completed scan.
    pub fn from_scan(pages: u64, rows_seen: u64) -> Self {
        Self {
            pages,
            tuples: rows_seen as f64,
            collected_at: Some(Utc::now()),
        }
    }
}
