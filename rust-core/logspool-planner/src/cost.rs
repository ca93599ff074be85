// SPDX-License-Identifier: PMPL-1.0-or-later
//! Size and cost estimation for sequential scans over segments.
//!
//! Sizes come from the filesystem at estimate time. Row counts come from
//! prior statistics when there are any, otherwise from the byte count and
//! an estimated tuple width. Costs follow the host's sequential-scan model
//! with each parsed line charged `parse_multiplier` tuples of CPU.

use std::fs;
use std::io::ErrorKind;

use logspool_segment::{Column, SegmentInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CostParams, SizingMode};
use crate::error::PlannerResult;
use crate::stats::PriorStats;

/// Page size used to convert bytes to pages.
pub const PAGE_SIZE: u64 = 8192;

/// Per-tuple header overhead assumed when estimating rows from bytes.
pub const TUPLE_HEADER_SIZE: u64 = 23;

/// Alignment applied to tuple widths and headers.
pub const MAX_ALIGN: u64 = 8;

/// Pages assumed for a segment that cannot be found.
pub const MISSING_SEGMENT_PAGES: u64 = 10;

/// Round `len` up to the next multiple of [`MAX_ALIGN`].
pub fn maxalign(len: u64) -> u64 {
    (len + MAX_ALIGN - 1) & !(MAX_ALIGN - 1)
}

/// Clamp a row estimate to a sane whole number, at least 1.
pub fn clamp_row_estimate(rows: f64) -> f64 {
    if rows.is_nan() || rows <= 1.0 {
        1.0
    } else {
        rows.round()
    }
}

/// Average width of a row holding `columns`.
pub fn row_width(columns: &[Column]) -> u32 {
    columns.iter().map(|c| c.avg_width()).sum()
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Estimated size of a segment relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelSize {
    pub pages: u64,
    /// Tuples in the relation before any restriction.
    pub tuples: f64,
    /// Tuples expected to survive the restriction.
    pub rows: f64,
    pub total_bytes: u64,
}

/// Bytes counted for sizing. Missing files count as
/// [`MISSING_SEGMENT_PAGES`] pages, as does an empty list.
pub fn segment_bytes(segments: &[SegmentInfo], sizing: SizingMode) -> PlannerResult<u64> {
    let counted = match sizing {
        SizingMode::FirstSegment => &segments[..segments.len().min(1)],
        SizingMode::AllSegments => segments,
    };

    if counted.is_empty() {
        return Ok(MISSING_SEGMENT_PAGES * PAGE_SIZE);
    }

    let mut total = 0u64;
    for segment in counted {
        total += match fs::metadata(&segment.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(segment = %segment.path.display(), "Segment missing, assuming default size");
                MISSING_SEGMENT_PAGES * PAGE_SIZE
            }
            Err(e) => return Err(e.into()),
        };
    }
    Ok(total)
}

/// Estimate pages, tuples and surviving rows of a relation.
///
/// `width` is the average width of the columns the consumer materialises.
/// `selectivity` is the fraction of tuples expected to pass the
/// restriction clauses (1.0 when there are none).
pub fn estimate_size(
    segments: &[SegmentInfo],
    prior: Option<&PriorStats>,
    width: u32,
    sizing: SizingMode,
    selectivity: f64,
) -> PlannerResult<RelSize> {
    let total_bytes = segment_bytes(segments, sizing)?;
    let pages = total_bytes.div_ceil(PAGE_SIZE).max(1);

    let tuples = match prior.and_then(PriorStats::density) {
        Some(density) => clamp_row_estimate(density * pages as f64),
        None => {
            let tuple_width = maxalign(u64::from(width)) + maxalign(TUPLE_HEADER_SIZE);
            clamp_row_estimate(total_bytes as f64 / tuple_width as f64)
        }
    };

    let selectivity = if selectivity.is_finite() {
        selectivity.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let rows = clamp_row_estimate(tuples * selectivity);

    debug!(
        segments = segments.len(),
        total_bytes, pages, tuples, rows, "Estimated segment relation size"
    );

    Ok(RelSize {
        pages,
        tuples,
        rows,
        total_bytes,
    })
}

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

/// Cost of evaluating the restriction clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    /// One-off cost paid before the first row.
    pub startup: f64,
    /// Cost paid for every tuple read.
    pub per_tuple: f64,
}

impl Restriction {
    pub fn new(startup: f64, per_tuple: f64) -> Self {
        Self { startup, per_tuple }
    }
}

/// Startup and total cost of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanCost {
    pub startup: f64,
    pub total: f64,
}

impl ScanCost {
    /// Cost incurred after the first row.
    pub fn run(&self) -> f64 {
        self.total - self.startup
    }
}

/// Cost of reading `pages` pages and parsing `tuples` lines.
pub fn estimate_cost(
    pages: u64,
    tuples: f64,
    restriction: &Restriction,
    params: &CostParams,
) -> ScanCost {
    let startup = restriction.startup;
    let cpu_per_tuple = params.per_line_cpu() + restriction.per_tuple;
    let run = params.seq_page_cost * pages as f64 + cpu_per_tuple * tuples;
    ScanCost {
        startup,
        total: startup + run,
    }
}
