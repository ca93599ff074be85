// SPDX-License-Identifier: PMPL-1.0-or-later
//! Planner error types.

use logspool_segment::SegmentError;
use thiserror::Error;

/// Errors that can occur while planning a scan over a segment catalog.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("segment catalog error: {0}")]
    Segment(#[from] SegmentError),

    #[error("could not size segment: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for planner results.
pub type PlannerResult<T> = Result<T, PlannerError>;
