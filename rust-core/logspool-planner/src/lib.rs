// SPDX-License-Identifier: PMPL-1.0-or-later
//! logspool planner
//!
//! Planning support for scans over a spool directory: relation size and
//! row estimates, sequential-scan costs, and the decision of which columns
//! a scan has to materialise.

pub mod config;
pub mod cost;
pub mod error;
pub mod pruning;
pub mod relation;
pub mod stats;

pub use config::{CostParams, RelationOptions, SizingMode};
pub use cost::{
    clamp_row_estimate, estimate_cost, estimate_size, maxalign, RelSize, Restriction, ScanCost,
    MISSING_SEGMENT_PAGES, PAGE_SIZE, TUPLE_HEADER_SIZE,
};
pub use error::{PlannerError, PlannerResult};
pub use pruning::{select_columns, ColumnRef, ColumnSelection};
pub use relation::{LogRelation, ScanMode, ScanPath};
pub use stats::PriorStats;
