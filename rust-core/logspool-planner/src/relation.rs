// SPDX-License-Identifier: PMPL-1.0-or-later
//! A segment catalog exposed as a plannable relation.
//!
//! Follows the host's foreign-scan lifecycle: size the relation, produce a
//! costed access path, then begin (and possibly restart) the scan. The
//! catalog is listed when sizing and listed again when the scan begins, so
//! segments rotated in between are picked up by the scan.

use logspool_segment::{SegmentCatalog, SegmentInfo, SegmentScan, SpoolConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RelationOptions;
use crate::cost::{estimate_cost, estimate_size, RelSize, Restriction};
use crate::error::PlannerResult;
use crate::pruning::{select_columns, ColumnRef, ColumnSelection};

/// Whether a scan is going to be executed or only described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Execute,
    ExplainOnly,
}

/// A costed way to scan the relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPath {
    pub rows: f64,
    pub startup_cost: f64,
    pub total_cost: f64,
    pub pages: u64,
    pub tuples: f64,
    pub selection: ColumnSelection,
}

#[derive(Debug, Clone)]
struct PlanningState {
    segments: Vec<SegmentInfo>,
    selectivity: f64,
    size: RelSize,
}

/// The segments of one spool directory, planned and scanned as one relation.
#[derive(Debug)]
pub struct LogRelation {
    catalog: SegmentCatalog,
    options: RelationOptions,
    planned: Option<PlanningState>,
}

impl LogRelation {
    pub fn new(catalog: SegmentCatalog, options: RelationOptions) -> Self {
        Self {
            catalog,
            options,
            planned: None,
        }
    }

    /// A relation over the directory a spool writer is configured for.
    pub fn for_spool(config: &SpoolConfig, options: RelationOptions) -> Self {
        let catalog = SegmentCatalog::new(&config.directory, config.layout.clone())
            .with_max_segments(config.max_segments);
        Self::new(catalog, options)
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &RelationOptions {
        &self.options
    }

    /// Size the relation assuming every column is read.
    ///
    /// The segment list and the estimate are kept for [`Self::paths`].
    pub fn rel_size(&mut self, selectivity: f64) -> PlannerResult<RelSize> {
        let state = self.plan(selectivity)?;
        let size = state.size;
        self.planned = Some(state);
        Ok(size)
    }

    /// Build the access path for a consumer referencing `required`.
    ///
    /// Sizes the relation first if [`Self::rel_size`] has not been called.
    pub fn paths(
        &mut self,
        required: &[ColumnRef],
        restriction: &Restriction,
    ) -> PlannerResult<ScanPath> {
        let selection = select_columns(required)?;

        let state = match self.planned.take() {
            Some(state) => state,
            None => self.plan(1.0)?,
        };
        let path = self.build_path(&state, selection, restriction);
        self.planned = Some(state);
        path
    }

    /// Start a scan along `path`. Explain-only requests open nothing.
    pub fn begin_scan(
        &self,
        path: &ScanPath,
        mode: ScanMode,
    ) -> PlannerResult<Option<SegmentScan>> {
        if mode == ScanMode::ExplainOnly {
            return Ok(None);
        }
        let segments = self.catalog.list()?;
        debug!(segments = segments.len(), "Beginning segment scan");
        Ok(Some(SegmentScan::new(segments, &path.selection.columns())))
    }

    /// Restart `scan` from the first segment of a fresh listing.
    pub fn rescan(&self, scan: &mut SegmentScan) -> PlannerResult<()> {
        scan.reset(self.catalog.list()?);
        Ok(())
    }

    fn plan(&self, selectivity: f64) -> PlannerResult<PlanningState> {
        let segments = self.catalog.list()?;
        let size = estimate_size(
            &segments,
            self.options.prior.as_ref(),
            ColumnSelection::All.width(),
            self.options.sizing,
            selectivity,
        )?;

        debug!(
            dir = %self.catalog.dir().display(),
            segments = segments.len(),
            pages = size.pages,
            rows = size.rows,
            "Sized segment relation"
        );

        Ok(PlanningState {
            segments,
            selectivity,
            size,
        })
    }

    fn build_path(
        &self,
        state: &PlanningState,
        selection: ColumnSelection,
        restriction: &Restriction,
    ) -> PlannerResult<ScanPath> {
        let size = estimate_size(
            &state.segments,
            self.options.prior.as_ref(),
            selection.width(),
            self.options.sizing,
            state.selectivity,
        )?;
        let cost = estimate_cost(size.pages, size.tuples, restriction, &self.options.cost);

        debug!(
            pruned = selection.is_pruned(),
            width = selection.width(),
            rows = size.rows,
            total_cost = cost.total,
            "Built segment scan path"
        );

        Ok(ScanPath {
            rows: size.rows,
            startup_cost: cost.startup,
            total_cost: cost.total,
            pages: size.pages,
            tuples: size.tuples,
            selection,
        })
    }
}
