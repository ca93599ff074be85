// SPDX-License-Identifier: PMPL-1.0-or-later
//! Column pruning.
//!
//! Decides which columns a scan has to materialise, given every column the
//! consumer references in its projection and restriction clauses.

use std::collections::BTreeSet;

use logspool_segment::{Column, COLUMN_COUNT};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};

/// A column reference made by the consumer of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRef {
    /// The whole row (`t.*` or the row value itself).
    WholeRow,
    /// A user column by name.
    Named(String),
    /// A system attribute such as a row locator; never stored in segments.
    System(String),
}

impl ColumnRef {
    pub fn named(name: impl Into<String>) -> Self {
        ColumnRef::Named(name.into())
    }
}

/// Columns a scan must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSelection {
    /// Every column, in schema order.
    All,
    /// Only these, in schema order. May be empty (e.g. a bare row count).
    Pruned(Vec<Column>),
}

impl ColumnSelection {
    /// The projection to hand to a scan.
    pub fn columns(&self) -> Vec<Column> {
        match self {
            ColumnSelection::All => Column::ALL.to_vec(),
            ColumnSelection::Pruned(columns) => columns.clone(),
        }
    }

    pub fn is_pruned(&self) -> bool {
        matches!(self, ColumnSelection::Pruned(_))
    }

    /// Average row width of the selected columns.
    pub fn width(&self) -> u32 {
        crate::cost::row_width(&self.columns())
    }
}

/// Work out the columns needed to satisfy `required`.
///
/// A whole-row reference disables pruning. System attributes are ignored.
/// Referencing every column is the same as referencing the whole row.
pub fn select_columns(required: &[ColumnRef]) -> PlannerResult<ColumnSelection> {
    let mut needed = BTreeSet::new();

    for reference in required {
        match reference {
            ColumnRef::WholeRow => return Ok(ColumnSelection::All),
            ColumnRef::System(_) => {}
            ColumnRef::Named(name) => {
                let column = Column::from_name(name)
                    .ok_or_else(|| PlannerError::UnknownColumn(name.clone()))?;
                needed.insert(column);
            }
        }
    }

    if needed.len() == COLUMN_COUNT {
        return Ok(ColumnSelection::All);
    }

    let mut columns: Vec<Column> = needed.into_iter().collect();
    columns.sort_by_key(|c| c.position());
    Ok(ColumnSelection::Pruned(columns))
}
