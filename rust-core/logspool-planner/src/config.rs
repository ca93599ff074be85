// SPDX-License-Identifier: PMPL-1.0-or-later
//! Planner configuration.
//!
//! Defaults match the host's stock sequential-scan constants:
//! - seq_page_cost: 1.0
//! - cpu_tuple_cost: 0.01
//! - parse_multiplier: 10.0 (decoding a text line costs ten plain tuples)

use serde::{Deserialize, Serialize};

use crate::stats::PriorStats;

/// Which segments contribute to the byte count used for sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Size only the first listed segment. Underestimates multi-segment
    /// relations; kept because estimates stay comparable with older plans.
    #[default]
    FirstSegment,
    /// Sum the sizes of every listed segment.
    AllSegments,
}

/// Unit costs for a sequential scan of text segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    /// Cost of reading one page sequentially.
    pub seq_page_cost: f64,
    /// Cost of handling one tuple.
    pub cpu_tuple_cost: f64,
    /// How many tuples' worth of CPU one parsed line costs.
    pub parse_multiplier: f64,
}

impl CostParams {
    /// CPU cost of producing one row, before restriction clauses.
    pub fn per_line_cpu(&self) -> f64 {
        self.parse_multiplier * self.cpu_tuple_cost
    }
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            seq_page_cost: 1.0,
            cpu_tuple_cost: 0.01,
            parse_multiplier: 10.0,
        }
    }
}

/// Options for a planned relation over a segment catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationOptions {
    pub sizing: SizingMode,
    pub cost: CostParams,
    /// Statistics from an earlier analysis of the relation, if any.
    pub prior: Option<PriorStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_defaults() {
        let params = CostParams::default();
        assert!((params.seq_page_cost - 1.0).abs() < f64::EPSILON);
        assert!((params.cpu_tuple_cost - 0.01).abs() < f64::EPSILON);
        assert!((params.parse_multiplier - 10.0).abs() < f64::EPSILON);
        assert!((params.per_line_cpu() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_sizing_default_is_first_segment() {
        assert_eq!(SizingMode::default(), SizingMode::FirstSegment);
        assert_eq!(RelationOptions::default().sizing, SizingMode::FirstSegment);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: RelationOptions =
            serde_json::from_str(r#"{"sizing": "all_segments", "cost": {"seq_page_cost": 4.0}}"#)
                .unwrap();
        assert_eq!(options.sizing, SizingMode::AllSegments);
        assert!((options.cost.seq_page_cost - 4.0).abs() < f64::EPSILON);
        assert!((options.cost.cpu_tuple_cost - 0.01).abs() < f64::EPSILON);
        assert!(options.prior.is_none());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let options = RelationOptions {
            sizing: SizingMode::AllSegments,
            cost: CostParams::default(),
            prior: Some(PriorStats::new(12, 3400.0)),
        };
        let json = serde_json::to_string(&options).unwrap();
        let parsed: RelationOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, options);
    }
}
