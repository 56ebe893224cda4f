//! Planner configuration: the tuned constants the Design Notes flag as
//! better exposed as configuration than hardcoded (the capacity governor's
//! scaling factor, §4.4; the rearrangement thresholds, §4.8).

use serde::{Deserialize, Serialize};

/// Tunable knobs for one planner run. `Default` reproduces the spec's
/// documented heuristic constants exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Fraction of total container capacity placed in one `place_all` run
    /// when the item count is `<= small_regime_max` (§4.4).
    pub small_regime_factor: f64,
    /// Upper bound (inclusive) of the "small" item-count regime.
    pub small_regime_max: usize,
    /// Fraction used for the "medium" regime (`small_regime_max+1..=medium_regime_max`).
    pub medium_regime_factor: f64,
    pub medium_regime_max: usize,
    /// Minimum items left unplaced in the medium regime, enforced as a floor
    /// on the governor's cap.
    pub medium_regime_min_unplaced: usize,
    /// Floor applied to the large-regime factor `0.85 - item_count/10000`.
    pub large_regime_floor: f64,

    /// Rearrangement: priority threshold escalation step and cap (§4.8).
    pub rearrange_threshold_step: u8,
    pub rearrange_threshold_cap: u8,
    /// Utilization bounds used to decide whether rearrangement is warranted
    /// at all, and the target utilization used by the efficiency score.
    pub rearrange_underutilized_pct: f64,
    pub rearrange_overutilized_pct: f64,
    pub rearrange_optimal_pct: f64,

    /// Accessibility thresholds for `prioritize_access` (§4.3/§4.4): the
    /// preferred-zone pass uses a higher bar than the fallback pass.
    pub access_priority_threshold_preferred: u8,
    pub access_priority_threshold_fallback: u8,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            small_regime_factor: 0.3,
            small_regime_max: 20,
            medium_regime_factor: 0.6,
            medium_regime_max: 100,
            medium_regime_min_unplaced: 15,
            large_regime_floor: 0.65,
            rearrange_threshold_step: 20,
            rearrange_threshold_cap: 80,
            rearrange_underutilized_pct: 50.0,
            rearrange_overutilized_pct: 85.0,
            rearrange_optimal_pct: 75.0,
            access_priority_threshold_preferred: 75,
            access_priority_threshold_fallback: 70,
        }
    }
}
