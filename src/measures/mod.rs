//! Multi-aspect effectiveness measures computed over a [`Reconciliation`].
//!
//! Every measure combines the aspects with uniform weights `1/k`, where `k`
//! is the aspect count of the measure, and discounts rank `i` (0-based) by
//! `log2(i + 2)`.

use std::fmt;

use crate::error::EvalError;
use crate::reconcile::Reconciliation;

mod cam;
mod cam_map;
mod nlre;
mod nwcs;
mod registry;

pub use cam::{Cam, DcgBreakdown, GainOverride, GainTable, aspect_dcg, score_cam};
pub use cam_map::{CamMap, average_precision, score_cam_map};
pub use nlre::{Nlre, local_rank_error, normalization_constant, rank_positions, score_nlre};
pub use nwcs::{Nwcs, WeightedCumulative, score_nwcs, weighted_cumulative};
pub use registry::{
    MeasureDefinition, MeasureFamily, MeasureRegistry, MeasureRequest, parse_gain_overrides,
    parse_measure_request,
};

/// A per-query effectiveness measure.
pub trait Measure: fmt::Debug {
    fn name(&self) -> &str;

    /// Number of aspects the measure combines.
    fn aspects(&self) -> usize;

    fn score(&self, reconciliation: &Reconciliation) -> Result<f64, EvalError>;
}

pub(crate) fn uniform_weight(aspects: usize) -> f64 {
    1.0 / aspects.max(1) as f64
}

/// Rank discount for a 0-based position.
pub(crate) fn discount(index: usize) -> f64 {
    ((index + 2) as f64).log2()
}

/// `cam` for two aspects, `cam_three` for three.
pub(crate) fn measure_name(base: &str, aspects: usize) -> String {
    match aspects {
        2 => base.to_string(),
        3 => format!("{base}_three"),
        other => format!("{base}_{other}"),
    }
}
