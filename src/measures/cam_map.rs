//! CAM over per-aspect average precision.

use super::{Measure, measure_name, uniform_weight};
use crate::error::EvalError;
use crate::model::{DEFAULT_MAX_DOCS_PER_QUERY, QueryJudgments, QueryResults};
use crate::reconcile::{Reconciliation, reconcile};

/// Average precision of one aspect. A document is relevant when its judged
/// level is at least `relevance_level`; 0 when nothing judged is relevant.
pub fn average_precision(reconciliation: &Reconciliation, aspect: usize, relevance_level: i64) -> f64 {
    let num_rel = reconciliation
        .judged_levels(aspect)
        .filter(|level| *level >= relevance_level)
        .count();
    if num_rel == 0 {
        return 0.0;
    }

    let mut rel_so_far = 0usize;
    let mut sum = 0.0;
    for (index, entry) in reconciliation.entries.iter().enumerate() {
        let relevant = entry
            .levels
            .get(aspect)
            .copied()
            .flatten()
            .is_some_and(|level| level >= relevance_level);
        if relevant {
            rel_so_far += 1;
            sum += rel_so_far as f64 / (index + 1) as f64;
        }
    }
    sum / num_rel as f64
}

#[derive(Debug, Clone)]
pub struct CamMap {
    name: String,
    aspects: usize,
    relevance_level: i64,
}

impl CamMap {
    pub fn new(aspects: usize, relevance_level: i64) -> Self {
        Self {
            name: measure_name("cam_map", aspects),
            aspects,
            relevance_level,
        }
    }
}

impl Measure for CamMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn aspects(&self) -> usize {
        self.aspects
    }

    fn score(&self, reconciliation: &Reconciliation) -> Result<f64, EvalError> {
        reconciliation.ensure_aspects(self.aspects)?;
        let weight = uniform_weight(self.aspects);
        Ok((0..self.aspects)
            .map(|aspect| weight * average_precision(reconciliation, aspect, self.relevance_level))
            .sum())
    }
}

pub fn score_cam_map(
    judgments: &QueryJudgments,
    results: &QueryResults,
    relevance_level: i64,
) -> Result<f64, EvalError> {
    let reconciliation = reconcile(judgments, results, DEFAULT_MAX_DOCS_PER_QUERY)?;
    CamMap::new(reconciliation.aspects, relevance_level).score(&reconciliation)
}
