use serde::Serialize;

use super::{Measure, discount, measure_name, uniform_weight};
use crate::error::EvalError;
use crate::model::{DEFAULT_MAX_DOCS_PER_QUERY, QueryJudgments, QueryResults};
use crate::reconcile::{Reconciliation, reconcile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedCumulative {
    pub wcs: f64,
    pub ideal_wcs: f64,
}

impl WeightedCumulative {
    /// Normalized score; a zero ideal yields 0 rather than an error.
    pub fn normalized(self) -> f64 {
        if self.ideal_wcs > 0.0 {
            self.wcs / self.ideal_wcs
        } else {
            0.0
        }
    }
}

pub fn weighted_cumulative(reconciliation: &Reconciliation) -> WeightedCumulative {
    let aspects = reconciliation.aspects;
    let weight = uniform_weight(aspects);

    let mut wcs = 0.0;
    let mut ideal_wcs = 0.0;
    for (index, entry) in reconciliation.entries.iter().enumerate() {
        let weighted = (0..aspects)
            .map(|aspect| weight * entry.score(aspect) as f64)
            .sum::<f64>();
        wcs += weighted / discount(index);
        ideal_wcs += weight * entry.ideal_sum as f64 / discount(index);
    }

    WeightedCumulative { wcs, ideal_wcs }
}

#[derive(Debug, Clone)]
pub struct Nwcs {
    name: String,
    aspects: usize,
}

impl Nwcs {
    pub fn new(aspects: usize) -> Self {
        Self {
            name: measure_name("nwcs", aspects),
            aspects,
        }
    }
}

impl Measure for Nwcs {
    fn name(&self) -> &str {
        &self.name
    }

    fn aspects(&self) -> usize {
        self.aspects
    }

    fn score(&self, reconciliation: &Reconciliation) -> Result<f64, EvalError> {
        reconciliation.ensure_aspects(self.aspects)?;
        Ok(weighted_cumulative(reconciliation).normalized())
    }
}

pub fn score_nwcs(judgments: &QueryJudgments, results: &QueryResults) -> Result<f64, EvalError> {
    let reconciliation = reconcile(judgments, results, DEFAULT_MAX_DOCS_PER_QUERY)?;
    Nwcs::new(reconciliation.aspects).score(&reconciliation)
}
