//! Normalized local rank error (NLRE).
//!
//! Adjacent documents in the similarity ranking are penalized by how far
//! each aspect's ordering disagrees with theirs, and the total is normalized
//! by a closed-form worst case for a ranking of length `n`.

use super::{Measure, discount, measure_name, uniform_weight};
use crate::error::EvalError;
use crate::model::{DEFAULT_MAX_DOCS_PER_QUERY, QueryJudgments, QueryResults};
use crate::reconcile::{Reconciliation, reconcile, sort_desc_by};

/// 1-based position of each retrieved document (indexed in similarity
/// order) when the ranking is re-sorted by one aspect's score, ties kept in
/// similarity order.
pub fn rank_positions(reconciliation: &Reconciliation, aspect: usize) -> Vec<usize> {
    let entries = &reconciliation.entries;
    let mut order = (0..entries.len()).collect::<Vec<usize>>();
    sort_desc_by(
        &mut order,
        |index| entries[*index].score(aspect) as f64,
        |left, right| entries[*left].rank.cmp(&entries[*right].rank),
    );

    let mut positions = vec![0usize; entries.len()];
    for (position, index) in order.iter().enumerate() {
        positions[*index] = position + 1;
    }
    positions
}

pub fn local_rank_error(reconciliation: &Reconciliation, aspects: usize) -> f64 {
    let n = reconciliation.len();
    if n < 2 {
        return 0.0;
    }

    let weight = uniform_weight(aspects);
    let baseline = weight.powi(aspects as i32);
    let positions = (0..aspects)
        .map(|aspect| rank_positions(reconciliation, aspect))
        .collect::<Vec<Vec<usize>>>();

    (0..n - 1)
        .map(|index| {
            let product = positions
                .iter()
                .map(|aspect_positions| {
                    let error = aspect_positions[index].saturating_sub(aspect_positions[index + 1]);
                    weight + error as f64
                })
                .product::<f64>();
            (product - baseline) / discount(index)
        })
        .sum()
}

pub fn normalization_constant(n: usize, aspects: usize) -> f64 {
    match n {
        0..=2 => 1.0,
        3 => 2.0,
        _ => {
            let weight_sum = uniform_weight(aspects) * aspects as f64;
            (0..n / 2)
                .map(|j| {
                    let span = (n - 2 * j - 1) as f64;
                    (span.powi(aspects as i32) + weight_sum * span) / (1.0 + ((1 + j) as f64).log2())
                })
                .sum()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Nlre {
    name: String,
    aspects: usize,
}

impl Nlre {
    pub fn new(aspects: usize) -> Self {
        Self {
            name: measure_name("nlre", aspects),
            aspects,
        }
    }
}

impl Measure for Nlre {
    fn name(&self) -> &str {
        &self.name
    }

    fn aspects(&self) -> usize {
        self.aspects
    }

    fn score(&self, reconciliation: &Reconciliation) -> Result<f64, EvalError> {
        reconciliation.ensure_aspects(self.aspects)?;
        let error = local_rank_error(reconciliation, self.aspects);
        let constant = normalization_constant(reconciliation.len(), self.aspects);
        Ok(1.0 - error / constant)
    }
}

pub fn score_nlre(
    judgments: &QueryJudgments,
    results: &QueryResults,
    aspect_count: usize,
) -> Result<f64, EvalError> {
    if !matches!(aspect_count, 2 | 3) {
        return Err(EvalError::InvalidParameter {
            measure: "nlre".to_string(),
            reason: format!("aspect count must be 2 or 3, got {aspect_count}"),
        });
    }
    let reconciliation = reconcile(judgments, results, DEFAULT_MAX_DOCS_PER_QUERY)?;
    Nlre::new(aspect_count).score(&reconciliation)
}
