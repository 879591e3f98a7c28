//! Convex aggregate measure (CAM) over per-aspect nDCG.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Measure, discount, measure_name, uniform_weight};
use crate::error::EvalError;
use crate::model::{DEFAULT_MAX_DOCS_PER_QUERY, QueryJudgments, QueryResults};
use crate::reconcile::{Reconciliation, reconcile};

/// Explicit gain for one judged level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainOverride {
    pub level: i64,
    pub gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GainLevel {
    gain: f64,
    count: usize,
}

/// Gain per level of one aspect with the number of judged documents at
/// each level. Overridden levels keep their gain; every other observed
/// level gains its own value.
#[derive(Debug, Clone, PartialEq)]
pub struct GainTable {
    levels: BTreeMap<i64, GainLevel>,
}

impl GainTable {
    pub fn build(reconciliation: &Reconciliation, aspect: usize, overrides: &[GainOverride]) -> Self {
        let mut levels = overrides
            .iter()
            .map(|value| {
                (
                    value.level,
                    GainLevel {
                        gain: value.gain,
                        count: 0,
                    },
                )
            })
            .collect::<BTreeMap<i64, GainLevel>>();

        for level in reconciliation.judged_levels(aspect) {
            levels
                .entry(level)
                .or_insert(GainLevel {
                    gain: level as f64,
                    count: 0,
                })
                .count += 1;
        }

        Self { levels }
    }

    /// Levels present in the table, ascending.
    pub fn levels(&self) -> impl Iterator<Item = i64> + '_ {
        self.levels.keys().copied()
    }

    /// Gain of a judged level; unknown levels and unjudged documents gain 0.
    pub fn gain(&self, level: Option<i64>) -> f64 {
        level
            .and_then(|level| self.levels.get(&level))
            .map_or(0.0, |entry| entry.gain)
    }

    /// DCG of the best possible ordering of every judged document.
    pub fn ideal_dcg(&self) -> f64 {
        let mut ranked = self
            .levels
            .values()
            .filter(|level| level.gain > 0.0 && level.count > 0)
            .collect::<Vec<&GainLevel>>();
        ranked.sort_by(|left, right| right.gain.total_cmp(&left.gain));

        let mut position = 0usize;
        let mut ideal = 0.0;
        for level in ranked {
            for _ in 0..level.count {
                ideal += level.gain / discount(position);
                position += 1;
            }
        }
        ideal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DcgBreakdown {
    pub dcg: f64,
    pub ideal_dcg: f64,
}

pub fn aspect_dcg(
    reconciliation: &Reconciliation,
    aspect: usize,
    overrides: &[GainOverride],
) -> DcgBreakdown {
    let gains = GainTable::build(reconciliation, aspect, overrides);
    let dcg = reconciliation
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let level = entry.levels.get(aspect).copied().flatten();
            gains.gain(level) / discount(index)
        })
        .sum::<f64>();

    DcgBreakdown {
        dcg,
        ideal_dcg: gains.ideal_dcg(),
    }
}

#[derive(Debug, Clone)]
pub struct Cam {
    name: String,
    aspects: usize,
    overrides: Vec<GainOverride>,
}

impl Cam {
    pub fn new(aspects: usize, overrides: Vec<GainOverride>) -> Self {
        Self {
            name: measure_name("cam", aspects),
            aspects,
            overrides,
        }
    }
}

impl Measure for Cam {
    fn name(&self) -> &str {
        &self.name
    }

    fn aspects(&self) -> usize {
        self.aspects
    }

    fn score(&self, reconciliation: &Reconciliation) -> Result<f64, EvalError> {
        reconciliation.ensure_aspects(self.aspects)?;
        let weight = uniform_weight(self.aspects);

        let mut total = 0.0;
        for aspect in 0..self.aspects {
            let breakdown = aspect_dcg(reconciliation, aspect, &self.overrides);
            if breakdown.ideal_dcg <= 0.0 {
                return Err(EvalError::ZeroIdealGain {
                    query_id: reconciliation.query_id.clone(),
                    aspect,
                });
            }
            total += weight * (breakdown.dcg / breakdown.ideal_dcg);
        }
        Ok(total)
    }
}

pub fn score_cam(
    judgments: &QueryJudgments,
    results: &QueryResults,
    gain_overrides: &[GainOverride],
) -> Result<f64, EvalError> {
    let reconciliation = reconcile(judgments, results, DEFAULT_MAX_DOCS_PER_QUERY)?;
    Cam::new(reconciliation.aspects, gain_overrides.to_vec()).score(&reconciliation)
}
