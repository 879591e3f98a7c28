//! Reconciliation of a similarity-ranked result list with multi-aspect
//! judgments.
//!
//! The [`Reconciler`] merges both collections into a table of per-document
//! aspect scores in similarity order, and builds the ideal ranking of every
//! judged document by aspect sum. It owns its scratch buffers and keeps the
//! last reconciliation so that several measures evaluated on the same query
//! in a row share one merge.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::error::{Collection, EvalError, try_grow};
use crate::model::{
    IdealSentinels, JUDGMENTS_FORMAT, JudgedDocument, MAX_ASPECTS, QueryJudgments, QueryResults,
    RESULTS_FORMAT,
};

/// One retrieved document with its judged aspect levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledEntry {
    pub document_id: String,
    pub similarity: f64,
    /// 1-based position in similarity order.
    pub rank: usize,
    /// Judged level per aspect; `None` outside the pool or for an unjudged sentinel.
    pub levels: Vec<Option<i64>>,
    pub in_pool: bool,
    /// Aspect sum of the ideal document at this position, 0 past the judged set.
    pub ideal_sum: i64,
}

impl ReconciledEntry {
    pub fn score(&self, aspect: usize) -> i64 {
        self.levels.get(aspect).copied().flatten().unwrap_or(0)
    }

    pub fn scores(&self) -> Vec<i64> {
        (0..self.levels.len()).map(|aspect| self.score(aspect)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdealEntry {
    pub document_id: String,
    pub aspects: Vec<i64>,
    pub aspect_sum: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub num_ret: usize,
    pub num_judged: usize,
    pub num_nonpool: usize,
    pub num_unjudged_in_pool: usize,
    pub max_levels: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub query_id: String,
    pub aspects: usize,
    pub entries: Vec<ReconciledEntry>,
    pub ideal: Vec<IdealEntry>,
    pub stats: ReconcileStats,
}

impl Reconciliation {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ensure_aspects(&self, expected: usize) -> Result<(), EvalError> {
        if self.aspects == expected {
            Ok(())
        } else {
            Err(EvalError::aspect_mismatch(expected, self.aspects))
        }
    }

    /// Non-negative judged levels of one aspect over the whole judgment set.
    pub fn judged_levels(&self, aspect: usize) -> impl Iterator<Item = i64> + '_ {
        self.ideal
            .iter()
            .filter_map(move |entry| entry.aspects.get(aspect).copied())
            .filter(|level| *level >= 0)
    }
}

/// Inputs of the last successful reconciliation. Compared by content so a
/// different query under a reused id never hits.
#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    max_docs: usize,
    judgments: QueryJudgments,
    results: QueryResults,
}

impl CacheKey {
    fn matches(&self, judgments: &QueryJudgments, results: &QueryResults, max_docs: usize) -> bool {
        self.max_docs == max_docs && self.judgments == *judgments && self.results == *results
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    sentinels: IdealSentinels,
    ranked: Vec<usize>,
    by_id: Vec<(usize, usize)>,
    judged: Vec<usize>,
    cache_key: Option<CacheKey>,
    latest: Reconciliation,
}

impl Reconciler {
    pub fn new(sentinels: IdealSentinels) -> Self {
        Self {
            sentinels,
            ..Self::default()
        }
    }

    pub fn sentinels(&self) -> IdealSentinels {
        self.sentinels
    }

    /// Reconcile one query, reusing the previous table when called again
    /// with identical inputs.
    pub fn reconcile(
        &mut self,
        judgments: &QueryJudgments,
        results: &QueryResults,
        max_docs: usize,
    ) -> Result<&Reconciliation, EvalError> {
        if self
            .cache_key
            .as_ref()
            .is_some_and(|key| key.matches(judgments, results, max_docs))
        {
            debug!(query_id = %self.latest.query_id, "reusing cached reconciliation");
            return Ok(&self.latest);
        }

        self.cache_key = None;
        self.rebuild(judgments, results, max_docs)?;
        self.cache_key = Some(CacheKey {
            max_docs,
            judgments: judgments.clone(),
            results: results.clone(),
        });

        debug!(
            query_id = %self.latest.query_id,
            retrieved = self.latest.stats.num_ret,
            judged = self.latest.stats.num_judged,
            nonpool = self.latest.stats.num_nonpool,
            "reconciled query"
        );
        Ok(&self.latest)
    }

    pub fn latest(&self) -> Option<&Reconciliation> {
        self.cache_key.as_ref().map(|_| &self.latest)
    }

    pub fn into_latest(self) -> Option<Reconciliation> {
        self.cache_key.map(|_| self.latest)
    }

    fn rebuild(
        &mut self,
        judgments: &QueryJudgments,
        results: &QueryResults,
        max_docs: usize,
    ) -> Result<(), EvalError> {
        validate_formats(judgments, results)?;

        let query_id = results.query_id.as_str();
        let aspects = judgments.aspects;
        let retrieved = &results.documents;
        let judged_docs = &judgments.documents;

        self.ranked.clear();
        try_grow(&mut self.ranked, retrieved.len(), "ranked results")?;
        self.ranked.extend(0..retrieved.len());
        sort_desc_by(
            &mut self.ranked,
            |index| retrieved[*index].similarity,
            |left, right| {
                retrieved[*right]
                    .document_id
                    .cmp(&retrieved[*left].document_id)
            },
        );
        self.ranked.truncate(max_docs);

        self.by_id.clear();
        try_grow(&mut self.by_id, self.ranked.len(), "results by id")?;
        self.by_id.extend(
            self.ranked
                .iter()
                .enumerate()
                .map(|(position, index)| (*index, position + 1)),
        );
        self.by_id
            .sort_by(|left, right| retrieved[left.0].document_id.cmp(&retrieved[right.0].document_id));
        if let Some(pair) = self
            .by_id
            .windows(2)
            .find(|pair| retrieved[pair[0].0].document_id == retrieved[pair[1].0].document_id)
        {
            return Err(EvalError::DuplicateDocument {
                query_id: query_id.to_string(),
                document_id: retrieved[pair[1].0].document_id.clone(),
                collection: Collection::Results,
            });
        }

        self.judged.clear();
        try_grow(&mut self.judged, judged_docs.len(), "judged documents")?;
        self.judged.extend(0..judged_docs.len());
        self.judged
            .sort_by(|left, right| judged_docs[*left].document_id.cmp(&judged_docs[*right].document_id));
        if let Some(pair) = self
            .judged
            .windows(2)
            .find(|pair| judged_docs[pair[0]].document_id == judged_docs[pair[1]].document_id)
        {
            return Err(EvalError::DuplicateDocument {
                query_id: query_id.to_string(),
                document_id: judged_docs[pair[1]].document_id.clone(),
                collection: Collection::Judgments,
            });
        }

        let mut stats = ReconcileStats {
            num_ret: self.ranked.len(),
            num_judged: judged_docs.len(),
            max_levels: vec![0; aspects],
            ..ReconcileStats::default()
        };
        for document in judged_docs {
            for (max_level, level) in stats.max_levels.iter_mut().zip(&document.aspects) {
                *max_level = (*max_level).max(*level);
            }
        }

        let latest = &mut self.latest;
        latest.query_id.clear();
        latest.query_id.push_str(query_id);
        latest.aspects = aspects;

        latest.entries.clear();
        try_grow(&mut latest.entries, self.by_id.len(), "reconciled entries")?;
        let mut cursor = 0usize;
        for (index, rank) in &self.by_id {
            let document = &retrieved[*index];
            while cursor < self.judged.len()
                && judged_docs[self.judged[cursor]].document_id < document.document_id
            {
                cursor += 1;
            }

            let matched = self
                .judged
                .get(cursor)
                .map(|judged_index| &judged_docs[*judged_index])
                .filter(|judged| judged.document_id == document.document_id);

            let (levels, in_pool) = match matched {
                Some(judged) => {
                    let levels = judged
                        .aspects
                        .iter()
                        .map(|level| (*level >= 0).then_some(*level))
                        .collect::<Vec<Option<i64>>>();
                    if levels.iter().any(Option::is_none) {
                        stats.num_unjudged_in_pool += 1;
                    }
                    (levels, true)
                }
                None => {
                    stats.num_nonpool += 1;
                    (vec![None; aspects], false)
                }
            };

            latest.entries.push(ReconciledEntry {
                document_id: document.document_id.clone(),
                similarity: document.similarity,
                rank: *rank,
                levels,
                in_pool,
                ideal_sum: 0,
            });
        }

        latest.ideal.clear();
        try_grow(&mut latest.ideal, judged_docs.len(), "ideal ranking")?;
        for document in judged_docs {
            latest.ideal.push(IdealEntry {
                document_id: document.document_id.clone(),
                aspects: document.aspects.clone(),
                aspect_sum: aspect_sum(query_id, document, self.sentinels)?,
            });
        }
        latest.ideal.sort_by(|left, right| {
            right
                .aspect_sum
                .cmp(&left.aspect_sum)
                .then_with(|| left.document_id.cmp(&right.document_id))
        });

        latest.entries.sort_by_key(|entry| entry.rank);
        for (entry, ideal) in latest
            .entries
            .iter_mut()
            .zip(latest.ideal.iter().map(Some).chain(std::iter::repeat(None)))
        {
            entry.ideal_sum = ideal.map_or(0, |ideal| ideal.aspect_sum);
        }

        latest.stats = stats;
        Ok(())
    }
}

/// Reconcile one query with fresh buffers.
pub fn reconcile(
    judgments: &QueryJudgments,
    results: &QueryResults,
    max_docs: usize,
) -> Result<Reconciliation, EvalError> {
    reconcile_with(judgments, results, max_docs, IdealSentinels::default())
}

pub fn reconcile_with(
    judgments: &QueryJudgments,
    results: &QueryResults,
    max_docs: usize,
    sentinels: IdealSentinels,
) -> Result<Reconciliation, EvalError> {
    let mut reconciler = Reconciler::new(sentinels);
    reconciler.reconcile(judgments, results, max_docs)?;
    Ok(reconciler.into_latest().unwrap_or_default())
}

/// Sort by a numeric key descending, resolving equal keys with `tie_break`.
pub(crate) fn sort_desc_by<T, K, F>(items: &mut [T], key: K, tie_break: F)
where
    K: Fn(&T) -> f64,
    F: Fn(&T, &T) -> Ordering,
{
    items.sort_by(|left, right| {
        key(right)
            .total_cmp(&key(left))
            .then_with(|| tie_break(left, right))
    });
}

fn aspect_sum(
    query_id: &str,
    document: &JudgedDocument,
    sentinels: IdealSentinels,
) -> Result<i64, EvalError> {
    document
        .aspects
        .iter()
        .try_fold(0i64, |sum, level| sum.checked_add(sentinels.contribution(*level)))
        .ok_or_else(|| EvalError::FormatMismatch {
            collection: Collection::Judgments,
            expected: "aspect levels with a representable sum".to_string(),
            found: format!(
                "overflowing levels {:?} for document {} of query {query_id}",
                document.aspects, document.document_id
            ),
        })
}

fn validate_formats(judgments: &QueryJudgments, results: &QueryResults) -> Result<(), EvalError> {
    if judgments.query_id != results.query_id {
        return Err(EvalError::FormatMismatch {
            collection: Collection::Judgments,
            expected: format!("query {}", results.query_id),
            found: format!("query {}", judgments.query_id),
        });
    }
    if judgments.format != JUDGMENTS_FORMAT {
        return Err(EvalError::FormatMismatch {
            collection: Collection::Judgments,
            expected: JUDGMENTS_FORMAT.to_string(),
            found: judgments.format.clone(),
        });
    }
    if results.format != RESULTS_FORMAT {
        return Err(EvalError::FormatMismatch {
            collection: Collection::Results,
            expected: RESULTS_FORMAT.to_string(),
            found: results.format.clone(),
        });
    }
    if !(1..=MAX_ASPECTS).contains(&judgments.aspects) {
        return Err(EvalError::FormatMismatch {
            collection: Collection::Judgments,
            expected: format!("1 to {MAX_ASPECTS} aspects"),
            found: format!("{} aspects", judgments.aspects),
        });
    }
    if let Some(document) = judgments
        .documents
        .iter()
        .find(|document| document.aspects.len() != judgments.aspects)
    {
        return Err(EvalError::FormatMismatch {
            collection: Collection::Judgments,
            expected: format!("{} aspects per document", judgments.aspects),
            found: format!(
                "{} aspects for document {}",
                document.aspects.len(),
                document.document_id
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
