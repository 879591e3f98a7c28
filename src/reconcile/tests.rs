use super::*;
use crate::model::{JudgedDocument, RetrievedDocument};

fn judgments(aspects: usize, rows: &[(&str, &[i64])]) -> QueryJudgments {
    QueryJudgments::new(
        "q1",
        aspects,
        rows.iter()
            .map(|(id, values)| JudgedDocument::new(*id, values))
            .collect(),
    )
}

fn results(rows: &[(&str, f64)]) -> QueryResults {
    QueryResults::new(
        "q1",
        rows.iter()
            .map(|(id, similarity)| RetrievedDocument::new(*id, *similarity))
            .collect(),
    )
}

fn scenario() -> (QueryJudgments, QueryResults) {
    (
        judgments(2, &[("A", &[2, 1]), ("B", &[0, 0]), ("C", &[-1, 3])]),
        results(&[("A", 0.9), ("B", 0.5), ("C", 0.7)]),
    )
}

fn ids(reconciliation: &Reconciliation) -> Vec<&str> {
    reconciliation
        .entries
        .iter()
        .map(|entry| entry.document_id.as_str())
        .collect()
}

#[test]
fn scenario_orders_by_similarity_and_maps_sentinels_to_zero() {
    let (judgments, results) = scenario();
    let reconciliation = reconcile(&judgments, &results, 3).expect("scenario should reconcile");

    assert_eq!(ids(&reconciliation), vec!["A", "C", "B"]);
    assert_eq!(reconciliation.entries[0].scores(), vec![2, 1]);
    assert_eq!(reconciliation.entries[1].scores(), vec![0, 3]);
    assert_eq!(reconciliation.entries[1].levels, vec![None, Some(3)]);
    assert_eq!(reconciliation.entries[2].scores(), vec![0, 0]);
    assert_eq!(reconciliation.stats.num_unjudged_in_pool, 1);
    assert_eq!(reconciliation.stats.num_nonpool, 0);
    assert_eq!(reconciliation.stats.max_levels, vec![2, 3]);
}

#[test]
fn scenario_ideal_sums_with_zeroed_sentinels_tie_on_ascending_id() {
    let (judgments, results) = scenario();
    let reconciliation = reconcile_with(&judgments, &results, 3, IdealSentinels::Zeroed)
        .expect("scenario should reconcile");

    let ideal = reconciliation
        .ideal
        .iter()
        .map(|entry| (entry.document_id.as_str(), entry.aspect_sum))
        .collect::<Vec<_>>();
    assert_eq!(ideal, vec![("A", 3), ("C", 3), ("B", 0)]);

    let attached = reconciliation
        .entries
        .iter()
        .map(|entry| entry.ideal_sum)
        .collect::<Vec<_>>();
    assert_eq!(attached, vec![3, 3, 0]);
}

#[test]
fn raw_ideal_sums_keep_the_sentinel_value() {
    let (judgments, results) = scenario();
    let reconciliation = reconcile(&judgments, &results, 3).expect("scenario should reconcile");

    let ideal = reconciliation
        .ideal
        .iter()
        .map(|entry| (entry.document_id.as_str(), entry.aspect_sum))
        .collect::<Vec<_>>();
    assert_eq!(ideal, vec![("A", 3), ("C", 2), ("B", 0)]);
}

#[test]
fn ranks_are_consecutive_and_ties_break_on_descending_id() {
    let judgments = judgments(2, &[("d1", &[1, 1])]);
    let results = results(&[("d1", 0.5), ("d3", 0.5), ("d2", 0.9), ("d4", 0.1)]);
    let reconciliation = reconcile(&judgments, &results, 10).expect("should reconcile");

    assert_eq!(ids(&reconciliation), vec!["d2", "d3", "d1", "d4"]);
    assert_eq!(reconciliation.entries[0].rank, 1);
    for pair in reconciliation.entries.windows(2) {
        assert_eq!(pair[1].rank, pair[0].rank + 1);
    }
}

#[test]
fn truncates_after_ranking() {
    let judgments = judgments(2, &[("a", &[1, 1]), ("b", &[1, 0])]);
    let results = results(&[("a", 0.1), ("b", 0.2), ("c", 0.3)]);
    let reconciliation = reconcile(&judgments, &results, 2).expect("should reconcile");

    assert_eq!(ids(&reconciliation), vec!["c", "b"]);
    assert_eq!(reconciliation.stats.num_ret, 2);
}

#[test]
fn nonpooled_documents_score_zero_on_every_aspect() {
    let judgments = judgments(3, &[("b", &[2, 2, 2])]);
    let results = results(&[("a", 0.9), ("b", 0.8), ("z", 0.1)]);
    let reconciliation = reconcile(&judgments, &results, 10).expect("should reconcile");

    let first = &reconciliation.entries[0];
    assert_eq!(first.document_id, "a");
    assert!(!first.in_pool);
    assert_eq!(first.scores(), vec![0, 0, 0]);
    assert!(reconciliation.entries[1].in_pool);
    assert_eq!(reconciliation.entries[1].scores(), vec![2, 2, 2]);
    assert_eq!(reconciliation.stats.num_nonpool, 2);
}

#[test]
fn ideal_sum_is_positional_and_zero_past_the_judged_set() {
    let judgments = judgments(2, &[("x", &[0, 1]), ("y", &[2, 2])]);
    let results = results(&[("x", 0.9), ("p", 0.8), ("q", 0.7)]);
    let reconciliation = reconcile(&judgments, &results, 10).expect("should reconcile");

    let attached = reconciliation
        .entries
        .iter()
        .map(|entry| entry.ideal_sum)
        .collect::<Vec<_>>();
    assert_eq!(attached, vec![4, 1, 0]);
}

#[test]
fn duplicate_results_are_rejected() {
    let judgments = judgments(2, &[("a", &[1, 1])]);
    let results = results(&[("a", 0.9), ("b", 0.5), ("a", 0.1)]);
    let error = reconcile(&judgments, &results, 10).expect_err("duplicates must fail");

    match error {
        EvalError::DuplicateDocument {
            document_id,
            collection,
            ..
        } => {
            assert_eq!(document_id, "a");
            assert_eq!(collection, Collection::Results);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_judgments_are_rejected() {
    let judgments = judgments(2, &[("a", &[1, 1]), ("b", &[0, 0]), ("a", &[2, 0])]);
    let results = results(&[("a", 0.9)]);
    let error = reconcile(&judgments, &results, 10).expect_err("duplicates must fail");

    assert!(
        matches!(
            error,
            EvalError::DuplicateDocument {
                collection: Collection::Judgments,
                ..
            }
        ),
        "unexpected error: {error}"
    );
}

#[test]
fn duplicates_beyond_the_cutoff_are_ignored() {
    let judgments = judgments(2, &[("a", &[1, 1])]);
    let results = results(&[("a", 0.9), ("b", 0.2), ("b", 0.1)]);
    let reconciliation = reconcile(&judgments, &results, 1).expect("cutoff drops duplicates");
    assert_eq!(ids(&reconciliation), vec!["a"]);
}

#[test]
fn wrong_format_tags_are_rejected() {
    let mut judgments = judgments(2, &[("a", &[1, 1])]);
    judgments.format = "qrels_jg".to_string();
    let results = results(&[("a", 0.9)]);
    let error = reconcile(&judgments, &results, 10).expect_err("format must be checked");
    assert!(matches!(error, EvalError::FormatMismatch { .. }));

    let judgments = self::judgments(2, &[("a", &[1, 1, 1])]);
    let error = reconcile(&judgments, &results, 10).expect_err("aspect count must be checked");
    assert!(error.to_string().contains("aspects"), "unexpected error: {error}");
}

#[test]
fn reconciling_twice_is_deterministic() {
    let judgments = judgments(3, &[("a", &[1, 0, 2]), ("c", &[0, 1, -1]), ("d", &[2, 2, 2])]);
    let results = results(&[("d", 0.3), ("a", 0.3), ("b", 0.8), ("c", 0.5)]);

    let mut reconciler = Reconciler::default();
    let first = reconciler
        .reconcile(&judgments, &results, 10)
        .expect("first pass")
        .clone();

    let other = self::results(&[("zz", 1.0)]);
    reconciler
        .reconcile(&judgments, &other, 10)
        .expect("other query");

    let second = reconciler
        .reconcile(&judgments, &results, 10)
        .expect("second pass")
        .clone();
    assert_eq!(first, second);
    assert_eq!(first, reconcile(&judgments, &results, 10).expect("fresh pass"));
}

#[test]
fn failed_reconcile_invalidates_the_cache() {
    let judgments = judgments(2, &[("a", &[1, 1])]);
    let results = results(&[("a", 0.9)]);
    let mut reconciler = Reconciler::default();
    reconciler
        .reconcile(&judgments, &results, 10)
        .expect("first pass");
    assert!(reconciler.latest().is_some());

    let duplicated = self::results(&[("b", 0.9), ("b", 0.3)]);
    assert!(reconciler.reconcile(&judgments, &duplicated, 10).is_err());
    assert!(reconciler.latest().is_none());
}

#[test]
fn same_query_id_with_changed_judgments_is_rebuilt() {
    let results = results(&[("a", 0.9), ("b", 0.5)]);
    let before = judgments(2, &[("a", &[2, 2]), ("b", &[0, 0])]);
    let after = judgments(2, &[("a", &[0, 0]), ("b", &[2, 2])]);

    let mut reconciler = Reconciler::default();
    reconciler
        .reconcile(&before, &results, 10)
        .expect("first judgments");
    let rebuilt = reconciler
        .reconcile(&after, &results, 10)
        .expect("second judgments")
        .clone();

    assert_eq!(rebuilt.entries[0].scores(), vec![0, 0]);
    assert_eq!(rebuilt.entries[1].scores(), vec![2, 2]);
    assert_eq!(rebuilt, reconcile(&after, &results, 10).expect("fresh pass"));
}

#[test]
fn same_query_id_with_changed_similarities_is_rebuilt() {
    let judgments = judgments(2, &[("a", &[1, 1]), ("b", &[2, 2])]);
    let first = results(&[("a", 0.9), ("b", 0.5)]);
    let second = results(&[("a", 0.5), ("b", 0.9)]);

    let mut reconciler = Reconciler::default();
    reconciler
        .reconcile(&judgments, &first, 10)
        .expect("first results");
    let rebuilt = reconciler
        .reconcile(&judgments, &second, 10)
        .expect("second results");
    assert_eq!(ids(rebuilt), vec!["b", "a"]);
}

#[test]
fn mismatched_query_ids_are_rejected() {
    let judgments = judgments(2, &[("a", &[1, 1])]);
    let mut results = results(&[("a", 0.9)]);
    results.query_id = "q2".to_string();

    let error = reconcile(&judgments, &results, 10).expect_err("query ids must agree");
    match error {
        EvalError::FormatMismatch {
            collection,
            expected,
            found,
        } => {
            assert_eq!(collection, Collection::Judgments);
            assert_eq!(expected, "query q2");
            assert_eq!(found, "query q1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn overflowing_aspect_sums_are_rejected() {
    let judgments = judgments(2, &[("a", &[i64::MAX, 1])]);
    let results = results(&[("a", 0.9)]);

    let error = reconcile(&judgments, &results, 10).expect_err("sum must not overflow");
    assert!(matches!(error, EvalError::FormatMismatch { .. }));
    assert!(error.to_string().contains("overflowing"), "unexpected error: {error}");

    let negative = self::judgments(2, &[("a", &[i64::MIN, -1])]);
    assert!(reconcile(&negative, &results, 10).is_err());
    let zeroed = reconcile_with(&negative, &results, 10, IdealSentinels::Zeroed)
        .expect("zeroed sentinels cannot overflow");
    assert_eq!(zeroed.ideal[0].aspect_sum, 0);
}

#[test]
fn empty_inputs_reconcile_to_empty_tables() {
    let judgments = judgments(2, &[]);
    let results = results(&[]);
    let reconciliation = reconcile(&judgments, &results, 10).expect("empty input is valid");
    assert!(reconciliation.is_empty());
    assert!(reconciliation.ideal.is_empty());
}
