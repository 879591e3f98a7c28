use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use aspecteval::{EvaluationBundle, EvaluationConfig, Measure, MeasureRegistry, Reconciler};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::util::{now_utc_string, read_json, sha256_file, write_json_pretty};

const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryScore {
    pub query_id: String,
    pub measure: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryFailure {
    pub query_id: String,
    pub measure: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeasureSummary {
    pub measure: String,
    pub queries_evaluated: usize,
    pub queries_failed: usize,
    pub mean: Option<f64>,
}

#[derive(Debug, Default)]
pub struct BundleEvaluation {
    pub per_query: Vec<QueryScore>,
    pub failures: Vec<QueryFailure>,
    pub summaries: Vec<MeasureSummary>,
}

#[derive(Debug, Serialize)]
struct EvaluationReport<'a> {
    report_version: u32,
    generated_at: String,
    input_path: String,
    input_sha256: String,
    config: &'a EvaluationConfig,
    query_count: usize,
    measures: &'a [MeasureSummary],
    per_query: &'a [QueryScore],
    failures: &'a [QueryFailure],
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let bundle: EvaluationBundle = read_json(&args.input)?;
    if bundle.queries.is_empty() {
        bail!("no queries in {}", args.input.display());
    }

    let config = EvaluationConfig {
        max_docs_per_query: args.max_docs_per_query,
        relevance_level: args.relevance_level,
        ideal_sentinels: args.ideal_sentinels.into(),
    };

    let registry = MeasureRegistry::standard();
    let requests = select_measure_requests(&registry, &bundle, &args.measures)?;
    let measures = requests
        .iter()
        .map(|request| {
            registry
                .resolve(request, &config)
                .with_context(|| format!("invalid measure request: {request}"))
        })
        .collect::<Result<Vec<Box<dyn Measure>>>>()?;

    info!(
        input = %args.input.display(),
        queries = bundle.queries.len(),
        measures = %requests.join(","),
        max_docs_per_query = config.max_docs_per_query,
        "starting evaluation"
    );

    let evaluation = evaluate_bundle(&bundle, &measures, &config);

    info!(
        scored = evaluation.per_query.len(),
        failed = evaluation.failures.len(),
        "evaluation completed"
    );

    let report = EvaluationReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        input_path: args.input.display().to_string(),
        input_sha256: sha256_file(&args.input)?,
        config: &config,
        query_count: bundle.queries.len(),
        measures: &evaluation.summaries,
        per_query: &evaluation.per_query,
        failures: &evaluation.failures,
    };

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote evaluation report");
    }

    if args.json {
        write_json_output(&report)
    } else {
        write_text_output(&evaluation, args.per_query)
    }
}

/// Explicit requests win; otherwise every registered measure for the
/// bundle's aspect count.
pub fn select_measure_requests(
    registry: &MeasureRegistry,
    bundle: &EvaluationBundle,
    requested: &[String],
) -> Result<Vec<String>> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }

    let Some(aspects) = bundle.aspects() else {
        bail!("queries mix aspect counts; pass --measure explicitly");
    };
    let names = registry
        .for_aspects(aspects)
        .map(|definition| definition.name.to_string())
        .collect::<Vec<String>>();
    if names.is_empty() {
        bail!("no registered measure combines {aspects} aspects");
    }
    Ok(names)
}

pub fn evaluate_bundle(
    bundle: &EvaluationBundle,
    measures: &[Box<dyn Measure>],
    config: &EvaluationConfig,
) -> BundleEvaluation {
    let mut reconciler = Reconciler::new(config.ideal_sentinels);
    let mut evaluation = BundleEvaluation::default();

    for query in &bundle.queries {
        for measure in measures {
            let outcome = reconciler
                .reconcile(&query.judgments, &query.results, config.max_docs_per_query)
                .and_then(|reconciliation| measure.score(reconciliation));

            match outcome {
                Ok(value) => evaluation.per_query.push(QueryScore {
                    query_id: query.query_id().to_string(),
                    measure: measure.name().to_string(),
                    value,
                }),
                Err(err) => {
                    warn!(
                        query_id = %query.query_id(),
                        measure = %measure.name(),
                        error = %err,
                        "measure undefined for query"
                    );
                    evaluation.failures.push(QueryFailure {
                        query_id: query.query_id().to_string(),
                        measure: measure.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    evaluation.summaries = measures
        .iter()
        .map(|measure| summarize(measure.name(), &evaluation))
        .collect();
    evaluation
}

fn summarize(measure: &str, evaluation: &BundleEvaluation) -> MeasureSummary {
    let values = evaluation
        .per_query
        .iter()
        .filter(|score| score.measure == measure)
        .map(|score| score.value)
        .collect::<Vec<f64>>();
    let queries_failed = evaluation
        .failures
        .iter()
        .filter(|failure| failure.measure == measure)
        .count();

    let mean = if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    };

    MeasureSummary {
        measure: measure.to_string(),
        queries_evaluated: values.len(),
        queries_failed,
        mean,
    }
}

fn write_json_output(report: &EvaluationReport<'_>) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize evaluation json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_output(evaluation: &BundleEvaluation, per_query: bool) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    if per_query {
        for score in &evaluation.per_query {
            writeln!(
                output,
                "{:<16}\t{}\t{:.4}",
                score.measure, score.query_id, score.value
            )?;
        }
    }

    for summary in &evaluation.summaries {
        match summary.mean {
            Some(mean) => writeln!(output, "{:<16}\tall\t{mean:.4}", summary.measure)?,
            None => writeln!(output, "{:<16}\tall\tundefined", summary.measure)?,
        }
        if summary.queries_failed > 0 {
            writeln!(
                output,
                "{:<16}\tfailed\t{}",
                summary.measure, summary.queries_failed
            )?;
        }
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{evaluate_bundle, select_measure_requests};
    use aspecteval::{EvaluationBundle, EvaluationConfig, Measure, MeasureRegistry};

    fn bundle() -> EvaluationBundle {
        let raw = serde_json::json!({
            "queries": [
                {
                    "judgments": {
                        "query_id": "301",
                        "aspects": 2,
                        "documents": [
                            {"document_id": "A", "aspects": [2, 1]},
                            {"document_id": "B", "aspects": [0, 0]},
                            {"document_id": "C", "aspects": [-1, 3]}
                        ]
                    },
                    "results": {
                        "query_id": "301",
                        "documents": [
                            {"document_id": "A", "similarity": 0.9},
                            {"document_id": "B", "similarity": 0.5},
                            {"document_id": "C", "similarity": 0.7}
                        ]
                    }
                },
                {
                    "judgments": {
                        "query_id": "302",
                        "aspects": 2,
                        "documents": [
                            {"document_id": "D", "aspects": [1, 1]}
                        ]
                    },
                    "results": {
                        "query_id": "302",
                        "documents": [
                            {"document_id": "D", "similarity": 0.4},
                            {"document_id": "D", "similarity": 0.2}
                        ]
                    }
                }
            ]
        });
        serde_json::from_value(raw).expect("fixture bundle should deserialize")
    }

    fn resolve(names: &[&str]) -> Vec<Box<dyn Measure>> {
        let registry = MeasureRegistry::standard();
        let config = EvaluationConfig::default();
        names
            .iter()
            .map(|name| registry.resolve(name, &config).expect("measure should resolve"))
            .collect()
    }

    #[test]
    fn defaults_to_every_measure_for_the_bundle_aspect_count() {
        let registry = MeasureRegistry::standard();
        let requests =
            select_measure_requests(&registry, &bundle(), &[]).expect("uniform bundle");
        assert_eq!(requests, vec!["cam", "cam_map", "nlre", "nwcs"]);

        let explicit = vec!["nwcs".to_string()];
        let requests =
            select_measure_requests(&registry, &bundle(), &explicit).expect("explicit request");
        assert_eq!(requests, explicit);
    }

    #[test]
    fn failing_query_does_not_abort_other_queries() {
        let measures = resolve(&["nwcs", "nlre"]);
        let evaluation = evaluate_bundle(&bundle(), &measures, &EvaluationConfig::default());

        assert_eq!(evaluation.per_query.len(), 2);
        assert!(evaluation.per_query.iter().all(|score| score.query_id == "301"));
        assert_eq!(evaluation.failures.len(), 2);
        assert!(
            evaluation.failures[0].error.contains("duplicate document D"),
            "unexpected error: {}",
            evaluation.failures[0].error
        );

        let nwcs = &evaluation.summaries[0];
        assert_eq!(nwcs.measure, "nwcs");
        assert_eq!(nwcs.queries_evaluated, 1);
        assert_eq!(nwcs.queries_failed, 1);
        assert!(nwcs.mean.is_some());
    }

    #[test]
    fn mean_is_undefined_when_every_query_fails() {
        let measures = resolve(&["cam_three"]);
        let evaluation = evaluate_bundle(&bundle(), &measures, &EvaluationConfig::default());

        assert!(evaluation.per_query.is_empty());
        assert_eq!(evaluation.summaries[0].queries_failed, 2);
        assert_eq!(evaluation.summaries[0].mean, None);
    }
}
