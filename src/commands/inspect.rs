use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use aspecteval::{EvaluationBundle, IdealSentinels, Reconciler, Reconciliation};
use serde::Serialize;
use tracing::info;

use crate::cli::InspectArgs;
use crate::util::read_json;

#[derive(Debug, Serialize)]
struct InspectOutput<'a> {
    ideal_sentinels: IdealSentinels,
    max_docs_per_query: usize,
    reconciliation: &'a Reconciliation,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let bundle: EvaluationBundle = read_json(&args.input)?;
    let query = bundle
        .query(&args.query_id)
        .ok_or_else(|| anyhow!("query {} not found in {}", args.query_id, args.input.display()))?;

    let mut reconciler = Reconciler::new(args.ideal_sentinels.into());
    reconciler
        .reconcile(&query.judgments, &query.results, args.max_docs_per_query)
        .with_context(|| format!("failed to reconcile query {}", args.query_id))?;
    let sentinels = reconciler.sentinels();
    let reconciliation = reconciler
        .into_latest()
        .ok_or_else(|| anyhow!("no reconciliation retained for query {}", args.query_id))?;

    info!(
        query_id = %reconciliation.query_id,
        retrieved = reconciliation.stats.num_ret,
        judged = reconciliation.stats.num_judged,
        "reconciled query"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let payload = InspectOutput {
            ideal_sentinels: sentinels,
            max_docs_per_query: args.max_docs_per_query,
            reconciliation: &reconciliation,
        };
        serde_json::to_writer_pretty(&mut output, &payload)
            .context("failed to serialize inspect json output")?;
        writeln!(output)?;
    } else {
        write_text(&mut output, &reconciliation, sentinels)?;
    }
    output.flush()?;
    Ok(())
}

fn write_text<W: Write>(
    output: &mut W,
    reconciliation: &Reconciliation,
    sentinels: IdealSentinels,
) -> Result<()> {
    let stats = &reconciliation.stats;
    writeln!(
        output,
        "query {} aspects={} sentinels={}",
        reconciliation.query_id,
        reconciliation.aspects,
        sentinels.as_str()
    )?;
    writeln!(
        output,
        "num_ret={} num_judged={} num_nonpool={} num_unjudged_in_pool={} max_levels={:?}",
        stats.num_ret,
        stats.num_judged,
        stats.num_nonpool,
        stats.num_unjudged_in_pool,
        stats.max_levels
    )?;

    writeln!(output)?;
    writeln!(output, "rank\tdocument\tsimilarity\tscores\tideal_sum")?;
    for entry in &reconciliation.entries {
        let levels = entry
            .levels
            .iter()
            .map(|level| match level {
                Some(value) => value.to_string(),
                None => "-".to_string(),
            })
            .collect::<Vec<String>>()
            .join(",");
        writeln!(
            output,
            "{}\t{}\t{:.6}\t{}\t{}",
            entry.rank, entry.document_id, entry.similarity, levels, entry.ideal_sum
        )?;
    }

    writeln!(output)?;
    writeln!(output, "ideal\tdocument\taspects\taspect_sum")?;
    for (index, ideal) in reconciliation.ideal.iter().enumerate() {
        let aspects = ideal
            .aspects
            .iter()
            .map(i64::to_string)
            .collect::<Vec<String>>()
            .join(",");
        writeln!(
            output,
            "{}\t{}\t{}\t{}",
            index + 1,
            ideal.document_id,
            aspects,
            ideal.aspect_sum
        )?;
    }
    Ok(())
}
