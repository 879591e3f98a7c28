use std::io::{self, Write};

use anyhow::{Context, Result};
use aspecteval::MeasureRegistry;
use aspecteval::measures::MeasureDefinition;

use crate::cli::MeasuresArgs;

pub fn run(args: MeasuresArgs) -> Result<()> {
    let registry = MeasureRegistry::standard();
    let definitions = registry
        .definitions()
        .filter(|definition| args.aspects.is_none_or(|aspects| definition.aspects == aspects))
        .collect::<Vec<&MeasureDefinition>>();

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &definitions)
            .context("failed to serialize measure list")?;
        writeln!(output)?;
    } else {
        for definition in &definitions {
            writeln!(
                output,
                "{:<16}\t{}\t{}\t{}{}",
                definition.name,
                definition.family.as_str(),
                definition.aspects,
                definition.description,
                if definition.accepts_parameters {
                    " [params]"
                } else {
                    ""
                }
            )?;
        }
    }
    output.flush()?;
    Ok(())
}
