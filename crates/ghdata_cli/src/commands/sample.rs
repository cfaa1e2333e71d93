use std::path::Path;

use console::{Term, style};
use ghdata::dataset::{count_rows, sample_rows};
use ghdata::sample::sample;

use super::CliError;
use crate::SampleArgs;
use crate::config::Config;

/// Copy a reproducible sample of a CSV file's rows, keeping its header.
pub(crate) fn handle_sample(args: SampleArgs, config: &Config) -> Result<usize, CliError> {
    let input = config.resolve(args.input);
    let output = config.resolve(args.output);
    let size = args.size.unwrap_or(config.sample.size);
    let seed = match args.seed {
        Some(seed) => seed,
        None => config.seed()?,
    };

    let copied = sample_file(&input, &output, size, seed)?;

    if Term::stdout().is_term() {
        println!(
            "{} {} rows sampled from {} (seed {}) into {}",
            style("✓").green(),
            copied,
            input.display(),
            seed,
            output.display()
        );
    } else {
        tracing::info!(
            copied,
            seed = %seed,
            input = %input.display(),
            output = %output.display(),
            "Sample written"
        );
    }
    Ok(copied)
}

fn sample_file(
    input: &Path,
    output: &Path,
    size: usize,
    seed: ghdata::Seed,
) -> Result<usize, CliError> {
    let population = count_rows(input)?;
    let set = sample(size, population, seed)?;
    Ok(sample_rows(input, output, &set)?)
}
