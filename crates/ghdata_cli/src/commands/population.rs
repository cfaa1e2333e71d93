use std::sync::Arc;

use console::{Term, style};
use ghdata::crawl::{PopulationOptions, collect_population, default_search, population_size};
use ghdata::dataset::write_records;
use ghdata::github::{Bound, RepoSearch};
use tokio_util::sync::CancellationToken;

use super::{CliError, Outcome, build_client};
use crate::ReposArgs;
use crate::config::Config;
use crate::progress::ProgressReporter;

fn search_for(args: &ReposArgs) -> RepoSearch {
    let mut search = default_search();
    if let Some(term) = &args.term {
        search = search.term(term.clone());
    }
    if let Some(min_stars) = args.min_stars {
        search = search.stars(Bound::AtLeast(min_stars));
    }
    search
}

pub(crate) async fn handle_repos(
    args: ReposArgs,
    config: &Config,
    cancel: CancellationToken,
) -> Result<Outcome, CliError> {
    let search = search_for(&args);
    let reporter = Arc::new(ProgressReporter::new());
    let client = build_client(config, &reporter, cancel, args.no_rate_limit)?;
    let is_tty = Term::stdout().is_term();

    if args.count_only {
        let total = population_size(&client, &search).await?;
        if is_tty {
            println!("{} repositories match {}", total, search.to_query());
        } else {
            tracing::info!(total, query = %search.to_query(), "Population size");
        }
        return Ok(Outcome::Complete);
    }

    let mut options = PopulationOptions {
        limit: args.limit,
        ..PopulationOptions::default()
    };
    if args.no_rate_limit {
        options.search_limiter = None;
    }

    let repositories = collect_population(&client, &search, &options).await?;
    reporter.finish();

    let output = config.resolve(args.output.clone());
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let written = write_records(&output, &repositories)?;

    if is_tty {
        println!(
            "\n{} {} repositories written to {}",
            style("✓").green(),
            written,
            output.display()
        );
    } else {
        tracing::info!(written, output = %output.display(), "Population written");
    }
    Ok(Outcome::Complete)
}
