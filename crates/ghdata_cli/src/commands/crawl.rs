use std::path::{Path, PathBuf};
use std::sync::Arc;

use ghdata::crawl::{
    CrawlOptions, CrawlReport, StarSource, crawl_comments, crawl_commits, crawl_issues,
    crawl_stars,
};
use ghdata::dataset::{count_rows, read_repositories, read_sampled_repositories, write_records};
use ghdata::interval::DateRange;
use ghdata::sample::sample;
use ghdata::Repository;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{CliError, Outcome, build_client, print_report};
use crate::config::{Config, ConfigError};
use crate::progress::ProgressReporter;
use crate::{CrawlArgs, StarSourceArg};

/// What a crawl subcommand collects.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CrawlKind {
    Issues,
    Comments {
        collaborators: bool,
        all_issues: bool,
    },
    Commits,
    Stars {
        source: StarSourceArg,
    },
}

impl CrawlKind {
    fn name(self) -> &'static str {
        match self {
            Self::Issues => "issues",
            Self::Comments { .. } => "comments",
            Self::Commits => "commits",
            Self::Stars { .. } => "stars",
        }
    }
}

pub(crate) async fn handle_crawl(
    kind: CrawlKind,
    args: CrawlArgs,
    config: &Config,
    cancel: CancellationToken,
) -> Result<Outcome, CliError> {
    let input = config.resolve(args.input.clone());
    let output = config.resolve(
        args.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.csv", kind.name()))),
    );

    let repositories = load_repositories(&args, config, &input)?;
    let options = crawl_options(kind, &args, config)?;
    tracing::info!(
        "Crawling {} for {} repositories from {}",
        kind.name(),
        repositories.len(),
        input.display()
    );

    let reporter = Arc::new(ProgressReporter::new());
    let client = build_client(config, &reporter, cancel, args.no_rate_limit)?;

    match kind {
        CrawlKind::Issues => {
            let report = crawl_issues(&client, &repositories, &options).await;
            finish(kind, report, &output, &reporter)
        }
        CrawlKind::Comments { .. } => {
            let report = crawl_comments(&client, &repositories, &options).await;
            finish(kind, report, &output, &reporter)
        }
        CrawlKind::Commits => {
            let report = crawl_commits(&client, &repositories, &options).await;
            finish(kind, report, &output, &reporter)
        }
        CrawlKind::Stars { .. } => {
            let report = crawl_stars(&client, &repositories, &options).await;
            finish(kind, report, &output, &reporter)
        }
    }
}

/// Read the repository list, sampling it in one pass when asked to.
fn load_repositories(
    args: &CrawlArgs,
    config: &Config,
    input: &Path,
) -> Result<Vec<Repository>, CliError> {
    let Some(size) = args.sample_size else {
        return Ok(read_repositories(input)?);
    };
    let seed = match args.seed {
        Some(seed) => seed,
        None => config.seed()?,
    };
    let population = count_rows(input)?;
    let set = sample(size, population, seed)?;
    tracing::info!(
        "Sampled {} of {} repositories with seed {}",
        set.len(),
        population,
        seed
    );
    Ok(read_sampled_repositories(input, &set)?)
}

fn crawl_options(kind: CrawlKind, args: &CrawlArgs, config: &Config) -> Result<CrawlOptions, CliError> {
    let mut options = config.crawl_options()?;

    if args.start_year.is_some() || args.end_year.is_some() {
        let start = args.start_year.unwrap_or(config.crawl.start_year);
        let end = args.end_year.unwrap_or(config.crawl.end_year);
        if start > end {
            return Err(ConfigError::InvalidYears { start, end }.into());
        }
        let window = DateRange::years(start, end).ok_or(ConfigError::InvalidYears { start, end })?;
        options = options.with_window(window);
    }
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }
    if let Some(max_pages) = args.max_pages {
        options.max_pages = max_pages.max(1);
    }

    match kind {
        CrawlKind::Comments {
            collaborators,
            all_issues,
        } => {
            options.check_collaborators = collaborators;
            options.skip_uncommented = !all_issues;
        }
        CrawlKind::Stars { source } => {
            options.star_source = match source {
                StarSourceArg::Rest => StarSource::Rest,
                StarSourceArg::Graphql => StarSource::GraphQl,
            };
        }
        CrawlKind::Issues | CrawlKind::Commits => {}
    }
    Ok(options)
}

/// Write whatever was collected, even after cancellation, and summarise.
fn finish<R: Serialize>(
    kind: CrawlKind,
    report: CrawlReport<R>,
    output: &Path,
    reporter: &ProgressReporter,
) -> Result<Outcome, CliError> {
    reporter.finish();
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    write_records(output, &report.records)?;
    Ok(print_report(kind.name(), &report, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(input: PathBuf) -> CrawlArgs {
        CrawlArgs {
            input,
            output: None,
            sample_size: None,
            seed: None,
            start_year: None,
            end_year: None,
            concurrency: None,
            max_pages: None,
            no_rate_limit: false,
        }
    }

    fn population(dir: &TempDir, n: i64) -> PathBuf {
        let path = dir.path().join("repos.csv");
        let repos: Vec<Repository> = (0..n)
            .map(|i| Repository {
                id: i,
                name: format!("r{i}"),
                full_name: format!("o/r{i}"),
                stars: 100,
            })
            .collect();
        write_records(&path, &repos).unwrap();
        path
    }

    #[test]
    fn loads_every_repository_without_sampling() {
        let dir = TempDir::new().unwrap();
        let path = population(&dir, 10);
        let repos = load_repositories(&args(path.clone()), &Config::default(), &path).unwrap();
        assert_eq!(repos.len(), 10);
    }

    #[test]
    fn sampling_is_reproducible_and_fails_fast_when_oversized() {
        let dir = TempDir::new().unwrap();
        let path = population(&dir, 10);

        let mut sampled = args(path.clone());
        sampled.sample_size = Some(4);
        let first = load_repositories(&sampled, &Config::default(), &path).unwrap();
        let second = load_repositories(&sampled, &Config::default(), &path).unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);

        sampled.sample_size = Some(11);
        let err = load_repositories(&sampled, &Config::default(), &path).unwrap_err();
        assert!(err.to_string().contains("population of 10"));
    }

    #[test]
    fn flags_override_configured_options() {
        let mut a = args(PathBuf::from("repos.csv"));
        a.start_year = Some(2018);
        a.concurrency = Some(0);
        let options = crawl_options(
            CrawlKind::Comments {
                collaborators: true,
                all_issues: true,
            },
            &a,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(options.issue_window, DateRange::years(2018, 2019).unwrap());
        assert_eq!(options.concurrency, 1);
        assert!(options.check_collaborators);
        assert!(!options.skip_uncommented);

        a.end_year = Some(2017);
        assert!(crawl_options(CrawlKind::Commits, &a, &Config::default()).is_err());
    }

    #[test]
    fn star_source_flag_selects_rest() {
        let options = crawl_options(
            CrawlKind::Stars {
                source: StarSourceArg::Rest,
            },
            &args(PathBuf::from("repos.csv")),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(options.star_source, StarSource::Rest);
    }
}
