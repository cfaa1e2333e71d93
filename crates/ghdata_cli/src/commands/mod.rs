pub(crate) mod crawl;
pub(crate) mod meta;
pub(crate) mod population;
pub(crate) mod sample;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use console::{Term, style};
use ghdata::crawl::CrawlReport;
use ghdata::{CrawlError, GitHubClient};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigError};
use crate::progress::ProgressReporter;

/// Errors that end a command.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

macro_rules! from_library_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CliError {
                fn from(e: $ty) -> Self {
                    Self::Crawl(e.into())
                }
            }
        )*
    };
}

from_library_error!(
    ghdata::FetchError,
    ghdata::DatasetError,
    ghdata::SampleError,
    ghdata::HttpError,
);

impl CliError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Crawl(e) if e.is_cancelled() => ExitCode::from(130),
            _ => ExitCode::FAILURE,
        }
    }
}

/// How a command ended, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Complete,
    /// Finished, but some repositories were abandoned.
    Partial,
    /// Stopped by Ctrl+C; partial results were written.
    Cancelled,
}

impl Outcome {
    pub(crate) fn from_report<R>(report: &CrawlReport<R>) -> Self {
        if report.cancelled {
            Self::Cancelled
        } else if report.has_failures() {
            Self::Partial
        } else {
            Self::Complete
        }
    }

    pub(crate) fn exit_code(self) -> ExitCode {
        match self {
            Self::Complete => ExitCode::SUCCESS,
            Self::Partial => ExitCode::from(3),
            Self::Cancelled => ExitCode::from(130),
        }
    }
}

/// Build the production client with progress and cancellation wired in.
pub(crate) fn build_client(
    config: &Config,
    reporter: &Arc<ProgressReporter>,
    cancel: CancellationToken,
    no_rate_limit: bool,
) -> Result<GitHubClient, CliError> {
    let client_config = config.client_config()?;
    let mut client = GitHubClient::from_config(&client_config)?
        .with_cancellation(cancel)
        .with_progress(Some(reporter.as_callback()));
    if no_rate_limit {
        tracing::warn!("Proactive rate limiting disabled");
        client = client.with_rate_limiter(None);
    }
    Ok(client)
}

/// Print what a crawl did. Returns how it ended.
pub(crate) fn print_report<R>(kind: &str, report: &CrawlReport<R>, output: &Path) -> Outcome {
    let outcome = Outcome::from_report(report);

    if Term::stdout().is_term() {
        println!();
        println!(
            "{} {}: {}/{} repositories, {} rows written to {}",
            match outcome {
                Outcome::Complete => style("✓").green(),
                Outcome::Partial => style("⚠").yellow(),
                Outcome::Cancelled => style("✗").red(),
            },
            kind,
            report.succeeded,
            report.attempted,
            report.records.len(),
            output.display()
        );
        for failure in &report.failures {
            println!("  {} {}: {}", style("✗").red(), failure.full_name, failure.error);
        }
        if report.cancelled {
            println!("  {}", style("cancelled before every repository was crawled").yellow());
        }
    } else {
        tracing::info!(
            kind,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed_count(),
            records = report.records.len(),
            cancelled = report.cancelled,
            output = %output.display(),
            "Run summary"
        );
        for failure in &report.failures {
            tracing::warn!(repo = %failure.full_name, status = ?failure.status, error = %failure.error, "Failed repository");
        }
    }

    outcome
}
