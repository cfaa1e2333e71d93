//! Per-repository crawl operations and the bounded worker pool that drives
//! them over a list of repositories.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use super::progress::{CrawlProgress, emit};
use super::types::{
    CommentRecord, CommitHistoryRow, CrawlOptions, CrawlReport, IssueRecord, RepoFailure,
    StarHistoryRow, StarSource,
};
use crate::github::error::{FetchError, short_error_message};
use crate::github::pagination::{CursorPages, OffsetPages, RoutePages, StargazerCursor};
use crate::github::query::{CommitQuery, IssueQuery, IssueStateFilter};
use crate::github::types::{Issue, IssueState, Repository};
use crate::github::GitHubClient;
use crate::interval::{IntervalCounter, cumulative_series};

/// Closed, non-PR issues created inside the issue window.
pub async fn qualifying_issues(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<Issue>, FetchError> {
    let query = IssueQuery {
        state: IssueStateFilter::Closed,
        per_page: options.per_page,
    };
    let mut pages = OffsetPages::new(RoutePages::issues(client.clone(), &repo.full_name, query))
        .with_max_pages(options.max_pages)
        .with_progress(client.progress().cloned());

    let mut issues = Vec::new();
    while let Some(page) = pages.next_page().await? {
        issues.extend(page.into_iter().filter(|issue| {
            !issue.is_pull_request()
                && issue.state == IssueState::Closed
                && options.issue_window.contains(issue.created_at)
        }));
    }
    Ok(issues)
}

/// One row per qualifying issue.
#[tracing::instrument(skip_all, fields(repo = %repo.full_name))]
pub async fn issue_rows(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<IssueRecord>, FetchError> {
    let issues = qualifying_issues(client, repo, options).await?;
    Ok(issues
        .iter()
        .map(|issue| IssueRecord::from_issue(repo.id, issue))
        .collect())
}

/// The issue row followed by its in-window comments, for every qualifying
/// issue.
#[tracing::instrument(skip_all, fields(repo = %repo.full_name))]
pub async fn comment_rows(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<CommentRecord>, FetchError> {
    let issues = qualifying_issues(client, repo, options).await?;
    let mut rows = Vec::new();

    for issue in &issues {
        if client.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        rows.push(CommentRecord::issue_row(repo.id, issue));

        if options.skip_uncommented && issue.comments == 0 {
            continue;
        }

        let comments = OffsetPages::new(RoutePages::comments(
            client.clone(),
            &repo.full_name,
            issue.number,
            options.per_page,
        ))
        .with_max_pages(options.max_pages)
        .collect_all()
        .await?;

        rows.extend(
            comments
                .iter()
                .filter(|c| options.issue_window.contains(c.created_at))
                .map(|c| CommentRecord::comment_row(repo.id, issue, c)),
        );
    }

    if options.check_collaborators {
        annotate_collaborators(client, repo, &mut rows).await?;
    }

    tracing::debug!(
        "{} issues, {} rows for {}",
        issues.len(),
        rows.len(),
        repo.full_name
    );
    Ok(rows)
}

/// Fill `collaborator` for every row with a known author, one request per
/// distinct login.
async fn annotate_collaborators(
    client: &GitHubClient,
    repo: &Repository,
    rows: &mut [CommentRecord],
) -> Result<(), FetchError> {
    let mut known: HashMap<String, bool> = HashMap::new();
    for row in rows.iter_mut() {
        let Some(login) = row.author.as_deref() else {
            continue;
        };
        let is_collaborator = match known.get(login) {
            Some(&cached) => cached,
            None => {
                let fetched = client.is_collaborator(&repo.full_name, login).await?;
                known.insert(login.to_string(), fetched);
                fetched
            }
        };
        row.collaborator = Some(is_collaborator);
    }
    Ok(())
}

/// Commits per week inside the commit window.
#[tracing::instrument(skip_all, fields(repo = %repo.full_name))]
pub async fn commit_activity(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<CommitHistoryRow>, FetchError> {
    let window = options.commit_window;
    let query = CommitQuery {
        since: Some(window.since()),
        until: Some(window.until()),
        per_page: options.per_page,
    };
    let mut pages = OffsetPages::new(RoutePages::commits(client.clone(), &repo.full_name, query))
        .with_max_pages(options.max_pages)
        .with_progress(client.progress().cloned());

    let mut counter = IntervalCounter::new(repo.id, options.commit_epoch, window);
    let mut undated = 0usize;
    while let Some(page) = pages.next_page().await? {
        for commit in page {
            match commit.timestamp() {
                Some(ts) => {
                    counter.add(ts);
                }
                None => undated += 1,
            }
        }
    }
    if undated > 0 {
        tracing::debug!("{} commits without a date in {}", undated, repo.full_name);
    }

    Ok(counter
        .into_records()
        .into_iter()
        .map(CommitHistoryRow::from)
        .collect())
}

/// Every star timestamp of a repository, in source order.
pub async fn star_timestamps(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<DateTime<Utc>>, FetchError> {
    match options.star_source {
        StarSource::Rest => {
            let stargazers = OffsetPages::new(RoutePages::stargazers(
                client.clone(),
                &repo.full_name,
                options.per_page,
            ))
            .with_max_pages(options.max_pages)
            .with_progress(client.progress().cloned())
            .collect_all()
            .await?;
            Ok(stargazers.into_iter().map(|s| s.starred_at).collect())
        }
        StarSource::GraphQl => {
            let name = repo
                .full_name
                .split_once('/')
                .map_or(repo.name.as_str(), |(_, name)| name);
            CursorPages::new(StargazerCursor::new(
                client.clone(),
                repo.owner(),
                name,
                options.per_page,
            ))
            .with_max_pages(options.max_pages)
            .with_progress(client.progress().cloned())
            .collect_all()
            .await
        }
    }
}

/// Cumulative stars at each week boundary inside the star window.
#[tracing::instrument(skip_all, fields(repo = %repo.full_name))]
pub async fn star_history(
    client: &GitHubClient,
    repo: &Repository,
    options: &CrawlOptions,
) -> Result<Vec<StarHistoryRow>, FetchError> {
    let stars = star_timestamps(client, repo, options).await?;
    if stars.is_empty() {
        tracing::debug!("{} has no stargazers", repo.full_name);
    }
    Ok(
        cumulative_series(repo.id, stars, options.star_epoch, options.star_window)
            .into_iter()
            .map(StarHistoryRow::from)
            .collect(),
    )
}

enum Outcome<R> {
    /// Cancelled before the repository was started.
    Skipped,
    Finished(Result<Vec<R>, FetchError>),
}

/// Run `operation` for every repository on a bounded worker pool.
///
/// All workers share `client` (and with it the rate limiter and the
/// cancellation token). Results are merged in input order. A failing
/// repository is recorded in [`CrawlReport::failures`] and the crawl moves on;
/// once cancellation is requested, repositories not yet started are skipped.
#[tracing::instrument(skip_all, fields(kind = kind, repositories = repos.len()))]
pub async fn crawl_repositories<R, F, Fut>(
    client: &GitHubClient,
    repos: &[Repository],
    options: &CrawlOptions,
    kind: &'static str,
    operation: F,
) -> CrawlReport<R>
where
    R: Send + 'static,
    F: Fn(GitHubClient, Repository, CrawlOptions) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, FetchError>> + Send + 'static,
{
    let on_progress = client.progress().cloned();
    let concurrency = options.concurrency.max(1);

    emit(
        on_progress.as_ref(),
        CrawlProgress::CrawlStarted {
            kind,
            repositories: repos.len(),
            concurrency,
        },
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(repos.len());

    for repo in repos {
        let repo = repo.clone();
        let client = client.clone();
        let options = options.clone();
        let semaphore = Arc::clone(&semaphore);
        let operation = operation.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Outcome::Skipped,
            };
            if client.is_cancelled() {
                return Outcome::Skipped;
            }
            Outcome::Finished(operation(client, repo, options).await)
        });

        handles.push(handle);
    }

    let mut report = CrawlReport::default();
    for (repo, handle) in repos.iter().zip(handles) {
        let result = match handle.await {
            Ok(Outcome::Skipped) => {
                report.cancelled = true;
                continue;
            }
            Ok(Outcome::Finished(result)) => result,
            Err(e) => {
                tracing::error!("Worker for {} panicked: {}", repo.full_name, e);
                report.attempted += 1;
                report.failures.push(RepoFailure {
                    repo_id: repo.id,
                    full_name: repo.full_name.clone(),
                    error: format!("task panic: {e}"),
                    status: None,
                });
                continue;
            }
        };
        report.attempted += 1;

        match result {
            Ok(records) => {
                emit(
                    on_progress.as_ref(),
                    CrawlProgress::RepositoryComplete {
                        full_name: repo.full_name.clone(),
                        records: records.len(),
                    },
                );
                report.succeeded += 1;
                report.records.extend(records);
            }
            Err(e) if e.is_cancelled() => {
                report.cancelled = true;
            }
            Err(e) => {
                let error = short_error_message(&e);
                tracing::warn!("Skipping {}: {}", repo.full_name, error);
                emit(
                    on_progress.as_ref(),
                    CrawlProgress::RepositoryFailed {
                        full_name: repo.full_name.clone(),
                        error: error.clone(),
                    },
                );
                report.failures.push(RepoFailure {
                    repo_id: repo.id,
                    full_name: repo.full_name.clone(),
                    error,
                    status: e.status(),
                });
            }
        }
    }

    emit(
        on_progress.as_ref(),
        CrawlProgress::CrawlComplete {
            succeeded: report.succeeded,
            failed: report.failures.len(),
            records: report.records.len(),
            cancelled: report.cancelled,
        },
    );
    tracing::info!(
        "{} crawl finished: {}/{} repositories, {} records, {} failures{}",
        kind,
        report.succeeded,
        repos.len(),
        report.records.len(),
        report.failures.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    report
}

pub async fn crawl_issues(
    client: &GitHubClient,
    repos: &[Repository],
    options: &CrawlOptions,
) -> CrawlReport<IssueRecord> {
    crawl_repositories(client, repos, options, "issues", |client, repo, options| async move {
        issue_rows(&client, &repo, &options).await
    })
    .await
}

pub async fn crawl_comments(
    client: &GitHubClient,
    repos: &[Repository],
    options: &CrawlOptions,
) -> CrawlReport<CommentRecord> {
    crawl_repositories(client, repos, options, "comments", |client, repo, options| async move {
        comment_rows(&client, &repo, &options).await
    })
    .await
}

pub async fn crawl_commits(
    client: &GitHubClient,
    repos: &[Repository],
    options: &CrawlOptions,
) -> CrawlReport<CommitHistoryRow> {
    crawl_repositories(client, repos, options, "commits", |client, repo, options| async move {
        commit_activity(&client, &repo, &options).await
    })
    .await
}

pub async fn crawl_stars(
    client: &GitHubClient,
    repos: &[Repository],
    options: &CrawlOptions,
) -> CrawlReport<StarHistoryRow> {
    crawl_repositories(client, repos, options, "stars", |client, repo, options| async move {
        star_history(&client, &repo, &options).await
    })
    .await
}
