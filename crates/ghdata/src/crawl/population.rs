//! Repository population fetch through the search API.
//!
//! The search endpoint never returns more than 1000 results for one query, so
//! larger populations are walked with a sliding star window: results are
//! sorted by stars ascending, and once a window is drained the `stars:>=`
//! qualifier is raised to the last star count seen. Repositories sharing that
//! star count show up again in the next window and are dropped by ID.

use std::collections::HashSet;

use chrono::{Months, NaiveDate};

use super::progress::{CrawlProgress, emit};
use crate::github::error::FetchError;
use crate::github::query::{Bound, RepoSearch, SearchRequest, SortKey, SortOrder, Visibility};
use crate::github::types::Repository;
use crate::github::GitHubClient;
use crate::rate_limit::{ApiRateLimiter, quotas};

/// Pages the search API serves for one query (1000 results at 100 per page).
pub const SEARCH_PAGES_PER_QUERY: u32 = 10;

/// The population of the published datasets: public, non-mirror,
/// non-template repositories matching "library" with at least 100 stars,
/// created on or before 2019-09-30 and pushed to at least six months later
/// (on or after 2020-03-30).
pub fn default_search() -> RepoSearch {
    let mut search = RepoSearch::new()
        .term("library")
        .stars(Bound::AtLeast(100))
        .visibility(Visibility::Public)
        .mirror(false)
        .template(false);
    if let Some(created) = NaiveDate::from_ymd_opt(2019, 9, 30) {
        search = search.created(Bound::AtMost(created));
        if let Some(pushed) = created.checked_add_months(Months::new(6)) {
            search = search.pushed(Bound::AtLeast(pushed));
        }
    }
    search
}

#[derive(Debug, Clone)]
pub struct PopulationOptions {
    pub per_page: u32,
    pub pages_per_window: u32,
    /// Stop after this many repositories.
    pub limit: Option<usize>,
    /// Pacing for search requests, separate from the core quota.
    pub search_limiter: Option<ApiRateLimiter>,
}

impl Default for PopulationOptions {
    fn default() -> Self {
        Self {
            per_page: crate::github::query::DEFAULT_PER_PAGE,
            pages_per_window: SEARCH_PAGES_PER_QUERY,
            limit: None,
            search_limiter: Some(ApiRateLimiter::per_minute(
                quotas::GITHUB_SEARCH_PER_MINUTE,
            )),
        }
    }
}

/// Number of repositories matching `search`, from a single one-item page.
pub async fn population_size(client: &GitHubClient, search: &RepoSearch) -> Result<u64, FetchError> {
    let request = SearchRequest::new(search.clone()).per_page(1);
    let page = client.search_repositories(&request).await?;
    if page.incomplete_results {
        tracing::warn!("Search reported incomplete results; total_count may be low");
    }
    Ok(page.total_count)
}

fn lower_star_bound(search: &RepoSearch) -> u64 {
    match search.stars_bound() {
        Some(Bound::AtLeast(n) | Bound::Exactly(n) | Bound::Between(n, _)) => n,
        Some(Bound::Above(n)) => n.saturating_add(1),
        _ => 0,
    }
}

/// Walk the whole population of `search`, oldest star count first.
///
/// Stops when `total_count` repositories have been collected, when a page
/// comes back empty or short, or when a full window adds nothing new.
#[tracing::instrument(skip_all, fields(query = %search.to_query()))]
pub async fn collect_population(
    client: &GitHubClient,
    search: &RepoSearch,
    options: &PopulationOptions,
) -> Result<Vec<Repository>, FetchError> {
    let client = client
        .clone()
        .with_rate_limiter(options.search_limiter.clone());
    let on_progress = client.progress().cloned();
    let per_page = options.per_page.max(1);

    let mut window = search.clone();
    let mut min_stars = lower_star_bound(search);
    let mut target: Option<u64> = None;
    let mut seen: HashSet<i64> = HashSet::new();
    let mut repositories: Vec<Repository> = Vec::new();
    let mut incomplete_warned = false;

    'windows: loop {
        let mut added = 0usize;
        let mut last_stars: Option<u64> = None;
        let mut drained = false;

        for page in 1..=options.pages_per_window.max(1) {
            let request = SearchRequest::new(window.clone())
                .sort(SortKey::Stars, SortOrder::Asc)
                .per_page(per_page)
                .page(page);
            let result = client.search_repositories(&request).await?;

            let total = *target.get_or_insert(result.total_count);
            if result.incomplete_results && !incomplete_warned {
                emit(
                    on_progress.as_ref(),
                    CrawlProgress::Warning {
                        message: format!(
                            "search returned incomplete results at stars>={min_stars}; the population may have gaps"
                        ),
                    },
                );
                tracing::warn!(
                    "Search returned incomplete results at stars>={}; the population may have gaps",
                    min_stars
                );
                incomplete_warned = true;
            }

            let count = result.items.len();
            for repo in result.items {
                last_stars = Some(repo.stars);
                if seen.insert(repo.id) {
                    repositories.push(repo);
                    added += 1;
                }
            }

            emit(
                on_progress.as_ref(),
                CrawlProgress::PopulationProgress {
                    collected: repositories.len(),
                    total,
                    min_stars,
                },
            );

            let limit_reached = options.limit.is_some_and(|limit| repositories.len() >= limit);
            if limit_reached || repositories.len() as u64 >= total {
                break 'windows;
            }
            if count < per_page as usize {
                drained = true;
                break;
            }
        }

        if drained {
            break;
        }
        if added == 0 {
            let message = format!(
                "star window at stars>={min_stars} added no new repositories; stopping with {} of {}",
                repositories.len(),
                target.unwrap_or_default()
            );
            tracing::warn!("{}", message);
            emit(on_progress.as_ref(), CrawlProgress::Warning { message });
            break;
        }
        let Some(stars) = last_stars else {
            break;
        };
        tracing::debug!(
            "Raising star window from {} to {} after {} repositories",
            min_stars,
            stars,
            repositories.len()
        );
        min_stars = stars;
        window = window.stars(Bound::AtLeast(stars));
    }

    if let Some(limit) = options.limit {
        repositories.truncate(limit);
    }
    tracing::info!("Collected {} repositories", repositories.len());
    Ok(repositories)
}
