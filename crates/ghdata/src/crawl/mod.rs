//! Crawl orchestration over a list of repositories.
//!
//! # Module Structure
//!
//! - [`types`] - Options, output rows, `CrawlReport`, constants
//! - [`progress`] - Progress reporting: `CrawlProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - Per-repository operations and the bounded worker pool
//! - [`population`] - Repository population through the search API
//!
//! # Example
//!
//! ```ignore
//! use ghdata::crawl::{CrawlOptions, crawl_comments};
//!
//! let report = crawl_comments(&client, &repositories, &CrawlOptions::default()).await;
//! println!("{} rows, {} failures", report.records.len(), report.failed_count());
//! ```

pub mod engine;
pub mod population;
pub(crate) mod progress;
pub(crate) mod types;

// Re-export types
pub use types::{
    CommentRecord, CommitHistoryRow, CrawlOptions, CrawlReport, IssueRecord, RepoFailure,
    StarHistoryRow, StarSource,
};

// Re-export constants
pub use types::{DEFAULT_CONCURRENCY, DEFAULT_END_YEAR, DEFAULT_START_YEAR, ISSUE_ROW_COMMENT_ID};

// Re-export progress types
pub use progress::{CrawlProgress, ProgressCallback, emit};

pub use engine::{
    comment_rows, commit_activity, crawl_comments, crawl_commits, crawl_issues,
    crawl_repositories, crawl_stars, issue_rows, star_history,
};
pub use population::{PopulationOptions, collect_population, default_search, population_size};
