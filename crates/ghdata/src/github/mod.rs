//! Read-only GitHub API access for the crawler.
//!
//! # Module Structure
//!
//! - [`error`] - Fetch error taxonomy and retry classification
//! - [`types`] - Response types for the endpoints the crawler reads
//! - [`query`] - Immutable request values and route builders
//! - [`client`] - Authenticated, paced, retrying, cancellable client
//! - [`api`] - Endpoint operations (search, issues, comments, commits, stars)
//! - [`pagination`] - Offset and cursor paginators
//!
//! ```ignore
//! use ghdata::github::{ClientConfig, GitHubClient, IssueQuery, OffsetPages, RoutePages};
//!
//! let client = GitHubClient::from_config(&ClientConfig::new(token))?;
//! let issues = OffsetPages::new(RoutePages::issues(client, "octo/repo", IssueQuery::default()))
//!     .collect_all()
//!     .await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod pagination;
pub mod query;
pub mod types;

pub use api::StarPage;
pub use client::{ClientConfig, GitHubClient};
pub use error::{FetchError, short_error_message};
pub use pagination::{
    CursorPage, CursorPages, CursorSource, OffsetPages, PageSource, RoutePages, StargazerCursor,
};
pub use query::{
    Bound, CommitQuery, IssueQuery, IssueStateFilter, RepoSearch, SearchRequest, SortKey,
    SortOrder, Visibility,
};
pub use types::{Comment, Commit, Issue, IssueState, Repository, SearchPage, Stargazer, User};
