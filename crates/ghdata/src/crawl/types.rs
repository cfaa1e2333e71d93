//! Crawl options, output rows and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::pagination::{DEFAULT_MAX_PAGES, DEFAULT_PER_PAGE};
use crate::github::types::{Comment, Issue};
use crate::interval::{COMMIT_EPOCH_YEAR, DateRange, Epoch, IntervalRecord, STAR_EPOCH_YEAR};

/// Default number of repositories crawled at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// First and last calendar year of the default observation window.
pub const DEFAULT_START_YEAR: i32 = 2016;
pub const DEFAULT_END_YEAR: i32 = 2019;

/// `comment_id` of the row that carries the issue itself.
pub const ISSUE_ROW_COMMENT_ID: i64 = -1;

/// Where star timestamps come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StarSource {
    /// REST stargazers with the star media type.
    Rest,
    /// GraphQL stargazer connection, oldest first.
    #[default]
    GraphQl,
}

/// Options shared by every crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Issues and comments outside this window are dropped.
    pub issue_window: DateRange,
    pub commit_window: DateRange,
    pub star_window: DateRange,
    pub commit_epoch: Epoch,
    pub star_epoch: Epoch,
    pub per_page: u32,
    /// Page ceiling per paginator.
    pub max_pages: u32,
    /// Repositories crawled at once; all workers share one client.
    pub concurrency: usize,
    pub star_source: StarSource,
    /// Skip the comments request for issues reporting zero comments.
    pub skip_uncommented: bool,
    /// Annotate comment rows with the author's collaborator status.
    pub check_collaborators: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        let window = DateRange::years(DEFAULT_START_YEAR, DEFAULT_END_YEAR)
            .unwrap_or_else(DateRange::unbounded);
        Self {
            issue_window: window,
            commit_window: window,
            star_window: window,
            commit_epoch: Epoch::start_of_year(COMMIT_EPOCH_YEAR).unwrap_or_default(),
            star_epoch: Epoch::start_of_year(STAR_EPOCH_YEAR).unwrap_or_default(),
            per_page: DEFAULT_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: DEFAULT_CONCURRENCY,
            star_source: StarSource::default(),
            skip_uncommented: true,
            check_collaborators: false,
        }
    }
}

impl CrawlOptions {
    /// Use the same year window for issues, commits and stars.
    #[must_use]
    pub fn with_window(mut self, window: DateRange) -> Self {
        self.issue_window = window;
        self.commit_window = window;
        self.star_window = window;
        self
    }
}

/// One closed, non-PR issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub repo_id: i64,
    pub issue_id: i64,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub author_id: Option<i64>,
    pub author: Option<String>,
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub author_association: String,
}

impl IssueRecord {
    pub fn from_issue(repo_id: i64, issue: &Issue) -> Self {
        Self {
            repo_id,
            issue_id: issue.id,
            number: issue.number,
            title: issue.title.clone(),
            body: issue.body.clone().unwrap_or_default(),
            author_id: issue.user.as_ref().map(|u| u.id),
            author: issue.user.as_ref().map(|u| u.login.clone()),
            comments: issue.comments,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            author_association: issue.author_association.clone(),
        }
    }
}

/// One text unit of an issue thread: the issue itself or one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub repo_id: i64,
    pub issue_id: i64,
    /// [`ISSUE_ROW_COMMENT_ID`] for the issue row.
    pub comment_id: i64,
    pub author_id: Option<i64>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub text: String,
    #[serde(rename = "type")]
    pub author_association: String,
    /// Filled only when collaborator checks are enabled.
    pub collaborator: Option<bool>,
}

impl CommentRecord {
    /// The sentinel row for the issue: title and body as text.
    pub fn issue_row(repo_id: i64, issue: &Issue) -> Self {
        Self {
            repo_id,
            issue_id: issue.id,
            comment_id: ISSUE_ROW_COMMENT_ID,
            author_id: issue.user.as_ref().map(|u| u.id),
            author: issue.user.as_ref().map(|u| u.login.clone()),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            text: issue.text(),
            author_association: issue.author_association.clone(),
            collaborator: None,
        }
    }

    pub fn comment_row(repo_id: i64, issue: &Issue, comment: &Comment) -> Self {
        Self {
            repo_id,
            issue_id: issue.id,
            comment_id: comment.id,
            author_id: comment.user.as_ref().map(|u| u.id),
            author: comment.user.as_ref().map(|u| u.login.clone()),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            text: comment.body.clone().unwrap_or_default(),
            author_association: comment.author_association.clone(),
            collaborator: None,
        }
    }

    pub fn is_issue_row(&self) -> bool {
        self.comment_id == ISSUE_ROW_COMMENT_ID
    }
}

/// Commits per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHistoryRow {
    pub repo_id: i64,
    pub commits: u64,
    pub interval: i64,
}

impl From<IntervalRecord> for CommitHistoryRow {
    fn from(r: IntervalRecord) -> Self {
        Self {
            repo_id: r.repo_id,
            commits: r.count,
            interval: r.interval,
        }
    }
}

/// Cumulative stars at a week boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarHistoryRow {
    pub repo_id: i64,
    pub stars: u64,
    pub interval: i64,
}

impl From<IntervalRecord> for StarHistoryRow {
    fn from(r: IntervalRecord) -> Self {
        Self {
            repo_id: r.repo_id,
            stars: r.count,
            interval: r.interval,
        }
    }
}

/// A repository whose crawl was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFailure {
    pub repo_id: i64,
    pub full_name: String,
    pub error: String,
    /// Final HTTP status, when the failure was a status error.
    pub status: Option<u16>,
}

/// Outcome of crawling a list of repositories.
///
/// Records from repositories that failed are not included; records from every
/// repository that finished are, even when the run was cancelled.
#[derive(Debug)]
pub struct CrawlReport<R> {
    pub records: Vec<R>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<RepoFailure>,
    pub cancelled: bool,
}

impl<R> Default for CrawlReport<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            attempted: 0,
            succeeded: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }
}

impl<R> CrawlReport<R> {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}
