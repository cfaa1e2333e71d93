//! GitHub API data types.
//!
//! Only the fields the crawler reads are modelled; serde ignores the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository as returned by the search endpoint.
///
/// Also the row shape of the population and sample CSV files, so field
/// names follow the API (`stargazers_count`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    #[serde(rename = "stargazers_count", default)]
    pub stars: u64,
}

impl Repository {
    /// The `owner` part of `owner/name`.
    pub fn owner(&self) -> &str {
        self.full_name
            .split_once('/')
            .map_or(self.full_name.as_str(), |(owner, _)| owner)
    }
}

/// An account reference embedded in issues and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
}

/// Issue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// An issue or pull request from the issues endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    /// Missing for issues opened by since-deleted accounts.
    #[serde(default)]
    pub user: Option<User>,
    /// Number of comments GitHub reports for the issue.
    #[serde(default)]
    pub comments: u64,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only when the item is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default)]
    pub author_association: String,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Title and body joined by a single space.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body.as_deref().unwrap_or_default())
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub author_association: String,
}

/// Author or committer identity on a commit.
#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub committer: Option<Signature>,
}

/// A commit from the commits endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
}

impl Commit {
    /// The author date, falling back to the committer date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let date = |sig: &Option<Signature>| sig.as_ref().and_then(|s| s.date);
        date(&self.commit.author).or_else(|| date(&self.commit.committer))
    }
}

/// One item of the REST stargazers endpoint with the star media type.
#[derive(Debug, Clone, Deserialize)]
pub struct Stargazer {
    pub starred_at: DateTime<Utc>,
}

/// Envelope of the repository search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    /// GitHub's error classification, e.g. `NOT_FOUND` or `RATE_LIMITED`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl GraphQlError {
    /// Errors that another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind.as_deref(),
            Some("NOT_FOUND" | "FORBIDDEN" | "UNPROCESSABLE" | "INVALID_CURSOR_ARGUMENTS")
        )
    }
}

/// `data` of the stargazers query.
#[derive(Debug, Clone, Deserialize)]
pub struct StargazersData {
    pub repository: Option<StargazersRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StargazersRepository {
    pub stargazers: StargazerConnection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StargazerConnection {
    #[serde(default)]
    pub edges: Vec<StargazerEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StargazerEdge {
    pub starred_at: DateTime<Utc>,
    #[serde(default)]
    pub node: Option<StargazerNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StargazerNode {
    pub login: String,
}

/// Relay-style cursor information.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}
