//! Immutable request values and route builders.
//!
//! Every request is described by a plain value constructed once and rendered
//! to a route (path plus query string, relative to the API base URL). Retries
//! and pagination re-render the same value with a different page number, so
//! nothing is mutated between attempts.

use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Default page size for every paginated endpoint.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// A search qualifier value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound<T> {
    AtLeast(T),
    Above(T),
    AtMost(T),
    Below(T),
    Exactly(T),
    Between(T, T),
}

impl<T: fmt::Display> fmt::Display for Bound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(v) => write!(f, ">={v}"),
            Self::Above(v) => write!(f, ">{v}"),
            Self::AtMost(v) => write!(f, "<={v}"),
            Self::Below(v) => write!(f, "<{v}"),
            Self::Exactly(v) => write!(f, "{v}"),
            Self::Between(a, b) => write!(f, "{a}..{b}"),
        }
    }
}

/// `is:` qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// A repository search query.
///
/// Builder methods consume and return `self`; the value is never mutated
/// after it is handed to a request.
///
/// ```ignore
/// let search = RepoSearch::new()
///     .term("library")
///     .stars(Bound::AtLeast(100))
///     .visibility(Visibility::Public)
///     .mirror(false);
/// assert_eq!(search.to_query(), "library+stars:%3E%3D100+is:public+mirror:false");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoSearch {
    term: Option<String>,
    created: Option<Bound<NaiveDate>>,
    pushed: Option<Bound<NaiveDate>>,
    stars: Option<Bound<u64>>,
    visibility: Option<Visibility>,
    fork: Option<bool>,
    mirror: Option<bool>,
    template: Option<bool>,
}

impl RepoSearch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    #[must_use]
    pub fn created(mut self, bound: Bound<NaiveDate>) -> Self {
        self.created = Some(bound);
        self
    }

    #[must_use]
    pub fn pushed(mut self, bound: Bound<NaiveDate>) -> Self {
        self.pushed = Some(bound);
        self
    }

    #[must_use]
    pub fn stars(mut self, bound: Bound<u64>) -> Self {
        self.stars = Some(bound);
        self
    }

    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = Some(fork);
        self
    }

    #[must_use]
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = Some(mirror);
        self
    }

    #[must_use]
    pub fn template(mut self, template: bool) -> Self {
        self.template = Some(template);
        self
    }

    pub fn stars_bound(&self) -> Option<Bound<u64>> {
        self.stars
    }

    /// Render the `q` parameter: free text first, then qualifiers in a fixed
    /// order, joined by `+`.
    pub fn to_query(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(term) = &self.term {
            parts.push(urlencoding::encode(term).into_owned());
        }

        let mut qualifier = |key: &str, value: String| {
            parts.push(format!("{key}:{}", urlencoding::encode(&value)));
        };

        if let Some(b) = &self.created {
            qualifier("created", b.to_string());
        }
        if let Some(b) = &self.pushed {
            qualifier("pushed", b.to_string());
        }
        if let Some(b) = &self.stars {
            qualifier("stars", b.to_string());
        }
        if let Some(v) = self.visibility {
            qualifier("is", v.as_str().to_string());
        }
        if let Some(v) = self.fork {
            qualifier("fork", v.to_string());
        }
        if let Some(v) = self.mirror {
            qualifier("mirror", v.to_string());
        }
        if let Some(v) = self.template {
            qualifier("template", v.to_string());
        }

        parts.join("+")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Stars,
    Forks,
    Updated,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Forks => "forks",
            Self::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One page of a repository search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub search: RepoSearch,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub per_page: u32,
    pub page: u32,
}

impl SearchRequest {
    pub fn new(search: RepoSearch) -> Self {
        Self {
            search,
            sort: None,
            order: None,
            per_page: DEFAULT_PER_PAGE,
            page: 1,
        }
    }

    #[must_use]
    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort = Some(key);
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn route(&self) -> String {
        let mut route = format!(
            "/search/repositories?q={}&per_page={}&page={}",
            self.search.to_query(),
            self.per_page,
            self.page
        );
        if let Some(sort) = self.sort {
            route.push_str(&format!("&sort={}", sort.as_str()));
            if let Some(order) = self.order {
                route.push_str(&format!("&order={}", order.as_str()));
            }
        }
        route
    }
}

/// `state` filter of the issues endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStateFilter {
    Open,
    Closed,
    All,
}

impl IssueStateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

/// Parameters of the issues-for-repository endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub state: IssueStateFilter,
    pub per_page: u32,
}

impl Default for IssueQuery {
    fn default() -> Self {
        Self {
            state: IssueStateFilter::Closed,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl IssueQuery {
    pub fn route(&self, full_name: &str, page: u32) -> String {
        format!(
            "/repos/{full_name}/issues?state={}&per_page={}&page={page}",
            self.state.as_str(),
            self.per_page
        )
    }
}

/// Parameters of the commits-for-repository endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub per_page: u32,
}

impl Default for CommitQuery {
    fn default() -> Self {
        Self {
            since: None,
            until: None,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl CommitQuery {
    pub fn route(&self, full_name: &str, page: u32) -> String {
        let mut params = Vec::with_capacity(4);
        if let Some(since) = self.since {
            params.push(format!("since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(until) = self.until {
            params.push(format!("until={}", until.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        params.push(format!("per_page={}", self.per_page));
        params.push(format!("page={page}"));
        format!("/repos/{full_name}/commits?{}", params.join("&"))
    }
}

pub fn comments_route(full_name: &str, issue_number: u64, per_page: u32, page: u32) -> String {
    format!("/repos/{full_name}/issues/{issue_number}/comments?per_page={per_page}&page={page}")
}

pub fn stargazers_route(full_name: &str, per_page: u32, page: u32) -> String {
    format!("/repos/{full_name}/stargazers?per_page={per_page}&page={page}")
}

pub fn collaborator_route(full_name: &str, login: &str) -> String {
    format!("/repos/{full_name}/collaborators/{login}")
}

/// Cursor-paginated stargazers query, oldest first.
pub const STARGAZERS_QUERY: &str = r#"
query ($owner: String!, $name: String!, $cursor: String, $first: Int!) {
  repository(owner: $owner, name: $name) {
    stargazers(first: $first, after: $cursor, orderBy: {field: STARRED_AT, direction: ASC}) {
      edges {
        starredAt
        node {
          login
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn bound_rendering() {
        assert_eq!(Bound::AtLeast(100u64).to_string(), ">=100");
        assert_eq!(Bound::Above(5u64).to_string(), ">5");
        assert_eq!(Bound::AtMost(date(2019, 9, 30)).to_string(), "<=2019-09-30");
        assert_eq!(Bound::Below(7u64).to_string(), "<7");
        assert_eq!(Bound::Exactly(3u64).to_string(), "3");
        assert_eq!(Bound::Between(10u64, 20u64).to_string(), "10..20");
    }

    #[test]
    fn repo_search_renders_in_fixed_order() {
        let search = RepoSearch::new()
            .template(false)
            .mirror(false)
            .visibility(Visibility::Public)
            .stars(Bound::AtLeast(100))
            .created(Bound::AtMost(date(2019, 9, 30)))
            .term("library");
        assert_eq!(
            search.to_query(),
            "library+created:%3C%3D2019-09-30+stars:%3E%3D100+is:public+mirror:false+template:false"
        );
    }

    #[test]
    fn repo_search_is_a_value() {
        let base = RepoSearch::new().term("library");
        let narrowed = base.clone().stars(Bound::AtLeast(500));
        assert_eq!(base.to_query(), "library");
        assert_ne!(base, narrowed);
    }

    #[test]
    fn search_request_route_includes_sort_and_paging() {
        let req = SearchRequest::new(RepoSearch::new().term("cli"))
            .sort(SortKey::Stars, SortOrder::Asc)
            .page(3);
        assert_eq!(
            req.route(),
            "/search/repositories?q=cli&per_page=100&page=3&sort=stars&order=asc"
        );
    }

    #[test]
    fn issue_query_route() {
        let query = IssueQuery::default();
        assert_eq!(
            query.route("octo/repo", 2),
            "/repos/octo/repo/issues?state=closed&per_page=100&page=2"
        );
        let all = IssueQuery {
            state: IssueStateFilter::All,
            per_page: 30,
        };
        assert_eq!(
            all.route("octo/repo", 1),
            "/repos/octo/repo/issues?state=all&per_page=30&page=1"
        );
    }

    #[test]
    fn commit_query_route_separates_every_parameter() {
        let query = CommitQuery {
            since: Some(Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 59).unwrap()),
            per_page: 100,
        };
        assert_eq!(
            query.route("octo/repo", 1),
            "/repos/octo/repo/commits?since=2016-01-01T00:00:00Z&until=2019-12-31T23:59:59Z&per_page=100&page=1"
        );
    }

    #[test]
    fn simple_routes() {
        assert_eq!(
            comments_route("o/r", 7, 100, 1),
            "/repos/o/r/issues/7/comments?per_page=100&page=1"
        );
        assert_eq!(stargazers_route("o/r", 100, 4), "/repos/o/r/stargazers?per_page=100&page=4");
        assert_eq!(collaborator_route("o/r", "bob"), "/repos/o/r/collaborators/bob");
    }
}
