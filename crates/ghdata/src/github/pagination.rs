//! Offset and cursor pagination over GitHub endpoints.
//!
//! A paginator is a lazy, finite, non-restartable sequence of pages. Once it
//! has finished or failed, [`OffsetPages::next_page`] and
//! [`CursorPages::next_page`] keep returning `Ok(None)`.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::client::{GitHubClient, JSON_MEDIA_TYPE, STAR_MEDIA_TYPE};
use super::error::FetchError;
use super::query::{CommitQuery, IssueQuery, comments_route, stargazers_route};
use super::types::{Comment, Commit, Issue, Stargazer};
use crate::crawl::progress::{CrawlProgress, ProgressCallback, emit};

pub use super::query::DEFAULT_PER_PAGE;

/// Ceiling on pages fetched by a single paginator.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// A source addressed by page number (1-based).
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, page: u32) -> Result<Vec<Self::Item>, FetchError>;

    /// Name used in progress events and errors.
    fn target(&self) -> &str;
}

/// One page of a cursor-addressed source.
#[derive(Debug, Clone)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// A source addressed by an opaque continuation token.
#[async_trait]
pub trait CursorSource: Send + Sync {
    type Item: Send;

    async fn fetch_after(
        &self,
        cursor: Option<&str>,
    ) -> Result<CursorPage<Self::Item>, FetchError>;

    fn target(&self) -> &str;
}

/// REST page source built from a route function.
pub struct RoutePages<T> {
    client: GitHubClient,
    target: String,
    accept: &'static str,
    route_fn: Box<dyn Fn(u32) -> String + Send + Sync>,
    _item: PhantomData<fn() -> T>,
}

impl<T> RoutePages<T> {
    pub fn new(
        client: GitHubClient,
        target: impl Into<String>,
        route_fn: impl Fn(u32) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            client,
            target: target.into(),
            accept: JSON_MEDIA_TYPE,
            route_fn: Box::new(route_fn),
            _item: PhantomData,
        }
    }

    #[must_use]
    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = accept;
        self
    }
}

impl RoutePages<Issue> {
    pub fn issues(client: GitHubClient, full_name: &str, query: IssueQuery) -> Self {
        let repo = full_name.to_string();
        Self::new(client, format!("{full_name} issues"), move |page| {
            query.route(&repo, page)
        })
    }
}

impl RoutePages<Comment> {
    pub fn comments(
        client: GitHubClient,
        full_name: &str,
        issue_number: u64,
        per_page: u32,
    ) -> Self {
        let repo = full_name.to_string();
        Self::new(
            client,
            format!("{full_name}#{issue_number} comments"),
            move |page| comments_route(&repo, issue_number, per_page, page),
        )
    }
}

impl RoutePages<Commit> {
    pub fn commits(client: GitHubClient, full_name: &str, query: CommitQuery) -> Self {
        let repo = full_name.to_string();
        Self::new(client, format!("{full_name} commits"), move |page| {
            query.route(&repo, page)
        })
    }
}

impl RoutePages<Stargazer> {
    pub fn stargazers(client: GitHubClient, full_name: &str, per_page: u32) -> Self {
        let repo = full_name.to_string();
        Self::new(client, format!("{full_name} stargazers"), move |page| {
            stargazers_route(&repo, per_page, page)
        })
        .with_accept(STAR_MEDIA_TYPE)
    }
}

#[async_trait]
impl<T> PageSource for RoutePages<T>
where
    T: DeserializeOwned + Send,
{
    type Item = T;

    async fn fetch_page(&self, page: u32) -> Result<Vec<T>, FetchError> {
        let route = (self.route_fn)(page);
        self.client.fetch(&route, self.accept).await
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// GraphQL stargazer timestamps, oldest first.
pub struct StargazerCursor {
    client: GitHubClient,
    owner: String,
    name: String,
    first: u32,
    target: String,
}

impl StargazerCursor {
    pub fn new(client: GitHubClient, owner: &str, name: &str, first: u32) -> Self {
        Self {
            client,
            owner: owner.to_string(),
            name: name.to_string(),
            first,
            target: format!("{owner}/{name} stargazers"),
        }
    }
}

#[async_trait]
impl CursorSource for StargazerCursor {
    type Item = DateTime<Utc>;

    async fn fetch_after(
        &self,
        cursor: Option<&str>,
    ) -> Result<CursorPage<DateTime<Utc>>, FetchError> {
        let page = self
            .client
            .stargazers_after(&self.owner, &self.name, cursor, self.first)
            .await?;
        Ok(CursorPage {
            items: page.starred_at,
            end_cursor: page.page_info.end_cursor,
            has_next_page: page.page_info.has_next_page,
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Offset pagination: pages 1, 2, ... until an empty page.
pub struct OffsetPages<S: PageSource> {
    source: S,
    next: u32,
    max_pages: u32,
    done: bool,
    on_progress: Option<ProgressCallback>,
}

impl<S: PageSource> OffsetPages<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            next: 1,
            max_pages: DEFAULT_MAX_PAGES,
            done: false,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Fetch the next non-empty page, or `None` at the end of data.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, FetchError> {
        if self.done {
            return Ok(None);
        }
        if self.next > self.max_pages {
            self.done = true;
            return Err(FetchError::PaginationExhausted {
                target: self.source.target().to_string(),
                max_pages: self.max_pages,
            });
        }

        let page = self.next;
        let items = match self.source.fetch_page(page).await {
            Ok(items) => items,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        if items.is_empty() {
            self.done = true;
            return Ok(None);
        }

        tracing::debug!(
            "Fetched page {} of {} ({} items)",
            page,
            self.source.target(),
            items.len()
        );
        emit(
            self.on_progress.as_ref(),
            CrawlProgress::FetchedPage {
                target: self.source.target().to_string(),
                page,
                count: items.len(),
            },
        );
        self.next += 1;
        Ok(Some(items))
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, FetchError> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }
}

/// Cursor pagination: follows `end_cursor` until `has_next_page` is false.
pub struct CursorPages<S: CursorSource> {
    source: S,
    cursor: Option<String>,
    fetched: u32,
    max_pages: u32,
    done: bool,
    on_progress: Option<ProgressCallback>,
}

impl<S: CursorSource> CursorPages<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: None,
            fetched: 0,
            max_pages: DEFAULT_MAX_PAGES,
            done: false,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Fetch the next page, or `None` once the server reported no more.
    ///
    /// An empty page with `has_next_page` set is still followed.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, FetchError> {
        if self.done {
            return Ok(None);
        }
        if self.fetched >= self.max_pages {
            self.done = true;
            return Err(self.exhausted());
        }

        let page = match self.source.fetch_after(self.cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        self.fetched += 1;

        emit(
            self.on_progress.as_ref(),
            CrawlProgress::FetchedPage {
                target: self.source.target().to_string(),
                page: self.fetched,
                count: page.items.len(),
            },
        );

        if !page.has_next_page {
            self.done = true;
            return Ok(Some(page.items));
        }

        match page.end_cursor {
            Some(next) if self.cursor.as_deref() != Some(next.as_str()) => {
                self.cursor = Some(next);
                Ok(Some(page.items))
            }
            _ => {
                self.done = true;
                Err(self.exhausted())
            }
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, FetchError> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }

    fn exhausted(&self) -> FetchError {
        FetchError::PaginationExhausted {
            target: self.source.target().to_string(),
            max_pages: self.fetched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{MockTransport, header_get};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// `full` pages of `per_page` items, then empty pages forever.
    struct FakeOffset {
        full: u32,
        per_page: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for FakeOffset {
        type Item = u32;

        async fn fetch_page(&self, page: u32) -> Result<Vec<u32>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if page > self.full {
                return Ok(Vec::new());
            }
            let start = (page - 1) * self.per_page;
            Ok((start..start + self.per_page).collect())
        }

        fn target(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn offset_pages_stop_on_first_empty_page() {
        let source = FakeOffset {
            full: 3,
            per_page: 100,
            calls: AtomicU32::new(0),
        };
        let mut pages = OffsetPages::new(source);
        let mut items = Vec::new();
        while let Some(page) = pages.next_page().await.expect("page") {
            items.extend(page);
        }
        assert_eq!(items.len(), 300);
        assert_eq!(items, (0..300).collect::<Vec<_>>());
        assert_eq!(pages.source.calls.load(Ordering::SeqCst), 4);

        // Finished paginators stay finished.
        assert!(pages.next_page().await.expect("done").is_none());
        assert_eq!(pages.source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn offset_pages_hit_the_ceiling() {
        let source = FakeOffset {
            full: u32::MAX,
            per_page: 1,
            calls: AtomicU32::new(0),
        };
        let err = OffsetPages::new(source)
            .with_max_pages(5)
            .collect_all()
            .await
            .expect_err("never ends");
        assert!(matches!(
            err,
            FetchError::PaginationExhausted { max_pages: 5, .. }
        ));
    }

    #[tokio::test]
    async fn offset_pages_emit_progress() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_capture = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |event| {
            if let CrawlProgress::FetchedPage { .. } = event {
                seen_capture.fetch_add(1, Ordering::SeqCst);
            }
        });
        let source = FakeOffset {
            full: 2,
            per_page: 10,
            calls: AtomicU32::new(0),
        };
        let items = OffsetPages::new(source)
            .with_progress(Some(callback))
            .collect_all()
            .await
            .expect("items");
        assert_eq!(items.len(), 20);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    /// Scripted cursor pages.
    struct FakeCursor {
        pages: Vec<CursorPage<u32>>,
        calls: AtomicU32,
        seen: std::sync::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl CursorSource for FakeCursor {
        type Item = u32;

        async fn fetch_after(&self, cursor: Option<&str>) -> Result<CursorPage<u32>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(cursor.map(str::to_string));
            Ok(self.pages[n.min(self.pages.len() - 1)].clone())
        }

        fn target(&self) -> &str {
            "cursor"
        }
    }

    fn page(items: Vec<u32>, cursor: Option<&str>, more: bool) -> CursorPage<u32> {
        CursorPage {
            items,
            end_cursor: cursor.map(str::to_string),
            has_next_page: more,
        }
    }

    #[tokio::test]
    async fn cursor_pages_follow_has_next_page_not_empty_edges() {
        let source = FakeCursor {
            pages: vec![
                page(vec![1, 2], Some("a"), true),
                page(vec![], Some("b"), true),
                page(vec![3], Some("c"), false),
            ],
            calls: AtomicU32::new(0),
            seen: Default::default(),
        };
        let mut pages = CursorPages::new(source);
        let mut items = Vec::new();
        while let Some(page) = pages.next_page().await.expect("page") {
            items.extend(page);
        }
        assert_eq!(items, vec![1, 2, 3]);

        let seen = pages.source.seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn cursor_pages_detect_echoed_cursor() {
        let source = FakeCursor {
            pages: vec![page(vec![1], Some("same"), true)],
            calls: AtomicU32::new(0),
            seen: Default::default(),
        };
        let err = CursorPages::new(source)
            .collect_all()
            .await
            .expect_err("echo");
        assert!(matches!(err, FetchError::PaginationExhausted { .. }));
    }

    #[tokio::test]
    async fn cursor_pages_hit_the_ceiling() {
        let pages: Vec<_> = (0..10)
            .map(|i| page(vec![i], Some(format!("c{i}").as_str()), true))
            .collect();
        let source = FakeCursor {
            pages,
            calls: AtomicU32::new(0),
            seen: Default::default(),
        };
        let err = CursorPages::new(source)
            .with_max_pages(3)
            .collect_all()
            .await
            .expect_err("ceiling");
        assert!(matches!(
            err,
            FetchError::PaginationExhausted { max_pages: 3, .. }
        ));
    }

    #[tokio::test]
    async fn route_pages_drain_rest_endpoint() {
        let mock = Arc::new(MockTransport::new());
        let base = "https://api.github.com/repos/o/r/issues?state=closed&per_page=100&page=";
        let issue = |id: i64| {
            serde_json::json!({
                "id": id, "number": id, "title": "t", "body": "b",
                "user": {"id": 1, "login": "u"}, "comments": 0, "state": "closed",
                "created_at": "2017-01-01T00:00:00Z", "updated_at": "2017-01-02T00:00:00Z",
                "author_association": "NONE"
            })
        };
        mock.push_json(format!("{base}1"), 200, serde_json::json!([issue(1), issue(2)]));
        mock.push_json(format!("{base}2"), 200, serde_json::json!([issue(3)]));
        mock.push_json(format!("{base}3"), 200, serde_json::json!([]));

        let client = GitHubClient::new(mock.clone(), "t");
        let issues = OffsetPages::new(RoutePages::issues(client, "o/r", IssueQuery::default()))
            .collect_all()
            .await
            .expect("issues");
        assert_eq!(issues.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn stargazer_pages_request_star_media_type() {
        let mock = Arc::new(MockTransport::new());
        let base = "https://api.github.com/repos/o/r/stargazers?per_page=100&page=";
        mock.push_json(
            format!("{base}1"),
            200,
            serde_json::json!([{"starred_at": "2016-02-01T00:00:00Z", "user": {"login": "x"}}]),
        );
        mock.push_json(format!("{base}2"), 200, serde_json::json!([]));

        let client = GitHubClient::new(mock.clone(), "t");
        let stars = OffsetPages::new(RoutePages::stargazers(client, "o/r", 100))
            .collect_all()
            .await
            .expect("stargazers");
        assert_eq!(stars.len(), 1);
        assert_eq!(
            header_get(&mock.requests()[0].headers, "accept"),
            Some(STAR_MEDIA_TYPE)
        );
    }
}
