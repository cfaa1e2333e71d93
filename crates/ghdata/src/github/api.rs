//! Endpoint operations used by the crawler.

use serde_json::json;

use super::client::{GitHubClient, JSON_MEDIA_TYPE};
use super::error::FetchError;
use super::query::{STARGAZERS_QUERY, SearchRequest, collaborator_route};
use super::types::{PageInfo, Repository, SearchPage, StargazersData};

/// One page of the GraphQL stargazer connection, reduced to what the crawler
/// needs.
#[derive(Debug, Clone, Default)]
pub struct StarPage {
    pub starred_at: Vec<chrono::DateTime<chrono::Utc>>,
    pub page_info: PageInfo,
}

impl GitHubClient {
    /// Run one page of a repository search.
    pub async fn search_repositories(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchPage<Repository>, FetchError> {
        self.fetch(&request.route(), JSON_MEDIA_TYPE).await
    }

    /// GraphQL stargazers, oldest first, starting after `cursor`.
    ///
    /// A repository that resolves to `null` is reported as a permanent
    /// GraphQL error.
    pub async fn stargazers_after(
        &self,
        owner: &str,
        name: &str,
        cursor: Option<&str>,
        first: u32,
    ) -> Result<StarPage, FetchError> {
        let variables = json!({
            "owner": owner,
            "name": name,
            "cursor": cursor,
            "first": first,
        });
        let data: StargazersData = self.graphql(STARGAZERS_QUERY, &variables).await?;
        let connection = data
            .repository
            .ok_or_else(|| FetchError::GraphQl {
                message: format!("repository {owner}/{name} not found"),
                retryable: false,
            })?
            .stargazers;

        Ok(StarPage {
            starred_at: connection.edges.into_iter().map(|e| e.starred_at).collect(),
            page_info: connection.page_info,
        })
    }

    /// Whether `login` is a collaborator on the repository.
    ///
    /// Only 204 means yes. GitHub answers 404 for non-collaborators and 403
    /// when the token cannot see the collaborator list; both read as no.
    pub async fn is_collaborator(&self, full_name: &str, login: &str) -> Result<bool, FetchError> {
        let status = self.probe(&collaborator_route(full_name, login)).await?;
        if status != 204 {
            tracing::debug!("{} is not a collaborator on {} (HTTP {})", login, full_name, status);
        }
        Ok(status == 204)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::query::{Bound, RepoSearch, SortKey, SortOrder};
    use crate::http::{HttpMethod, HttpResponse, MockTransport};
    use crate::retry::RetryConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(mock: &Arc<MockTransport>) -> GitHubClient {
        GitHubClient::new(mock.clone(), "t").with_retry(RetryConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            2,
        ))
    }

    #[tokio::test]
    async fn search_repositories_decodes_envelope() {
        let mock = Arc::new(MockTransport::new());
        let request = SearchRequest::new(RepoSearch::new().stars(Bound::AtLeast(100)))
            .sort(SortKey::Stars, SortOrder::Asc);
        mock.push_json(
            format!("https://api.github.com{}", request.route()),
            200,
            serde_json::json!({
                "total_count": 2,
                "incomplete_results": true,
                "items": [
                    {"id": 1, "name": "a", "full_name": "o/a", "stargazers_count": 100},
                    {"id": 2, "name": "b", "full_name": "o/b", "stargazers_count": 120}
                ]
            }),
        );

        let page = client(&mock)
            .search_repositories(&request)
            .await
            .expect("search");
        assert_eq!(page.total_count, 2);
        assert!(page.incomplete_results);
        assert_eq!(page.items[1].full_name, "o/b");
    }

    #[tokio::test]
    async fn stargazers_after_reads_connection() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(
            HttpMethod::Post,
            "https://api.github.com/graphql",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: serde_json::json!({"data": {"repository": {"stargazers": {
                    "edges": [
                        {"starredAt": "2016-01-02T00:00:00Z", "node": {"login": "a"}},
                        {"starredAt": "2016-01-09T00:00:00Z", "node": {"login": "b"}}
                    ],
                    "pageInfo": {"endCursor": "c2", "hasNextPage": false}
                }}}})
                .to_string()
                .into_bytes(),
            },
        );

        let page = client(&mock)
            .stargazers_after("o", "r", Some("c1"), 100)
            .await
            .expect("page");
        assert_eq!(page.starred_at.len(), 2);
        assert!(!page.page_info.has_next_page);

        let body: serde_json::Value =
            serde_json::from_slice(&mock.requests()[0].body).expect("body");
        assert_eq!(body["variables"]["cursor"], "c1");
        assert_eq!(body["variables"]["first"], 100);
    }

    #[tokio::test]
    async fn stargazers_after_missing_repository_is_permanent() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(
            HttpMethod::Post,
            "https://api.github.com/graphql",
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: br#"{"data": {"repository": null}}"#.to_vec(),
            },
        );

        let err = client(&mock)
            .stargazers_after("o", "gone", None, 100)
            .await
            .expect_err("missing");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn is_collaborator_maps_statuses() {
        let mock = Arc::new(MockTransport::new());
        let empty = |status| HttpResponse {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        };
        mock.push_response(
            HttpMethod::Get,
            "https://api.github.com/repos/o/r/collaborators/yes",
            empty(204),
        );
        mock.push_response(
            HttpMethod::Get,
            "https://api.github.com/repos/o/r/collaborators/no",
            empty(404),
        );
        mock.push_response(
            HttpMethod::Get,
            "https://api.github.com/repos/o/r/collaborators/hidden",
            empty(403),
        );

        let client = client(&mock);
        assert!(client.is_collaborator("o/r", "yes").await.expect("204"));
        assert!(!client.is_collaborator("o/r", "no").await.expect("404"));
        assert!(!client.is_collaborator("o/r", "hidden").await.expect("403"));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn is_collaborator_retries_rate_limited_403() {
        let mock = Arc::new(MockTransport::new());
        let url = "https://api.github.com/repos/o/r/collaborators/busy";
        mock.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 403,
                headers: vec![("x-ratelimit-remaining".to_string(), "0".to_string())],
                body: Vec::new(),
            },
        );
        mock.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 204,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        assert!(client(&mock).is_collaborator("o/r", "busy").await.expect("retried"));
        assert_eq!(mock.request_count(), 2);
    }
}
