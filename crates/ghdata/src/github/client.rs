//! GitHub API client: headers, pacing, retry, cancellation and decoding.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::error::FetchError;
use super::types::GraphQlResponse;
use crate::crawl::progress::ProgressCallback;
use crate::http::reqwest_transport::{DEFAULT_TIMEOUT, ReqwestTransport};
use crate::http::{HttpError, HttpHeaders, HttpRequest, HttpResponse, HttpTransport};
use crate::rate_limit::{ApiRateLimiter, quotas};
use crate::retry::{RetryConfig, with_retry};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Default media type for REST responses.
pub const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
/// Media type that adds `starred_at` to stargazer listings.
pub const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";
pub const API_VERSION: &str = "2022-11-28";
pub const DEFAULT_USER_AGENT: &str = concat!("ghdata/", env!("CARGO_PKG_VERSION"));

/// Everything needed to build a [`GitHubClient`], resolved once at start-up.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token: String,
    pub api_url: String,
    pub graphql_url: String,
    pub user_agent: String,
    /// Per-request timeout of the HTTP transport.
    pub timeout: Duration,
    pub requests_per_hour: u32,
    pub safety_margin: u32,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            requests_per_hour: quotas::GITHUB_REQUESTS_PER_HOUR,
            safety_margin: quotas::GITHUB_SAFETY_MARGIN_PER_HOUR,
            retry: RetryConfig::default(),
        }
    }
}

/// A read-only GitHub client.
///
/// Cheap to clone; clones share the transport, the rate limiter and the
/// cancellation token, so one client can be handed to every worker.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    token: Arc<str>,
    api_url: Arc<str>,
    graphql_url: Arc<str>,
    user_agent: Arc<str>,
    retry: RetryConfig,
    rate_limiter: Option<ApiRateLimiter>,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("graphql_url", &self.graphql_url)
            .field("retry", &self.retry)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client over an arbitrary transport, with default URLs and
    /// retry policy and no rate limiter.
    pub fn new(transport: Arc<dyn HttpTransport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            token: Arc::from(token.into()),
            api_url: Arc::from(DEFAULT_API_URL),
            graphql_url: Arc::from(DEFAULT_GRAPHQL_URL),
            user_agent: Arc::from(DEFAULT_USER_AGENT),
            retry: RetryConfig::default(),
            rate_limiter: None,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    /// Create a production client: reqwest transport with the configured
    /// timeout and a limiter sized to the hourly quota.
    pub fn from_config(config: &ClientConfig) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_timeout(config.timeout)?;
        Ok(Self::new(Arc::new(transport), config.token.clone())
            .with_api_url(&config.api_url)
            .with_graphql_url(&config.graphql_url)
            .with_user_agent(&config.user_agent)
            .with_retry(config.retry.clone())
            .with_rate_limiter(Some(ApiRateLimiter::per_hour(
                config.requests_per_hour,
                config.safety_margin,
            ))))
    }

    #[must_use]
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = Arc::from(url.trim_end_matches('/'));
        self
    }

    #[must_use]
    pub fn with_graphql_url(mut self, url: &str) -> Self {
        self.graphql_url = Arc::from(url);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Arc::from(user_agent);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Option<ApiRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Share a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_ref()
    }

    /// Resolve a route against the API base URL. Absolute URLs pass through.
    pub fn url_for(&self, route: &str) -> String {
        if route.starts_with("http://") || route.starts_with("https://") {
            route.to_string()
        } else {
            format!("{}{}", self.api_url, route)
        }
    }

    fn headers(&self, accept: &str) -> HttpHeaders {
        vec![
            ("Accept".to_string(), accept.to_string()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.token),
            ),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
            ("User-Agent".to_string(), self.user_agent.to_string()),
        ]
    }

    /// One paced request with no status interpretation.
    async fn send_raw(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }
        Ok(self.transport.send(request.clone()).await?)
    }

    /// One paced request; non-2xx statuses become errors.
    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let response = self.send_raw(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(FetchError::from_status(
                response.status,
                request.url.clone(),
                &response.headers,
            ))
        }
    }

    /// Run `request` through the retry policy, interpreting each response with
    /// `handle`. Cancellation wins over an in-flight attempt or backoff sleep.
    async fn execute<T, H>(&self, request: HttpRequest, handle: H) -> Result<T, FetchError>
    where
        H: Fn(HttpResponse, &str) -> Result<T, FetchError>,
    {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let request = &request;
        let handle = &handle;
        let target = request.url.as_str();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            result = with_retry(
                &self.retry,
                || async move {
                    let response = self.send_once(request).await?;
                    handle(response, &request.url)
                },
                target,
                self.on_progress.as_ref(),
            ) => result,
        }
    }

    /// GET `route` and decode the JSON body.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        route: &str,
        accept: &str,
    ) -> Result<T, FetchError> {
        let url = self.url_for(route);
        tracing::debug!("GET {}", url);
        let request = HttpRequest::get(url, self.headers(accept));
        self.execute(request, |response, url| decode(&response.body, url))
            .await
    }

    /// POST a GraphQL query and decode its `data`.
    ///
    /// A populated `errors` array is a failure even on HTTP 200; it is retried
    /// unless every error is of a permanent kind.
    pub async fn graphql<V, T>(&self, query: &str, variables: &V) -> Result<T, FetchError>
    where
        V: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.graphql_url.to_string();
        let body = serde_json::to_vec(&GraphQlRequest { query, variables }).map_err(|source| {
            FetchError::Decode {
                url: url.clone(),
                source,
            }
        })?;

        tracing::debug!("POST {}", url);
        let request = HttpRequest::post(url, self.headers(JSON_MEDIA_TYPE), body);
        self.execute(request, |response, url| {
            let envelope: GraphQlResponse<T> = decode(&response.body, url)?;
            if !envelope.errors.is_empty() {
                let retryable = !envelope.errors.iter().all(|e| e.is_permanent());
                let message = envelope
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(FetchError::GraphQl { message, retryable });
            }
            envelope.data.ok_or_else(|| FetchError::GraphQl {
                message: "response contained neither data nor errors".to_string(),
                retryable: true,
            })
        })
        .await
    }

    /// GET `route` and return only the status code.
    ///
    /// Transient statuses are retried like any other request; every other
    /// status, success or not, is returned to the caller.
    pub async fn probe(&self, route: &str) -> Result<u16, FetchError> {
        let url = self.url_for(route);
        tracing::debug!("GET {} (status only)", url);
        let request = HttpRequest::get(url, self.headers(JSON_MEDIA_TYPE));

        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let request = &request;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            result = with_retry(
                &self.retry,
                || async move {
                    let response = self.send_raw(request).await?;
                    if response.is_success() {
                        return Ok(response.status);
                    }
                    let err = FetchError::from_status(
                        response.status,
                        request.url.clone(),
                        &response.headers,
                    );
                    if err.is_retryable() {
                        Err(err)
                    } else {
                        Ok(response.status)
                    }
                },
                &request.url,
                self.on_progress.as_ref(),
            ) => result,
        }
    }
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V: ?Sized> {
    query: &'a str,
    variables: &'a V,
}

fn decode<T: DeserializeOwned>(body: &[u8], url: &str) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}
