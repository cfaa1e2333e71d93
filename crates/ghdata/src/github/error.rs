//! GitHub fetch error taxonomy.

use thiserror::Error;

use crate::http::{HttpError, HttpHeaders, header_get};

/// Errors produced while fetching from the GitHub API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),

    /// Non-2xx response.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Whether the status signals a transient condition.
        retryable: bool,
    },

    /// GraphQL `errors` array in an otherwise successful response.
    #[error("GraphQL error: {message}")]
    GraphQl { message: String, retryable: bool },

    /// The body did not match the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every attempt failed with a transient error.
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    /// The page ceiling was hit, or the server kept echoing the same cursor.
    #[error("pagination for {target} stopped after {max_pages} pages")]
    PaginationExhausted { target: String, max_pages: u32 },

    /// The crawl was cancelled while this request was outstanding.
    #[error("operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// Build an HTTP status error, classifying it from the response headers.
    pub fn from_status(status: u16, url: impl Into<String>, headers: &HttpHeaders) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            retryable: is_retryable_status(status, headers),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::HttpStatus { retryable, .. } | Self::GraphQl { retryable, .. } => *retryable,
            Self::Decode { .. }
            | Self::RetriesExhausted { .. }
            | Self::PaginationExhausted { .. }
            | Self::Cancelled => false,
        }
    }

    /// The HTTP status behind this error, looking through retry wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Classify a non-2xx status.
///
/// Server errors, 408 and 429 are transient. GitHub also answers 403 when a
/// primary or secondary rate limit is hit; that case is recognised by an
/// exhausted `x-ratelimit-remaining` or a `retry-after` header. Every other
/// client error (404, 410, 422, plain 403, ...) is permanent.
pub fn is_retryable_status(status: u16, headers: &HttpHeaders) -> bool {
    match status {
        500..=599 | 408 | 429 => true,
        403 => {
            header_get(headers, "retry-after").is_some()
                || header_get(headers, "x-ratelimit-remaining").is_some_and(|v| v.trim() == "0")
        }
        _ => false,
    }
}

/// Take the first line of an error message for compact log output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}
