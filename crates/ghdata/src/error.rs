//! Top-level error for runs that cannot continue.

use thiserror::Error;

use crate::dataset::DatasetError;
use crate::github::error::FetchError;
use crate::http::HttpError;
use crate::sample::SampleError;

/// A failure that aborts a whole run, as opposed to one repository.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] HttpError),
}

impl CrawlError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}
