//! ghdata - longitudinal datasets of GitHub repository activity.
//!
//! This library samples a repository population reproducibly, crawls issues,
//! comments, commits and stargazers through a rate-limited, retrying client,
//! and folds event timestamps into weekly interval series.
//!
//! # Example
//!
//! ```ignore
//! use ghdata::crawl::{CrawlOptions, crawl_stars};
//! use ghdata::dataset::{read_sampled_repositories, write_records};
//! use ghdata::github::{ClientConfig, GitHubClient};
//! use ghdata::sample::{Seed, sample};
//!
//! let client = GitHubClient::from_config(&ClientConfig::new(token))?;
//! let set = sample(500, 13_611, Seed::DATASET)?;
//! let repos = read_sampled_repositories("repos.csv".as_ref(), &set)?;
//! let report = crawl_stars(&client, &repos, &CrawlOptions::default()).await;
//! write_records("stars.csv".as_ref(), &report.records)?;
//! ```

pub mod crawl;
pub mod dataset;
pub mod error;
pub mod github;
pub mod http;
pub mod interval;
pub mod rate_limit;
pub mod retry;
pub mod sample;

pub use crawl::{CrawlOptions, CrawlProgress, CrawlReport, ProgressCallback};
pub use dataset::DatasetError;
pub use error::CrawlError;
pub use github::{ClientConfig, FetchError, GitHubClient, Repository};
pub use http::{HttpError, HttpTransport};
pub use interval::{DateRange, Epoch};
pub use rate_limit::ApiRateLimiter;
pub use retry::RetryConfig;
pub use sample::{SampleError, SampleIndexSet, Seed};
