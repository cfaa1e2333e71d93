//! Configuration file support for ghdata.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `GHDATA_`, sections separated by
//!    `__`, e.g. `GHDATA_GITHUB__TOKEN`, `GHDATA_CRAWL__CONCURRENCY`)
//! 3. Local config file (`./ghdata.toml`)
//! 4. XDG config file (`~/.config/ghdata/config.toml`)
//! 5. Built-in defaults
//!
//! `GITHUB_TOKEN` is honoured when no token is configured anywhere else.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GHDATA_GITHUB__TOKEN / GITHUB_TOKEN
//! timeout_secs = 30
//! requests_per_hour = 5000
//! safety_margin = 36
//!
//! [retry]
//! min_delay_ms = 1000
//! max_delay_ms = 60000
//! max_attempts = 50
//! jitter = false
//!
//! [crawl]
//! start_year = 2016
//! end_year = 2019
//! commit_epoch_year = 2017
//! star_epoch_year = 2016
//! concurrency = 1
//! max_pages = 10000
//! data_dir = "data"
//!
//! [sample]
//! seed = "420,69"
//! size = 500
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use directories::ProjectDirs;
use ghdata::crawl::{CrawlOptions, DEFAULT_CONCURRENCY, DEFAULT_END_YEAR, DEFAULT_START_YEAR};
use ghdata::github::ClientConfig;
use ghdata::github::pagination::DEFAULT_MAX_PAGES;
use ghdata::interval::{COMMIT_EPOCH_YEAR, DateRange, Epoch, STAR_EPOCH_YEAR};
use ghdata::rate_limit::quotas;
use ghdata::retry::{DEFAULT_MAX_ATTEMPTS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};
use ghdata::{RetryConfig, Seed};
use serde::Deserialize;

/// Size of the published issue and comment samples.
pub const DEFAULT_SAMPLE_SIZE: usize = 500;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub retry: RetrySettings,
    pub crawl: CrawlSettings,
    pub sample: SampleSettings,
}

/// GitHub API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token. Can also be set via `GHDATA_GITHUB__TOKEN` or `GITHUB_TOKEN`.
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub graphql_url: Option<String>,
    pub timeout_secs: u64,
    pub requests_per_hour: u32,
    /// Requests per hour held back from the quota.
    pub safety_margin: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            graphql_url: None,
            timeout_secs: 30,
            requests_per_hour: quotas::GITHUB_REQUESTS_PER_HOUR,
            safety_margin: quotas::GITHUB_SAFETY_MARGIN_PER_HOUR,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            min_delay_ms: INITIAL_BACKOFF_MS,
            max_delay_ms: MAX_BACKOFF_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: false,
        }
    }
}

/// Default crawl options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub start_year: i32,
    pub end_year: i32,
    pub commit_epoch_year: i32,
    pub star_epoch_year: i32,
    pub concurrency: usize,
    pub max_pages: u32,
    /// Where relative input and output paths are resolved.
    pub data_dir: Option<PathBuf>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            start_year: DEFAULT_START_YEAR,
            end_year: DEFAULT_END_YEAR,
            commit_epoch_year: COMMIT_EPOCH_YEAR,
            star_epoch_year: STAR_EPOCH_YEAR,
            concurrency: DEFAULT_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
            data_dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SampleSettings {
    /// Two comma-separated integers.
    pub seed: String,
    pub size: usize,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            seed: Seed::DATASET.to_string(),
            size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// A configuration value that cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "no GitHub token configured; set GHDATA_GITHUB__TOKEN or GITHUB_TOKEN, or add [github] token to {}",
        config_path_hint()
    )]
    MissingToken,

    #[error("invalid year window {start}..={end}")]
    InvalidYears { start: i32, end: i32 },

    #[error("invalid epoch year {0}")]
    InvalidEpoch(i32),

    #[error("invalid [sample] seed: {0}")]
    InvalidSeed(#[from] ghdata::SampleError),
}

fn config_path_hint() -> String {
    Config::default_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "ghdata.toml".to_string())
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("ghdata.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./ghdata.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // GHDATA_CRAWL__START_YEAR -> crawl.start_year
        builder = builder.add_source(
            Environment::with_prefix("GHDATA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config = Self::from_builder(builder);
        if config.github.token.is_none()
            && let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            config.github.token = Some(token);
        }
        config
    }

    fn from_builder(builder: Builder<config::builder::DefaultState>) -> Self {
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// The token, or a configuration error naming where to put one.
    pub fn github_token(&self) -> Result<String, ConfigError> {
        self.github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.retry.min_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            self.retry.max_attempts,
        )
        .with_jitter(self.retry.jitter)
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut client = ClientConfig::new(self.github_token()?);
        if let Some(url) = &self.github.api_url {
            client.api_url = url.clone();
        }
        if let Some(url) = &self.github.graphql_url {
            client.graphql_url = url.clone();
        }
        client.timeout = Duration::from_secs(self.github.timeout_secs.max(1));
        client.requests_per_hour = self.github.requests_per_hour;
        client.safety_margin = self.github.safety_margin;
        client.retry = self.retry_config();
        Ok(client)
    }

    /// Crawl options for the configured windows and epochs.
    pub fn crawl_options(&self) -> Result<CrawlOptions, ConfigError> {
        let (start, end) = (self.crawl.start_year, self.crawl.end_year);
        if start > end {
            return Err(ConfigError::InvalidYears { start, end });
        }
        let window = DateRange::years(start, end).ok_or(ConfigError::InvalidYears { start, end })?;
        let epoch = |year| Epoch::start_of_year(year).ok_or(ConfigError::InvalidEpoch(year));

        let mut options = CrawlOptions::default().with_window(window);
        options.commit_epoch = epoch(self.crawl.commit_epoch_year)?;
        options.star_epoch = epoch(self.crawl.star_epoch_year)?;
        options.concurrency = self.crawl.concurrency.max(1);
        options.max_pages = self.crawl.max_pages.max(1);
        Ok(options)
    }

    pub fn seed(&self) -> Result<Seed, ConfigError> {
        Ok(self.sample.seed.parse()?)
    }

    /// Resolve a relative path against `crawl.data_dir`.
    pub fn resolve(&self, path: PathBuf) -> PathBuf {
        match &self.crawl.data_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ghdata").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Config::from_builder(
            ConfigBuilder::builder().add_source(config::File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.requests_per_hour, 5000);
        assert_eq!(config.github.safety_margin, 36);
        assert_eq!(config.retry.max_attempts, 50);
        assert!(!config.retry.jitter);
        assert_eq!(config.crawl.start_year, 2016);
        assert_eq!(config.crawl.end_year, 2019);
        assert_eq!(config.crawl.commit_epoch_year, 2017);
        assert_eq!(config.crawl.concurrency, 1);
        assert_eq!(config.sample.size, 500);
        assert_eq!(config.seed().unwrap(), Seed(420, 69));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = from_toml(
            r#"
            [crawl]
            concurrency = 4

            [github]
            token = "ghp_test123"
        "#,
        );
        assert_eq!(config.crawl.concurrency, 4);
        assert_eq!(config.crawl.max_pages, 10_000);
        assert_eq!(config.github_token().unwrap(), "ghp_test123");
        assert_eq!(config.github.timeout_secs, 30);
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        let config = Config::default();
        assert!(matches!(config.github_token(), Err(ConfigError::MissingToken)));
        assert!(config.client_config().is_err());

        let blank = from_toml("[github]\ntoken = \"  \"\n");
        assert!(blank.github_token().is_err());
    }

    #[test]
    fn test_client_config_carries_overrides() {
        let config = from_toml(
            r#"
            [github]
            token = "t"
            api_url = "http://localhost:8080"
            timeout_secs = 5

            [retry]
            min_delay_ms = 10
            max_delay_ms = 20
            max_attempts = 0
        "#,
        );
        let client = config.client_config().unwrap();
        assert_eq!(client.api_url, "http://localhost:8080");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.retry.min_delay, Duration::from_millis(10));
        assert_eq!(client.retry.max_attempts, 1);
    }

    #[test]
    fn test_crawl_options_from_years() {
        let config = from_toml("[crawl]\nstart_year = 2018\nend_year = 2018\n");
        let options = config.crawl_options().unwrap();
        assert_eq!(options.issue_window, DateRange::years(2018, 2018).unwrap());

        let reversed = from_toml("[crawl]\nstart_year = 2019\nend_year = 2016\n");
        assert!(matches!(
            reversed.crawl_options(),
            Err(ConfigError::InvalidYears { .. })
        ));
    }

    #[test]
    fn test_invalid_seed() {
        let config = from_toml("[sample]\nseed = \"nope\"\n");
        assert!(matches!(config.seed(), Err(ConfigError::InvalidSeed(_))));
    }

    #[test]
    fn test_resolve_against_data_dir() {
        let config = from_toml("[crawl]\ndata_dir = \"/srv/data\"\n");
        assert_eq!(
            config.resolve(PathBuf::from("repos.csv")),
            PathBuf::from("/srv/data/repos.csv")
        );
        assert_eq!(
            config.resolve(PathBuf::from("/tmp/x.csv")),
            PathBuf::from("/tmp/x.csv")
        );
        assert_eq!(
            Config::default().resolve(PathBuf::from("repos.csv")),
            PathBuf::from("repos.csv")
        );
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let config = from_toml("[crawl]\nunknown = 1\nconcurrency = 2\n");
        assert_eq!(config.crawl.concurrency, 2);
    }

    #[test]
    fn test_config_invalid_toml_falls_back_to_defaults() {
        let config = from_toml("[crawl\nconcurrency = ");
        assert_eq!(config.crawl.concurrency, 1);
    }
}
