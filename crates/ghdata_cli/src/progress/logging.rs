use ghdata::crawl::CrawlProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: CrawlProgress) {
        match event {
            CrawlProgress::CrawlStarted {
                kind,
                repositories,
                concurrency,
            } => {
                tracing::info!(kind, repositories, concurrency, "Crawling repositories");
            }

            CrawlProgress::FetchedPage {
                target,
                page,
                count,
            } => {
                tracing::debug!(endpoint = %target, page, count, "Fetched page");
            }

            CrawlProgress::RetryBackoff {
                target,
                attempt,
                retry_after_ms,
                error,
            } => {
                tracing::warn!(
                    endpoint = %target,
                    attempt,
                    retry_after_ms,
                    error = %error,
                    "Request failed, backing off"
                );
            }

            CrawlProgress::RepositoryComplete { full_name, records } => {
                tracing::info!(repo = %full_name, records, "Repository complete");
            }

            CrawlProgress::RepositoryFailed { full_name, error } => {
                tracing::warn!(repo = %full_name, error = %error, "Repository failed");
            }

            CrawlProgress::CrawlComplete {
                succeeded,
                failed,
                records,
                cancelled,
            } => {
                tracing::info!(succeeded, failed, records, cancelled, "Crawl complete");
            }

            CrawlProgress::PopulationProgress {
                collected,
                total,
                min_stars,
            } => {
                tracing::info!(collected, total, min_stars, "Collecting population");
            }

            CrawlProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
