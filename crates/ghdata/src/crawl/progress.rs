//! Progress reporting types for crawl operations.
//!
//! The library never prints; it emits [`CrawlProgress`] events through an
//! optional callback and the caller decides how to render them.

use std::sync::Arc;

/// Progress events emitted while crawling.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CrawlProgress {
    /// Starting a crawl over a list of repositories.
    CrawlStarted {
        /// What is being collected (issues, comments, commits, stars).
        kind: &'static str,
        /// Number of repositories to visit.
        repositories: usize,
        /// Worker pool size.
        concurrency: usize,
    },

    /// Fetched one page of a paginated endpoint.
    FetchedPage {
        /// Endpoint or repository the page belongs to.
        target: String,
        /// Page number (1-indexed).
        page: u32,
        /// Items on this page.
        count: usize,
    },

    /// A request failed and will be retried after a delay.
    RetryBackoff {
        target: String,
        attempt: u32,
        retry_after_ms: u64,
        error: String,
    },

    /// One repository finished successfully.
    RepositoryComplete {
        full_name: String,
        records: usize,
    },

    /// One repository was abandoned after a fetch error.
    RepositoryFailed { full_name: String, error: String },

    /// The crawl finished (possibly early, after cancellation).
    CrawlComplete {
        succeeded: usize,
        failed: usize,
        records: usize,
        cancelled: bool,
    },

    /// Population collection progress.
    PopulationProgress {
        collected: usize,
        total: u64,
        min_stars: u64,
    },

    /// Non-fatal condition worth surfacing to the operator.
    Warning { message: String },
}

/// Callback invoked for every progress event.
///
/// Shared (`Arc`) so that worker tasks spawned per repository can report
/// through the same sink.
pub type ProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;

/// Emit an event if a callback is registered.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: CrawlProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            CrawlProgress::FetchedPage {
                target: "octo/repo".to_string(),
                page: 1,
                count: 100,
            },
        );
        emit(
            Some(&callback),
            CrawlProgress::RepositoryComplete {
                full_name: "octo/repo".to_string(),
                records: 3,
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_without_callback() {
        emit(
            None,
            CrawlProgress::Warning {
                message: "nothing listens".to_string(),
            },
        );
    }

    #[test]
    fn debug_output_names_the_variant() {
        let event = CrawlProgress::RetryBackoff {
            target: "https://api.github.com/repos/a/b".to_string(),
            attempt: 2,
            retry_after_ms: 2_000,
            error: "HTTP 502".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("RetryBackoff"));
        assert!(debug_str.contains("2000"));
    }
}
