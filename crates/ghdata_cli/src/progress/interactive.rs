use std::sync::Mutex;
use std::time::Duration;

use ghdata::crawl::CrawlProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bars owned by the reporter, under one lock.
#[derive(Default)]
struct ProgressState {
    /// One bar per crawl, advanced per repository.
    crawl_bar: Option<ProgressBar>,
    /// Spinner showing the page currently being fetched.
    page_bar: Option<ProgressBar>,
    /// Population collection bar (search API).
    population_bar: Option<ProgressBar>,
    failed: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: CrawlProgress) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        match event {
            CrawlProgress::CrawlStarted {
                kind,
                repositories,
                concurrency,
            } => {
                let bar = self.multi.add(ProgressBar::new(repositories as u64));
                bar.set_style(Self::bar_style());
                bar.set_prefix(format!("{kind:10}"));
                bar.set_message(format!("{concurrency} worker(s)"));
                state.crawl_bar = Some(bar);

                let pages = self.multi.add(ProgressBar::new_spinner());
                pages.set_style(Self::spinner_style());
                pages.set_prefix(format!("{:10}", "pages"));
                pages.enable_steady_tick(Duration::from_millis(100));
                state.page_bar = Some(pages);
                state.failed = 0;
            }

            CrawlProgress::FetchedPage {
                target,
                page,
                count,
            } => {
                if let Some(bar) = &state.page_bar {
                    bar.set_message(format!("{target} page {page} ({count} items)"));
                }
            }

            CrawlProgress::RetryBackoff {
                target,
                attempt,
                retry_after_ms,
                error,
            } => {
                if let Some(bar) = &state.page_bar {
                    bar.set_message(format!(
                        "{target}: retry {attempt} in {:.1}s ({error})",
                        retry_after_ms as f64 / 1000.0
                    ));
                }
            }

            CrawlProgress::RepositoryComplete { full_name, records } => {
                if let Some(bar) = &state.crawl_bar {
                    bar.inc(1);
                    bar.set_message(format!("{full_name}: {records} rows"));
                }
            }

            CrawlProgress::RepositoryFailed { full_name, error } => {
                state.failed += 1;
                self.multi
                    .println(format!("  ✗ {full_name}: {error}"))
                    .ok();
                if let Some(bar) = &state.crawl_bar {
                    bar.inc(1);
                    bar.set_message(format!("{} failed", state.failed));
                }
            }

            CrawlProgress::CrawlComplete {
                succeeded,
                failed,
                records,
                cancelled,
            } => {
                if let Some(bar) = state.page_bar.take() {
                    bar.finish_and_clear();
                }
                if let Some(bar) = &state.crawl_bar {
                    let suffix = if cancelled { ", cancelled" } else { "" };
                    bar.finish_with_message(format!(
                        "{succeeded} ok, {failed} failed, {records} rows{suffix}"
                    ));
                }
            }

            CrawlProgress::PopulationProgress {
                collected,
                total,
                min_stars,
            } => {
                let bar = state.population_bar.get_or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new(total));
                    bar.set_style(Self::bar_style());
                    bar.set_prefix(format!("{:10}", "search"));
                    bar
                });
                bar.set_position(collected as u64);
                bar.set_message(format!("stars>={min_stars}"));
            }

            CrawlProgress::Warning { message } => {
                self.multi.println(format!("  ! {message}")).ok();
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        for bar in [&state.crawl_bar, &state.page_bar, &state.population_bar]
            .into_iter()
            .flatten()
        {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>5}/{len:5} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_bar_tracks_repositories() {
        let reporter = InteractiveReporter::new();
        reporter.handle(CrawlProgress::CrawlStarted {
            kind: "stars",
            repositories: 3,
            concurrency: 1,
        });
        reporter.handle(CrawlProgress::RepositoryComplete {
            full_name: "o/a".to_string(),
            records: 2,
        });
        reporter.handle(CrawlProgress::RepositoryFailed {
            full_name: "o/b".to_string(),
            error: "HTTP 404".to_string(),
        });

        let state = reporter.state.lock().unwrap();
        let bar = state.crawl_bar.as_ref().unwrap();
        assert_eq!(bar.position(), 2);
        assert_eq!(bar.length(), Some(3));
        assert_eq!(state.failed, 1);
    }

    #[test]
    fn population_bar_follows_collected_count() {
        let reporter = InteractiveReporter::new();
        reporter.handle(CrawlProgress::PopulationProgress {
            collected: 100,
            total: 13_611,
            min_stars: 100,
        });
        reporter.handle(CrawlProgress::PopulationProgress {
            collected: 200,
            total: 13_611,
            min_stars: 104,
        });
        reporter.finish();

        let state = reporter.state.lock().unwrap();
        let bar = state.population_bar.as_ref().unwrap();
        assert_eq!(bar.position(), 200);
        assert!(bar.is_finished());
    }
}
