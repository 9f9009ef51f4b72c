use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ledger::{FetchLedger, LedgerError};
use super::worker::{run_wave, CycleReport};
use crate::feed::{FeedSource, DEFAULT_FETCH_TIMEOUT};

/// Startup settings for the scrape loop. Fixed for the lifetime of a
/// [`Scheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Feeds selected per cycle, and the number fetched at once.
    pub concurrency: usize,
    /// Time between cycle starts.
    pub interval: Duration,
    /// Hard limit on each feed download.
    pub fetch_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            interval: Duration::from_secs(60),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Periodically scrapes the feeds the ledger reports as due.
///
/// Each tick runs one cycle: select up to `concurrency` feeds, scrape them all
/// concurrently, and wait for every task before going idle again. Cycles
/// never overlap. Ticks that come due while a cycle is still running are
/// dropped rather than queued, so a slow cycle is followed by at most one
/// immediate cycle and then the regular schedule resumes.
pub struct Scheduler<L, S> {
    ledger: Arc<L>,
    source: Arc<S>,
    config: ScraperConfig,
}

impl<L, S> Scheduler<L, S>
where
    L: FetchLedger,
    S: FeedSource,
{
    pub fn new(ledger: Arc<L>, source: Arc<S>, mut config: ScraperConfig) -> Self {
        // tokio intervals reject a zero period
        config.concurrency = config.concurrency.max(1);
        config.interval = config.interval.max(Duration::from_millis(1));
        Self {
            ledger,
            source,
            config,
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Run a single cycle to completion.
    ///
    /// # Errors
    ///
    /// Only a failed selection is returned; per-feed failures are logged by
    /// their task and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, LedgerError> {
        let feeds = self.ledger.select_due(self.config.concurrency).await?;
        if feeds.is_empty() {
            tracing::debug!("No feeds due for fetching");
            return Ok(CycleReport::default());
        }

        Ok(run_wave(
            Arc::clone(&self.ledger),
            Arc::clone(&self.source),
            feeds,
            self.config.concurrency,
            self.config.fetch_timeout,
        )
        .await)
    }

    /// Loop forever, one cycle per tick. The first cycle starts immediately.
    pub async fn run(self) {
        tracing::info!(
            concurrency = self.config.concurrency,
            interval_secs = self.config.interval.as_secs_f64(),
            "Scraping feeds"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let started = Instant::now();
            match self.run_cycle().await {
                Ok(report) if report.dispatched == 0 => {}
                Ok(report) => {
                    tracing::info!(
                        dispatched = report.dispatched,
                        collected = report.collected,
                        failed = report.failed,
                        posts = report.items,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Scrape cycle complete"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error selecting feeds to fetch, skipping cycle");
                }
            }
        }
    }

    /// Run the loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
