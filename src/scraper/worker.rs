use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::ledger::FetchLedger;
use crate::feed::FeedSource;
use crate::storage::Feed;

/// How a single feed's scrape task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Document fetched and every item reported
    Collected { items: usize },
    /// The ledger refused to mark the feed; nothing was fetched
    MarkFailed,
    /// Network, status, timeout or parse failure after marking
    FetchFailed,
    /// The task panicked; the rest of the wave was unaffected
    Panicked,
}

/// Tally of one wave of scrape tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: usize,
    pub collected: usize,
    pub failed: usize,
    /// Items reported across all collected feeds
    pub items: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Collected { items } => {
                self.collected += 1;
                self.items += items;
            }
            TaskOutcome::MarkFailed | TaskOutcome::FetchFailed | TaskOutcome::Panicked => {
                self.failed += 1;
            }
        }
    }
}

/// Scrape one feed: mark it fetched, then download and report its items.
///
/// The feed is marked before the network call, so a failed download still
/// pushes the feed to the back of the selection order. Every error is logged
/// here and never reaches the scheduler.
pub async fn scrape_feed<L, S>(ledger: &L, source: &S, feed: &Feed, timeout: Duration) -> TaskOutcome
where
    L: FetchLedger + ?Sized,
    S: FeedSource + ?Sized,
{
    if let Err(e) = ledger.mark_fetched(feed.id).await {
        tracing::warn!(feed_id = feed.id, error = %e, "Error marking feed as fetched");
        return TaskOutcome::MarkFailed;
    }

    let document = match source.fetch(&feed.url, timeout).await {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(feed_id = feed.id, url = %feed.url, error = %e, "Error fetching feed");
            return TaskOutcome::FetchFailed;
        }
    };

    for item in &document.items {
        tracing::info!(feed_id = feed.id, title = %item.title, "Found post");
    }
    tracing::info!(
        feed_id = feed.id,
        feed = %feed.name,
        posts = document.items.len(),
        "Feed collected"
    );

    TaskOutcome::Collected {
        items: document.items.len(),
    }
}

/// Scrape `feeds` with at most `width` tasks in flight and wait for all of them.
///
/// Tasks are started in the order given; they finish in any order. Each task
/// runs on its own tokio task so a panic is contained to that feed. Returns
/// only after every dispatched task has ended.
pub async fn run_wave<L, S>(
    ledger: Arc<L>,
    source: Arc<S>,
    feeds: Vec<Feed>,
    width: usize,
    timeout: Duration,
) -> CycleReport
where
    L: FetchLedger,
    S: FeedSource,
{
    let mut report = CycleReport {
        dispatched: feeds.len(),
        ..CycleReport::default()
    };
    if feeds.is_empty() {
        return report;
    }

    let outcomes: Vec<TaskOutcome> = stream::iter(feeds)
        .map(|feed| {
            let ledger = Arc::clone(&ledger);
            let source = Arc::clone(&source);
            let feed_id = feed.id;

            async move {
                let task = tokio::spawn(async move {
                    scrape_feed(ledger.as_ref(), source.as_ref(), &feed, timeout).await
                });
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(feed_id, error = %e, "Scrape task aborted");
                        TaskOutcome::Panicked
                    }
                }
            }
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await;

    for outcome in outcomes {
        report.record(outcome);
    }
    report
}
