//! In-memory doubles for the ledger and feed source.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ledger::{FetchLedger, LedgerError};
use crate::feed::{FeedDocument, FeedItem, FeedSource, FetchError};
use crate::storage::{DatabaseError, Feed};

/// Ordered record of ledger and source calls, shared by both doubles.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn feed(id: i64) -> Feed {
    Feed {
        id,
        created_at: 0,
        updated_at: 0,
        name: format!("Feed {id}"),
        url: format!("https://feeds.test/{id}"),
        user_id: 1,
        last_fetched_at: None,
    }
}

pub fn document(items: usize) -> FeedDocument {
    FeedDocument {
        title: "Doc".to_string(),
        items: (0..items)
            .map(|i| FeedItem {
                title: format!("Post {i}"),
                ..FeedItem::default()
            })
            .collect(),
        ..FeedDocument::default()
    }
}

/// Tracks how many fetches are in flight and the highest value seen.
#[derive(Default)]
pub struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct MockLedger {
    pub feeds: Vec<Feed>,
    pub journal: Journal,
    pub gauge: Arc<Gauge>,
    pub fail_select: AtomicUsize,
    pub missing: HashSet<i64>,
    pub select_calls: AtomicUsize,
    pub limits: Mutex<Vec<usize>>,
    /// Set if a selection ever starts while fetches are still running.
    pub overlapped: AtomicBool,
}

impl MockLedger {
    pub fn new(feeds: Vec<Feed>, journal: Journal, gauge: Arc<Gauge>) -> Self {
        Self {
            feeds,
            journal,
            gauge,
            fail_select: AtomicUsize::new(0),
            missing: HashSet::new(),
            select_calls: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Fail the next `count` selections.
    pub fn failing_selects(self, count: usize) -> Self {
        self.fail_select.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_missing(mut self, feed_id: i64) -> Self {
        self.missing.insert(feed_id);
        self
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchLedger for MockLedger {
    async fn select_due(&self, limit: usize) -> Result<Vec<Feed>, LedgerError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().unwrap().push(limit);
        if self.gauge.active() > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        let remaining_failures = self.fail_select.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.fail_select.store(remaining_failures - 1, Ordering::SeqCst);
            return Err(LedgerError::Storage(DatabaseError::NotFound("feeds table")));
        }

        Ok(self.feeds.iter().take(limit).cloned().collect())
    }

    async fn mark_fetched(&self, feed_id: i64) -> Result<Feed, LedgerError> {
        self.journal.lock().unwrap().push(format!("mark {feed_id}"));
        if self.missing.contains(&feed_id) {
            return Err(LedgerError::FeedNotFound(feed_id));
        }
        let mut marked = feed(feed_id);
        marked.last_fetched_at = Some(chrono::Utc::now().timestamp_millis());
        Ok(marked)
    }
}

pub struct MockSource {
    pub journal: Journal,
    pub gauge: Arc<Gauge>,
    pub delay: Duration,
    pub items: usize,
    pub failing: HashSet<String>,
    pub panicking: HashSet<String>,
}

impl MockSource {
    pub fn new(journal: Journal, gauge: Arc<Gauge>) -> Self {
        Self {
            journal,
            gauge,
            delay: Duration::ZERO,
            items: 2,
            failing: HashSet::new(),
            panicking: HashSet::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_for(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn panicking_for(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }
}

#[async_trait]
impl FeedSource for MockSource {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FeedDocument, FetchError> {
        self.journal.lock().unwrap().push(format!("fetch {url}"));
        self.gauge.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.gauge.leave();

        if self.panicking.contains(url) {
            panic!("source blew up for {url}");
        }
        if self.failing.contains(url) {
            return Err(FetchError::HttpStatus(500));
        }
        Ok(document(self.items))
    }
}

/// One captured `tracing` event: its message plus every other field,
/// formatted with `Debug` (so `%`-recorded values appear unquoted).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct RecordVisitor(LogRecord);

impl tracing::field::Visit for RecordVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.0.message = value;
        } else {
            self.0.fields.push((field.name().to_string(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_debug(field, &format_args!("{value}"));
    }
}

/// `tracing` layer that keeps every event emitted while it is the default
/// subscriber. Install with [`LogCapture::install`] on a current-thread test.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<LogRecord>>>);

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::layer::SubscriberExt;
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn with_message(&self, message: &str) -> Vec<LogRecord> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.message == message)
            .cloned()
            .collect()
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(visitor.0);
    }
}
