//! Background feed scraping.
//!
//! A [`Scheduler`] wakes on a fixed interval, asks its [`FetchLedger`] for the
//! feeds that have waited longest, and scrapes them in one bounded wave:
//!
//! ```text
//! tick -> ledger.select_due(N) -> up to N tasks -> join -> idle
//!                                  each: mark_fetched -> fetch -> log items
//! ```
//!
//! The ledger and the feed source are injected, so the loop can be driven by
//! the SQLite store in production and by in-memory doubles in tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rssagg::feed::HttpFeedSource;
//! use rssagg::scraper::{FeedLedger, Scheduler, ScraperConfig};
//!
//! let ledger = Arc::new(FeedLedger::new(db));
//! let source = Arc::new(HttpFeedSource::build()?);
//! let handle = Scheduler::new(ledger, source, ScraperConfig::default()).spawn();
//! ```

mod ledger;
mod scheduler;
mod worker;

#[cfg(test)]
mod test_support;

pub use ledger::{FeedLedger, FetchLedger, LedgerError};
pub use scheduler::{Scheduler, ScraperConfig};
pub use worker::{run_wave, scrape_feed, CycleReport, TaskOutcome};
