//! RSS aggregation backend.
//!
//! Users register feeds through the REST API in [`api`]; a background
//! [`scraper::Scheduler`] keeps pulling the least recently fetched ones and
//! logs what it finds.

pub mod api;
pub mod config;
pub mod feed;
pub mod scraper;
pub mod storage;
pub mod util;
