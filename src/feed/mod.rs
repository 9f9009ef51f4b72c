//! Feed retrieval: download an RSS document over HTTP and parse its channel.
//!
//! - [`parser`] - turns RSS XML into a [`FeedDocument`] with `quick-xml`
//! - [`fetcher`] - the [`FeedSource`] seam and its HTTP implementation
//!
//! Nothing here touches storage; the scraper decides what to do with a
//! document.

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, HttpFeedSource, DEFAULT_FETCH_TIMEOUT};
pub use parser::{parse_feed, FeedDocument, FeedItem, ParseError};
