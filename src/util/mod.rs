//! Utility functions shared by the API layer.
//!
//! - **URL validation**: refuse feed URLs that would make the scraper reach
//!   into the server's own network

mod url_validator;

pub use url_validator::{validate_feed_url, UrlValidationError};
