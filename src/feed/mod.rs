//! Fetch and parse collaborators for the merge engine.
//!
//! - [`parser`] - RSS XML into a [`FetchedFeed`](crate::storage::FetchedFeed),
//!   with safe IDs assigned
//! - [`validate`] - the "is this a feed at all" check run before subscribing
//! - [`fetcher`] - HTTP or local-file download, and the refresh loop that
//!   hands each payload to [`Reader::update_feed`](crate::reader::Reader::update_feed)
//!
//! # Example
//!
//! ```ignore
//! use rssreader::feed::{refresh_all, subscribe};
//!
//! let index = subscribe(&mut reader, &client, "example.com/rss.xml").await?;
//! let results = refresh_all(&mut reader, &client).await;
//! ```

mod fetcher;
mod parser;
mod validate;

pub use fetcher::{fetch_feed, refresh_all, refresh_one, subscribe, FetchError, FetchResult};
pub use parser::{parse_document, parse_feed, ParseError, ParsedDocument};
pub use validate::{validate_feed, ValidationError};
