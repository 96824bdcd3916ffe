use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use super::parser::{parse_feed, ParseError};
use super::validate::{validate_feed, ValidationError};
use crate::engine::MergeOutcome;
use crate::reader::{Reader, ReaderError};
use crate::storage::SettingsStore;
use crate::util::{normalize_location, parse_location, Location, LocationError};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching, parsing or merging a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The stored or entered location is unusable
    #[error(transparent)]
    Location(#[from] LocationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Reading a local feed file failed
    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Feed XML could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The document is not a usable feed
    #[error("The specified location seems not a valid RSS feed: {0}")]
    Invalid(#[from] ValidationError),
    /// Merging or persisting failed
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

/// Outcome of refreshing the feed at `index`.
#[derive(Debug)]
pub struct FetchResult {
    pub index: usize,
    pub result: Result<MergeOutcome, FetchError>,
}

/// Download the raw feed document at `location`.
///
/// `/`-prefixed locations are read from disk; everything else goes over
/// HTTP. The whole download, body included, is bounded by `timeout`. There
/// are no retries.
pub async fn fetch_feed(
    client: &reqwest::Client,
    location: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    match parse_location(location)? {
        Location::Remote(url) => tokio::time::timeout(timeout, fetch_remote(client, url))
            .await
            .map_err(|_| FetchError::Timeout)?,
        Location::Local(path) => read_local(&path).await,
    }
}

async fn fetch_remote(client: &reqwest::Client, url: url::Url) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_local(path: &Path) -> Result<Vec<u8>, FetchError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > MAX_FEED_SIZE as u64 {
        return Err(FetchError::ResponseTooLarge);
    }
    Ok(tokio::fs::read(path).await?)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

fn fetch_timeout<S: SettingsStore>(reader: &Reader<S>) -> Duration {
    Duration::from_millis(reader.settings().fetch.timeout)
}

/// Validate `location` as a feed and subscribe to it.
///
/// The location is normalized first (`http://` is added when no scheme or
/// leading `/` is given). The validated payload is merged right away, so the
/// new entry is materialized without a second download.
pub async fn subscribe<S: SettingsStore>(
    reader: &mut Reader<S>,
    client: &reqwest::Client,
    location: &str,
) -> Result<usize, FetchError> {
    if location.trim().is_empty() {
        return Err(LocationError::Empty.into());
    }
    let location = normalize_location(location);

    let bytes = fetch_feed(client, &location, fetch_timeout(reader)).await?;
    let fetched = validate_feed(&bytes)?;
    tracing::debug!(feed = %location, "Feed is valid");

    let index = reader.add_feed(location)?;
    reader.update_feed(index, fetched)?;
    Ok(index)
}

/// Fetch, parse and merge the feed at `index`.
///
/// A failed download or parse leaves the stored feed untouched; the error
/// is logged and returned.
pub async fn refresh_one<S: SettingsStore>(
    reader: &mut Reader<S>,
    client: &reqwest::Client,
    index: usize,
) -> FetchResult {
    FetchResult {
        index,
        result: try_refresh(reader, client, index).await,
    }
}

async fn try_refresh<S: SettingsStore>(
    reader: &mut Reader<S>,
    client: &reqwest::Client,
    index: usize,
) -> Result<MergeOutcome, FetchError> {
    let url = reader.feed(index)?.url.clone();
    if url.is_empty() {
        tracing::debug!(index = index, "Feed has no location, skipping");
        return Err(LocationError::Empty.into());
    }

    tracing::debug!(feed = %url, "Getting feed");
    let fetched = match fetch_feed(client, &url, fetch_timeout(reader)).await {
        Ok(bytes) => parse_feed(&bytes).map_err(FetchError::from),
        Err(e) => Err(e),
    };

    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(feed = %url, error = %e, "Failed to retrieve feed");
            return Err(e);
        }
    };

    tracing::debug!(feed = %url, "Retrieved data");
    Ok(reader.update_feed(index, fetched)?)
}

/// Refresh every feed, one at a time in list order.
pub async fn refresh_all<S: SettingsStore>(
    reader: &mut Reader<S>,
    client: &reqwest::Client,
) -> Vec<FetchResult> {
    let total = reader.feeds().len();
    tracing::debug!(total = total, "Refreshing all feeds");

    let mut results = Vec::with_capacity(total);
    for index in 0..total {
        results.push(refresh_one(reader, client, index).await);
    }

    let failed = results.iter().filter(|r| r.result.is_err()).count();
    let new_articles: usize = results
        .iter()
        .filter_map(|r| r.result.as_ref().ok())
        .map(MergeOutcome::new_articles)
        .sum();
    tracing::info!(
        total = total,
        failed = failed,
        new_articles = new_articles,
        "Refresh finished"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Feed</title>
    <item><guid>2</guid><title>Two</title><description>d</description><link>http://x/2</link></item>
    <item><guid>1</guid><title>One</title><description>d</description><link>http://x/1</link></item>
</channel></rss>"#;

    async fn serve(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn reader_with(url: &str) -> Reader<MemoryStore> {
        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        reader.add_feed(url).unwrap();
        reader
    }

    #[tokio::test]
    async fn test_fetch_feed_returns_body() {
        let server = serve(200, VALID_RSS).await;
        let client = reqwest::Client::new();

        let bytes = fetch_feed(
            &client,
            &format!("{}/feed", server.uri()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(bytes, VALID_RSS.as_bytes());
    }

    #[tokio::test]
    async fn test_refresh_first_fetch_adopts() {
        let server = serve(200, VALID_RSS).await;
        let mut reader = reader_with(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 0).await;
        assert_eq!(result.result.unwrap(), MergeOutcome::Adopted { articles: 2 });

        let feed = reader.feeds()[0].feed.as_ref().unwrap();
        assert_eq!(feed.title, "Mock Feed");
        assert_eq!(feed.articles[0].guid.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_refresh_twice_adds_nothing() {
        let server = serve(200, VALID_RSS).await;
        let mut reader = reader_with(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();

        refresh_one(&mut reader, &client, 0).await.result.unwrap();
        let second = refresh_one(&mut reader, &client, 0).await.result.unwrap();
        assert_eq!(
            second,
            MergeOutcome::Merged {
                new_articles: 0,
                evicted: 0
            }
        );

        let feed = reader.feeds()[0].feed.as_ref().unwrap();
        assert_eq!(feed.articles.len(), 2);
        // First-fetch articles were backfilled as read
        assert_eq!(feed.unread_count, 0);
    }

    #[tokio::test]
    async fn test_refresh_404_leaves_feed_untouched() {
        let server = serve(404, "").await;
        let mut reader = reader_with(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 0).await;
        match result.result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
        assert!(reader.feeds()[0].feed.is_none());
    }

    #[tokio::test]
    async fn test_refresh_malformed_feed() {
        let server = serve(200, "<not valid xml").await;
        let mut reader = reader_with(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 0).await;
        assert!(matches!(result.result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_refresh_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let mut reader = reader_with(&format!("{}/feed", mock_server.uri()));
        reader.set_fetch_timeout(50).unwrap();
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 0).await;
        assert!(matches!(result.result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_refresh_missing_index() {
        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 3).await;
        assert!(matches!(
            result.result,
            Err(FetchError::Reader(ReaderError::FeedNotFound(3)))
        ));
    }

    #[tokio::test]
    async fn test_refresh_local_file() {
        let dir = std::env::temp_dir().join("rssreader_fetch_test_local");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("feed.xml");
        std::fs::write(&file, VALID_RSS).unwrap();

        let mut reader = reader_with(file.to_str().unwrap());
        let client = reqwest::Client::new();

        let result = refresh_one(&mut reader, &client, 0).await;
        assert!(result.result.is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_subscribe_valid_feed() {
        let server = serve(200, VALID_RSS).await;
        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        let client = reqwest::Client::new();

        let index = subscribe(&mut reader, &client, &format!("{}/feed", server.uri()))
            .await
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(reader.feeds()[0].display_title(), "Mock Feed");
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_feed() {
        let server = serve(200, "<rss><channel><title>t</title></channel></rss>").await;
        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        let client = reqwest::Client::new();

        let result = subscribe(&mut reader, &client, &format!("{}/feed", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::Invalid(ValidationError::NoItems))
        ));
        assert!(reader.feeds().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_empty_location() {
        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        let client = reqwest::Client::new();

        let result = subscribe(&mut reader, &client, "   ").await;
        assert!(matches!(
            result,
            Err(FetchError::Location(LocationError::Empty))
        ));
    }

    #[tokio::test]
    async fn test_refresh_all_continues_after_failure() {
        let good = serve(200, VALID_RSS).await;
        let bad = serve(500, "").await;

        let mut reader = Reader::load(MemoryStore::new()).unwrap();
        reader.add_feed(format!("{}/feed", bad.uri())).unwrap();
        reader.add_feed(format!("{}/feed", good.uri())).unwrap();
        let client = reqwest::Client::new();

        let results = refresh_all(&mut reader, &client).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert!(results[0].result.is_err());
        assert!(results[1].result.is_ok());
        assert!(reader.feeds()[1].feed.is_some());
    }
}
