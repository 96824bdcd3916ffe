use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Errors raised while turning user input into a fetch location.
#[derive(Error, Debug)]
pub enum LocationError {
    /// Nothing was entered.
    #[error("Please enter a location")]
    Empty,
    /// The location could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Where a feed document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(Url),
    /// Locations starting with `/` name a local file.
    Local(PathBuf),
}

/// Prefix `http://` unless the location already starts with `http://`,
/// `https://` or `/`.
///
/// # Examples
///
/// ```
/// use rssreader::util::normalize_location;
///
/// assert_eq!(normalize_location("example.com/rss"), "http://example.com/rss");
/// assert_eq!(normalize_location("https://example.com/rss"), "https://example.com/rss");
/// assert_eq!(normalize_location("/srv/feed.xml"), "/srv/feed.xml");
/// ```
pub fn normalize_location(loc: &str) -> String {
    let loc = loc.trim();
    if loc.starts_with("http://") || loc.starts_with("https://") || loc.starts_with('/') {
        loc.to_string()
    } else {
        format!("http://{}", loc)
    }
}

/// Parse a stored feed URL into a [`Location`].
pub fn parse_location(loc: &str) -> Result<Location, LocationError> {
    if loc.trim().is_empty() {
        return Err(LocationError::Empty);
    }
    if loc.starts_with('/') {
        return Ok(Location::Local(PathBuf::from(loc)));
    }

    let url = Url::parse(loc)?;
    match url.scheme() {
        "http" | "https" => Ok(Location::Remote(url)),
        scheme => Err(LocationError::UnsupportedScheme(scheme.to_owned())),
    }
}
