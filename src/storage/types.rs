use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Persistence errors reported by a [`SettingsStore`](super::SettingsStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the settings slot failed
    #[error("Settings storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored blob is not a valid settings document
    #[error("Stored settings are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Another holder of the in-memory slot panicked mid-write
    #[error("Settings slot lock poisoned")]
    Poisoned,
}

// ============================================================================
// Constants
// ============================================================================

/// Default retention cap applied after every merge.
pub const DEFAULT_MAX_ARTICLES_PER_FEED: usize = 100;

/// Default fetch timeout in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Data Structures
// ============================================================================

/// One entry of a feed.
///
/// `guid` holds the safe ID once the article has passed through the parser,
/// the source guid is not kept. `read` is `None` for freshly parsed articles
/// and for legacy records written before the flag existed; every article that
/// went through a merge carries `Some(_)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Only an explicit `false` counts towards the unread counter.
    pub fn is_unread(&self) -> bool {
        self.read == Some(false)
    }

    pub fn is_read(&self) -> bool {
        self.read == Some(true)
    }
}

/// The materialized content of a subscribed source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Feed {
    pub title: String,
    /// Newest first.
    pub articles: Vec<Article>,
    /// Stored blobs may hold `null` or a negative number here; both read as 0.
    #[serde(deserialize_with = "lenient_count")]
    pub unread_count: usize,
}

fn lenient_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0))
}

impl Feed {
    /// Number of articles whose flag is explicitly `false`.
    pub fn count_unread(&self) -> usize {
        self.articles.iter().filter(|a| a.is_unread()).count()
    }
}

/// Output of the fetch+parse collaborator for one poll.
///
/// `articles: None` signals a failed fetch: the merge leaves the stored
/// articles and title alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchedFeed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<Article>>,
}

impl FetchedFeed {
    pub fn new(title: impl Into<String>, articles: Vec<Article>) -> Self {
        Self {
            title: title.into(),
            articles: Some(articles),
        }
    }

    /// The "fetch failed" sentinel.
    pub fn failed() -> Self {
        Self::default()
    }
}

/// A subscription: a fetch location plus the most recently merged feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Render-time position, reassigned on every reset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
}

impl FeedEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Title to show for this entry, falling back to the URL before the
    /// first successful fetch.
    pub fn display_title(&self) -> &str {
        match &self.feed {
            Some(feed) if !feed.title.is_empty() => &feed.title,
            _ => &self.url,
        }
    }
}

/// Fetch options, persisted under the `ajax` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Milliseconds.
    pub timeout: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

/// The whole persisted reader state, stored as one JSON document.
///
/// Every field defaults, so a partial document is merged over the defaults
/// on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "ajax")]
    pub fetch: FetchSettings,
    pub debug: bool,
    pub feeds: Vec<FeedEntry>,
    pub max_articles_per_feed: usize,
    pub allow_html: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            debug: false,
            feeds: Vec::new(),
            max_articles_per_feed: DEFAULT_MAX_ARTICLES_PER_FEED,
            allow_html: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_articles_per_feed, 100);
        assert_eq!(settings.fetch.timeout, 30_000);
        assert!(settings.allow_html);
        assert!(!settings.debug);
        assert!(settings.feeds.is_empty());
    }

    #[test]
    fn test_partial_document_merges_over_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"maxArticlesPerFeed": 5, "ajax": {}}"#).unwrap();
        assert_eq!(settings.max_articles_per_feed, 5);
        assert_eq!(settings.fetch.timeout, 30_000);
        assert!(settings.allow_html);
    }

    #[test]
    fn test_legacy_article_without_read_flag() {
        let article: Article =
            serde_json::from_str(r#"{"title":"T1","link":"http://x/1"}"#).unwrap();
        assert_eq!(article.read, None);
        assert_eq!(article.guid, None);
        assert!(!article.is_unread());
        assert!(!article.is_read());
    }

    #[test]
    fn test_unread_count_tolerates_bad_values() {
        for raw in ["null", "-1", "2.5", "\"3\""] {
            let doc = format!(r#"{{"title":"T","articles":[],"unreadCount":{}}}"#, raw);
            let feed: Feed = serde_json::from_str(&doc).unwrap();
            assert_eq!(feed.unread_count, 0, "unreadCount = {}", raw);
        }

        let feed: Feed = serde_json::from_str(r#"{"title":"T","unreadCount":4}"#).unwrap();
        assert_eq!(feed.unread_count, 4);
        let feed: Feed = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
        assert_eq!(feed.unread_count, 0);
    }

    #[test]
    fn test_json_shape_uses_original_keys() {
        let mut settings = Settings::default();
        let mut entry = FeedEntry::new("http://example.com/rss");
        entry.feed = Some(Feed {
            title: "Example".into(),
            articles: vec![Article {
                read: Some(false),
                ..Article::new("T1", "http://example.com/1")
            }],
            unread_count: 1,
        });
        settings.feeds.push(entry);

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["maxArticlesPerFeed"], 100);
        assert_eq!(value["allowHtml"], true);
        assert_eq!(value["ajax"]["timeout"], 30_000);
        assert_eq!(value["feeds"][0]["feed"]["unreadCount"], 1);
        assert_eq!(value["feeds"][0]["feed"]["articles"][0]["read"], false);
        assert!(value["feeds"][0].get("signature").is_none());
    }

    #[test]
    fn test_roundtrip_preserves_order_and_flags() {
        let mut settings = Settings::default();
        let mut entry = FeedEntry::new("http://example.com/rss");
        entry.feed = Some(Feed {
            title: "Example".into(),
            articles: vec![
                Article {
                    read: Some(false),
                    ..Article::new("T2", "http://example.com/2")
                },
                Article {
                    read: Some(true),
                    ..Article::new("T1", "http://example.com/1")
                },
                Article::new("T0", "http://example.com/0"),
            ],
            unread_count: 1,
        });
        settings.feeds.push(entry);

        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_display_title_falls_back_to_url() {
        let mut entry = FeedEntry::new("http://example.com/rss");
        assert_eq!(entry.display_title(), "http://example.com/rss");

        entry.feed = Some(Feed {
            title: "Example".into(),
            ..Feed::default()
        });
        assert_eq!(entry.display_title(), "Example");
    }
}
