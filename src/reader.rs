//! The reader state handle.
//!
//! [`Reader`] exclusively owns the [`Settings`] (and with them every feed
//! entry and its articles) and writes the whole blob back through its
//! [`SettingsStore`] after each mutation that must survive a restart.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::engine::{self, MergeOutcome};
use crate::storage::{
    Article, FeedEntry, FetchedFeed, Settings, SettingsStore, StorageError,
    DEFAULT_MAX_ARTICLES_PER_FEED,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("No feed at index {0}")]
    FeedNotFound(usize),

    #[error("Feed {feed} has no article at index {article}")]
    ArticleNotFound { feed: usize, article: usize },

    #[error("Maximum articles per feed must be at least 1")]
    InvalidArticleCap,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ============================================================================
// Reader
// ============================================================================

pub struct Reader<S: SettingsStore> {
    settings: Settings,
    store: S,
}

impl<S: SettingsStore> Reader<S> {
    /// Load settings from `store`.
    ///
    /// - Nothing stored → defaults are written back immediately
    /// - Unreadable blob → logged, defaults are used (the slot is left as-is
    ///   until the next save)
    /// - Entries missing a signature get one, and positions are reassigned
    pub fn load(store: S) -> Result<Self, ReaderError> {
        let settings = match store.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                tracing::debug!("Settings are undefined, storing defaults");
                let settings = Settings::default();
                store.save(&settings)?;
                settings
            }
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(error = %e, "Stored settings unreadable, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = Self { settings, store };
        reader.check_article_cap();
        reader.assign_signatures();
        reader.reset_counts();
        Ok(reader)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn feeds(&self) -> &[FeedEntry] {
        &self.settings.feeds
    }

    pub fn feed(&self, index: usize) -> Result<&FeedEntry, ReaderError> {
        self.settings
            .feeds
            .get(index)
            .ok_or(ReaderError::FeedNotFound(index))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write the whole settings blob.
    pub fn persist(&self) -> Result<(), ReaderError> {
        self.store.save(&self.settings)?;
        Ok(())
    }

    // ========================================================================
    // Feed List
    // ========================================================================

    /// Subscribe to `url`. Validation is the caller's job.
    pub fn add_feed(&mut self, url: impl Into<String>) -> Result<usize, ReaderError> {
        let mut entry = FeedEntry::new(url);
        entry.signature = Some(signature(&entry.url));
        let index = self.settings.feeds.len();
        entry.count = Some(index);

        tracing::info!(feed = %entry.url, index = index, "Adding feed");
        self.settings.feeds.push(entry);
        self.persist()?;
        Ok(index)
    }

    pub fn delete_feed(&mut self, index: usize) -> Result<FeedEntry, ReaderError> {
        if index >= self.settings.feeds.len() {
            return Err(ReaderError::FeedNotFound(index));
        }
        let removed = self.settings.feeds.remove(index);
        tracing::info!(feed = %removed.url, index = index, "Deleted feed");

        self.reset_counts();
        self.persist()?;
        Ok(removed)
    }

    /// Reassign every entry's render position.
    pub fn reset_counts(&mut self) {
        for (i, entry) in self.settings.feeds.iter_mut().enumerate() {
            entry.count = Some(i);
        }
    }

    /// A stored cap of 0 would empty every feed at the next merge.
    fn check_article_cap(&mut self) {
        if self.settings.max_articles_per_feed == 0 {
            tracing::warn!(
                default = DEFAULT_MAX_ARTICLES_PER_FEED,
                "Stored article cap is 0, using the default"
            );
            self.settings.max_articles_per_feed = DEFAULT_MAX_ARTICLES_PER_FEED;
        }
    }

    fn assign_signatures(&mut self) {
        for entry in &mut self.settings.feeds {
            if entry.signature.is_none() {
                let sig = signature(&entry.url);
                tracing::debug!(feed = %entry.url, signature = %sig, "Setting feed signature");
                entry.signature = Some(sig);
            }
        }
    }

    // ========================================================================
    // Merge and Read State
    // ========================================================================

    /// Merge a fetched payload into the feed at `index` and persist.
    pub fn update_feed(
        &mut self,
        index: usize,
        fetched: FetchedFeed,
    ) -> Result<MergeOutcome, ReaderError> {
        let max_articles = self.settings.max_articles_per_feed;
        let entry = self
            .settings
            .feeds
            .get_mut(index)
            .ok_or(ReaderError::FeedNotFound(index))?;

        let outcome = engine::merge_feed(&mut entry.feed, fetched, max_articles);
        tracing::debug!(feed = %entry.url, outcome = ?outcome, "Updated feed");

        self.persist()?;
        Ok(outcome)
    }

    /// Mark one article read. Returns whether anything changed; an already
    /// read article is left alone and nothing is written.
    pub fn mark_read(
        &mut self,
        feed_index: usize,
        article_index: usize,
    ) -> Result<bool, ReaderError> {
        let feed = self
            .settings
            .feeds
            .get_mut(feed_index)
            .ok_or(ReaderError::FeedNotFound(feed_index))?
            .feed
            .as_mut()
            .ok_or(ReaderError::ArticleNotFound {
                feed: feed_index,
                article: article_index,
            })?;

        let changed =
            engine::mark_read(feed, article_index).ok_or(ReaderError::ArticleNotFound {
                feed: feed_index,
                article: article_index,
            })?;

        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Mark an article read if needed and hand it back for display.
    pub fn open_article(
        &mut self,
        feed_index: usize,
        article_index: usize,
    ) -> Result<&Article, ReaderError> {
        self.mark_read(feed_index, article_index)?;
        self.feed(feed_index)?
            .feed
            .as_ref()
            .and_then(|feed| feed.articles.get(article_index))
            .ok_or(ReaderError::ArticleNotFound {
                feed: feed_index,
                article: article_index,
            })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn set_allow_html(&mut self, allow: bool) -> Result<(), ReaderError> {
        self.settings.allow_html = allow;
        self.persist()
    }

    pub fn set_debug(&mut self, debug: bool) -> Result<(), ReaderError> {
        self.settings.debug = debug;
        self.persist()
    }

    /// Takes effect at the next merge; stored lists are not cut right away.
    pub fn set_max_articles_per_feed(&mut self, max: usize) -> Result<(), ReaderError> {
        if max == 0 {
            return Err(ReaderError::InvalidArticleCap);
        }
        self.settings.max_articles_per_feed = max;
        self.persist()
    }

    pub fn set_fetch_timeout(&mut self, timeout_ms: u64) -> Result<(), ReaderError> {
        self.settings.fetch.timeout = timeout_ms;
        self.persist()
    }

    /// Wipe the stored slot and start over from defaults.
    pub fn clear(&mut self) -> Result<(), ReaderError> {
        tracing::info!("Clearing all stored settings");
        self.store.clear()?;
        self.settings = Settings::default();
        Ok(())
    }
}

/// Stable encoding of a feed URL.
pub fn signature(url: &str) -> String {
    STANDARD.encode(url.as_bytes())
}
