mod store;
mod types;

pub use store::{JsonFileStore, MemoryStore, SettingsStore};
pub use types::{
    Article, Feed, FeedEntry, FetchSettings, FetchedFeed, Settings, StorageError,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_ARTICLES_PER_FEED,
};
