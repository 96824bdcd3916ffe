use crate::storage::{Article, Feed, FetchedFeed};

use super::equality::articles_equal;

/// What a merge did to the stored feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First successful fetch, the payload became the feed as-is.
    Adopted { articles: usize },
    /// The payload carried no articles. Read flags and the unread counter
    /// were still normalized.
    Unchanged,
    /// New articles were prepended and the list truncated to the cap.
    Merged { new_articles: usize, evicted: usize },
}

impl MergeOutcome {
    pub fn new_articles(&self) -> usize {
        match self {
            MergeOutcome::Adopted { articles } => *articles,
            MergeOutcome::Unchanged => 0,
            MergeOutcome::Merged { new_articles, .. } => *new_articles,
        }
    }
}

/// Merge a freshly fetched payload into the stored feed slot.
///
/// An empty slot adopts the payload verbatim, without touching read flags
/// or the counter. Otherwise:
///
/// 1. Stored articles lacking a read flag are marked read, and the unread
///    counter is recomputed from the list, discarding the stored value.
/// 2. A payload without articles stops here.
/// 3. Fetched articles are taken in order until one equals the newest stored
///    article. Those are marked unread and prepended.
/// 4. The list is cut to `max_articles` and the title replaced.
///
/// After step 1 the counter always equals the number of articles whose flag
/// is `false`, including after truncation.
pub fn merge_feed(
    slot: &mut Option<Feed>,
    fetched: FetchedFeed,
    max_articles: usize,
) -> MergeOutcome {
    let feed = match slot {
        Some(feed) => feed,
        None => {
            let articles = fetched.articles.unwrap_or_default();
            let count = articles.len();
            *slot = Some(Feed {
                title: fetched.title,
                articles,
                unread_count: 0,
            });
            return MergeOutcome::Adopted { articles: count };
        }
    };

    normalize_read_flags(feed);

    let Some(fetched_articles) = fetched.articles else {
        tracing::debug!(title = %feed.title, "Fetch carried no articles, leaving feed untouched");
        return MergeOutcome::Unchanged;
    };

    let new_articles = collect_new_articles(feed.articles.first(), fetched_articles);
    let new_count = new_articles.len();

    let mut articles = new_articles;
    articles.append(&mut feed.articles);

    let evicted = articles.len().saturating_sub(max_articles);
    articles.truncate(max_articles);

    feed.articles = articles;
    feed.unread_count = feed.count_unread();
    feed.title = fetched.title;

    tracing::debug!(
        title = %feed.title,
        new = new_count,
        evicted = evicted,
        unread = feed.unread_count,
        "Merged feed"
    );

    MergeOutcome::Merged {
        new_articles: new_count,
        evicted,
    }
}

/// Backfill missing flags as read and recount unread articles from scratch.
fn normalize_read_flags(feed: &mut Feed) {
    for article in &mut feed.articles {
        if article.read.is_none() {
            article.read = Some(true);
        }
    }
    feed.unread_count = feed.count_unread();
}

/// The prefix of `fetched` that precedes the newest stored article. With no
/// stored article every fetched one is new.
fn collect_new_articles(latest: Option<&Article>, fetched: Vec<Article>) -> Vec<Article> {
    fetched
        .into_iter()
        .take_while(|candidate| !latest.is_some_and(|latest| articles_equal(latest, candidate)))
        .map(|mut article| {
            article.read = Some(false);
            article
        })
        .collect()
}
