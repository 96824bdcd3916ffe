use crate::storage::Feed;

/// Mark one article of `feed` as read.
///
/// Returns `Some(true)` when the flag changed and the counter was
/// decremented, `Some(false)` when the article was already read, and `None`
/// when `article_index` is out of range. Only a change needs persisting.
///
/// An article with no flag yet (first fetch) counts as unread here. The
/// counter never goes below zero.
pub fn mark_read(feed: &mut Feed, article_index: usize) -> Option<bool> {
    let article = feed.articles.get_mut(article_index)?;
    if article.is_read() {
        return Some(false);
    }

    article.read = Some(true);
    feed.unread_count = feed.unread_count.saturating_sub(1);
    Some(true)
}
