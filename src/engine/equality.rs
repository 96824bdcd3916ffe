use crate::storage::Article;

/// Whether two records denote the same article across polls.
///
/// When both sides carry a non-empty guid the guids decide, even if the
/// links differ. Otherwise the links are compared.
pub fn articles_equal(first: &Article, second: &Article) -> bool {
    match (non_empty(&first.guid), non_empty(&second.guid)) {
        (Some(a), Some(b)) => a == b,
        _ => first.link == second.link,
    }
}

fn non_empty(guid: &Option<String>) -> Option<&str> {
    guid.as_deref().filter(|g| !g.is_empty())
}
