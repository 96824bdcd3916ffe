use std::fmt::Write;

use crate::storage::Article;

/// Derive a safe ID for an article from its guid, or its link when the
/// guid is absent or empty.
///
/// The source string is scanned as UTF-16 code units. ASCII letters, digits,
/// `-` and `:` are copied as-is; every other unit becomes `_` followed by its
/// decimal value, so a space is `_32` and a literal underscore is `_95`.
///
/// The result only contains `[A-Za-z0-9_:-]` but may start with a digit,
/// so prefix it before using it as a CSS identifier. It is not guaranteed
/// unique: `" 1"` and `"\u{141}"` both map to `_321`.
///
/// # Examples
///
/// ```
/// use rssreader::engine::safe_id;
/// use rssreader::storage::Article;
///
/// let article = Article::new("Title", "http://a.b/c d");
/// assert_eq!(safe_id(&article), "http:_47_47a_46b_47c_32d");
/// ```
pub fn safe_id(article: &Article) -> String {
    let source = match article.guid.as_deref() {
        Some(guid) if !guid.is_empty() => guid,
        _ => article.link.as_str(),
    };
    escape(source)
}

fn escape(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for unit in source.encode_utf16() {
        if is_safe(unit) {
            // Safe units are all ASCII
            out.push(char::from(unit as u8));
        } else {
            let _ = write!(out, "_{}", unit);
        }
    }
    out
}

fn is_safe(unit: u16) -> bool {
    matches!(unit, 48..=57 | 65..=90 | 97..=122 | 45 | 58)
}

/// Overwrite the article's guid with its safe ID.
pub fn resolve_identity(article: &mut Article) {
    article.guid = Some(safe_id(article));
}
