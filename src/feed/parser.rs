use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::engine::resolve_identity;
use crate::storage::{Article, FetchedFeed};

/// The document is not well-formed XML.
#[derive(Debug, Error)]
#[error("XML parse error: {0}")]
pub struct ParseError(String);

/// A feed document reduced to what the reader keeps, plus the element
/// counts the subscription check looks at.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub feed: FetchedFeed,
    pub channel_titles: usize,
    pub items: usize,
    pub item_titles: usize,
    pub item_descriptions: usize,
    pub item_links: usize,
}

/// Parse an RSS document into a [`FetchedFeed`].
///
/// `channel > title` becomes the feed title. Each `item` becomes an article
/// with its `title`, `description`, `link` and optional `guid` children
/// (absent children read as empty). Every article's guid is then replaced by
/// its safe ID.
pub fn parse_feed(bytes: &[u8]) -> Result<FetchedFeed, ParseError> {
    Ok(parse_document(bytes)?.feed)
}

pub fn parse_document(bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations, and
    // `unescape()` only resolves the five XML builtins.
    // Text and CDATA events are concatenated untrimmed; only the finished
    // field values are trimmed.
    let mut reader = Reader::from_reader(bytes);

    let mut doc = ParsedDocument::default();
    let mut title = String::new();
    let mut articles = Vec::new();
    let mut current: Option<Article> = None;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                open_element(&e, &path, &mut doc, &mut current);
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                open_element(&e, &path, &mut doc, &mut current);
                if e.name().as_ref() == b"item" {
                    if let Some(article) = current.take() {
                        articles.push(article);
                    }
                }
            }
            Ok(Event::End(e)) => {
                path.pop();
                if e.name().as_ref() == b"item" {
                    if let Some(article) = current.take() {
                        articles.push(article);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| ParseError(e.to_string()))?;
                append_text(&path, &text, &mut title, current.as_mut());
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e);
                append_text(&path, &text, &mut title, current.as_mut());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    for article in &mut articles {
        trim_in_place(&mut article.title);
        trim_in_place(&mut article.description);
        trim_in_place(&mut article.link);
        if let Some(guid) = article.guid.as_mut() {
            trim_in_place(guid);
        }
        resolve_identity(article);
    }
    trim_in_place(&mut title);

    doc.feed = FetchedFeed::new(title, articles);
    Ok(doc)
}

/// Bookkeeping for an opening (or self-closing) tag.
fn open_element(
    e: &BytesStart<'_>,
    path: &[Vec<u8>],
    doc: &mut ParsedDocument,
    current: &mut Option<Article>,
) {
    let parent = path.last().map(Vec::as_slice);
    match (parent, e.name().as_ref()) {
        (Some(b"channel"), b"title") => doc.channel_titles += 1,
        (_, b"item") => {
            doc.items += 1;
            *current = Some(Article::default());
        }
        (Some(b"item"), b"title") => doc.item_titles += 1,
        (Some(b"item"), b"description") => doc.item_descriptions += 1,
        (Some(b"item"), b"link") => doc.item_links += 1,
        (Some(b"item"), b"guid") => {
            if let Some(article) = current.as_mut() {
                article.guid.get_or_insert_with(String::new);
            }
        }
        _ => {}
    }
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}

fn append_text(path: &[Vec<u8>], text: &str, title: &mut String, current: Option<&mut Article>) {
    let [.., parent, field] = path else {
        return;
    };

    if parent.as_slice() == b"channel" && field.as_slice() == b"title" {
        title.push_str(text);
        return;
    }

    if parent.as_slice() != b"item" {
        return;
    }
    let Some(article) = current else {
        return;
    };
    match field.as_slice() {
        b"title" => article.title.push_str(text),
        b"description" => article.description.push_str(text),
        b"link" => article.link.push_str(text),
        b"guid" => article.guid.get_or_insert_with(String::new).push_str(text),
        _ => {}
    }
}
