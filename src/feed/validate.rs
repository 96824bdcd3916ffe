use thiserror::Error;

use super::parser::{parse_document, ParseError};
use crate::storage::FetchedFeed;

/// Why a document was refused as a subscription.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Expected exactly one channel title, found {0}")]
    ChannelTitle(usize),

    #[error("Feed contains no items")]
    NoItems,

    #[error("Feed items have no title")]
    NoItemTitle,

    #[error("Feed items have no description")]
    NoItemDescription,

    #[error("Feed items have no link")]
    NoItemLink,
}

/// Check that `bytes` look like a usable RSS feed and return the parsed
/// payload.
///
/// Requires exactly one `channel > title`, at least one `item`, and at least
/// one `item > title`, `item > description` and `item > link`.
pub fn validate_feed(bytes: &[u8]) -> Result<FetchedFeed, ValidationError> {
    let doc = parse_document(bytes)?;

    let failure = if doc.channel_titles != 1 {
        Some(ValidationError::ChannelTitle(doc.channel_titles))
    } else if doc.items == 0 {
        Some(ValidationError::NoItems)
    } else if doc.item_titles == 0 {
        Some(ValidationError::NoItemTitle)
    } else if doc.item_descriptions == 0 {
        Some(ValidationError::NoItemDescription)
    } else if doc.item_links == 0 {
        Some(ValidationError::NoItemLink)
    } else {
        None
    };

    match failure {
        Some(e) => {
            tracing::debug!(error = %e, "Feed validation failed");
            Err(e)
        }
        None => Ok(doc.feed),
    }
}
