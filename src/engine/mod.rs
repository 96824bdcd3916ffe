//! Feed-merge and article-identity engine.
//!
//! Pure operations over the stored feed state:
//!
//! - [`safe_id`] - restricted-charset identifier from an article's guid or link
//! - [`articles_equal`] - "same article across polls" (guid first, link fallback)
//! - [`merge_feed`] - fold a fetched payload into a stored feed, honoring the
//!   retention cap and keeping the unread counter exact
//! - [`mark_read`] - flip one article to read and decrement the counter
//!
//! Nothing here performs I/O. Callers own the state and decide when to
//! persist it (see [`crate::reader::Reader`]).

mod equality;
mod identity;
mod merge;
mod read_state;

pub use equality::articles_equal;
pub use identity::{resolve_identity, safe_id};
pub use merge::{merge_feed, MergeOutcome};
pub use read_state::mark_read;
