//! A personal RSS reader built around a feed-merge engine.
//!
//! Polled feeds are merged into a locally persisted, newest-first article
//! list with per-article read flags and a per-feed unread counter. See
//! [`engine`] for the merge rules and [`reader::Reader`] for the state
//! handle that persists them.

pub mod config;
pub mod engine;
pub mod feed;
pub mod reader;
pub mod storage;
pub mod util;
