//! In-memory normalized store for a GraphQL client cache.
//!
//! A [`storage::RecordStore`] keeps every record fetched by the client under
//! its id, memoizes root calls, and tracks connection ranges page by page.
//! Writes are made through a [`storage::RecordWriter`] that is either
//! committed (server truth, reported to an optional persistence collaborator)
//! or optimistic (speculative, tagged with a client mutation id).

#![warn(missing_docs)]

pub mod storage;
pub mod types;
