//! Loft Core - Foundational types for the Loft generation service
//!
//! This crate provides the types the other Loft crates depend on:
//! - `LoftError` / `Result` - the shared error taxonomy
//! - `ContentHash` - SHA-256 content hashing for stored assets
//! - `short_id` / `prefixed_id` - session and document identifiers
//! - `now_iso8601` - timestamp helper for document records

mod error;
mod hash;
mod id;
mod time;

pub use error::{LoftError, Result};
pub use hash::ContentHash;
pub use id::{prefixed_id, short_id};
pub use time::now_iso8601;
