//! # storage-adapters
//!
//! Implementations of the document, media and change-feed ports.
//!
//! - `memory`: process-local document store, always compiled. Used by the
//!   tests and by `database.backend = "memory"`.
//! - `postgres`: sqlx-backed store (feature `db-postgres`).
//! - `media_local`: uploads on the local filesystem (feature `media-local`).
//! - `media_memory`: uploads held in memory.
//! - `feed`: in-process change notifications over a broadcast channel.

pub mod feed;
pub mod media_memory;
pub mod memory;

#[cfg(feature = "media-local")]
pub mod media_local;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use feed::BroadcastFeed;
pub use media_memory::MemoryMedia;
pub use memory::MemoryStore;

#[cfg(feature = "media-local")]
pub use media_local::LocalMediaStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;

/// Prefix under which thumbnails of stored media are served.
pub const THUMBNAIL_PREFIX: &str = "thumbs/";

pub(crate) const ALREADY_DELETED: &str = "This comment has already been deleted.";

/// Joins a public URL prefix and a media key without doubling slashes.
pub(crate) fn join_url(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key.trim_start_matches('/'))
}
