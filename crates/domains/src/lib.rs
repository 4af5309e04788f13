//! community-board/crates/domains/src/lib.rs
//!
//! The central domain types and port definitions for the community board.
//! Nothing in this crate performs I/O: adapters implement the ports,
//! services orchestrate them.

pub mod error;
pub mod events;
pub mod models;
pub mod ports;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use events::*;
pub use models::*;
pub use ports::*;
