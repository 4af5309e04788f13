//! # community-board
//!
//! Startup wiring shared by the server and the seed tool: tracing setup and
//! assembly of the backend ports selected by configuration and features.

pub mod telemetry;
pub mod wiring;
