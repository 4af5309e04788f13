//! # Handlers
//!
//! Thin translation between HTTP and the view-model services: parse the
//! request, call one service operation, render the result or the mapped
//! user-facing failure.

pub mod auth;
pub mod comments;
pub mod media;
pub mod posts;
pub mod system;

use domains::DomainError;
use services::Action;
use uuid::Uuid;

use crate::error::ApiError;

/// Malformed ids name nothing, so they are reported as missing.
pub(crate) fn parse_id(raw: &str, entity: &'static str, action: Action) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::from_domain(action, DomainError::not_found(entity, raw)))
}
