//! HTTP rendering of domain failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{AuthFailure, DomainError};
use serde::Serialize;
use services::{user_message, Action};

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// A failure ready to go on the wire. `message` is always one of the fixed
/// user-facing strings; internal details are only logged.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: &'a str,
}

impl ApiError {
    pub fn from_domain(action: Action, err: DomainError) -> Self {
        let (status, code) = classify(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, ?action, "internal error");
        } else {
            tracing::debug!(error = %err, ?action, "request rejected");
        }
        Self { status, code, message: user_message(action, &err) }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "validation", message: message.into() }
    }

    pub fn body(&self) -> ErrorBody<'_> {
        ErrorBody { code: self.code, message: &self.message }
    }
}

/// Adapter for `map_err`: `.map_err(fail(Action::CreatePost))?`.
pub fn fail(action: Action) -> impl FnOnce(DomainError) -> ApiError {
    move |err| ApiError::from_domain(action, err)
}

fn classify(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation"),
        DomainError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        DomainError::NotFound(..) => (StatusCode::NOT_FOUND, "not-found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::Auth(failure) => {
            let status = match failure {
                AuthFailure::InvalidEmail | AuthFailure::WeakPassword => StatusCode::BAD_REQUEST,
                AuthFailure::UserNotFound
                | AuthFailure::WrongPassword
                | AuthFailure::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthFailure::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
                AuthFailure::EmailAlreadyInUse => StatusCode::CONFLICT,
            };
            (status, failure.code())
        }
        DomainError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_failure_kind() {
        let e = ApiError::from_domain(Action::SignIn, AuthFailure::TooManyRequests.into());
        assert_eq!(e.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(e.code, "auth/too-many-requests");

        let e = ApiError::from_domain(Action::DeletePost, DomainError::Forbidden("x".into()));
        assert_eq!(e.status, StatusCode::FORBIDDEN);

        let e = ApiError::from_domain(Action::LoadPost, DomainError::not_found("Post", "1"));
        assert_eq!((e.status, e.message.as_str()), (StatusCode::NOT_FOUND, "This post no longer exists."));
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let e = ApiError::from_domain(Action::CreatePost, DomainError::internal("pool timed out"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.message.contains("pool"));
    }
}
