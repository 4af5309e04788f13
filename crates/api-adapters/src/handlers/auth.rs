//! Sign-up, sign-in, sign-out and the current user's profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{AuthUser, Session, UserProfile};
use serde::{Deserialize, Serialize};
use services::Action;

use crate::error::{fail, ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    /// The client routes to nickname setup while this is true.
    pub needs_nickname: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub profile: UserProfile,
    pub needs_nickname: bool,
}

#[derive(Debug, Deserialize)]
pub struct NicknameRequest {
    #[serde(default)]
    pub nickname: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .auth
        .sign_up(&body.email, &body.password)
        .await
        .map_err(fail(Action::SignUp))?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse { session, needs_nickname: true }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> ApiResult<SessionResponse> {
    let result = state.auth.sign_in(&body.email, &body.password).await;
    state.metrics.record_sign_in(result.is_ok());
    let session = result.map_err(fail(Action::SignIn))?;

    let needs_nickname = state
        .auth
        .needs_nickname(&session.user)
        .await
        .map_err(fail(Action::LoadProfile))?;
    Ok(Json(SessionResponse { session, needs_nickname }))
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .sign_out(&current.token)
        .await
        .map_err(fail(Action::SignOut))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, current: CurrentUser) -> ApiResult<MeResponse> {
    let profile = state
        .auth
        .profile(&current.user)
        .await
        .map_err(fail(Action::LoadProfile))?;
    let needs_nickname = !profile.is_onboarded();
    Ok(Json(MeResponse { user: current.user, profile, needs_nickname }))
}

pub async fn set_nickname(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<NicknameRequest>,
) -> ApiResult<UserProfile> {
    let profile = state
        .auth
        .set_nickname(&current.user, &body.nickname)
        .await
        .map_err(fail(Action::SetNickname))?;
    Ok(Json(profile))
}
