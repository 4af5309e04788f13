//! Sign-up, sign-in, sign-out and nickname onboarding.

use chrono::Utc;
use domains::validation::{require_text, validate_email, validate_password};
use domains::{AuthUser, ChangeEvent, DomainError, Result, Session, UserProfile};
use tracing::info;

use crate::Backend;

const MISSING_CREDENTIALS: &str = "Please enter both email and password.";

#[derive(Clone)]
pub struct AuthService {
    backend: Backend,
}

impl AuthService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Creates the account and its (nickname-less) profile document.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let (email, password) = trimmed_credentials(email, password)?;
        validate_email(email)?;
        validate_password(password)?;

        let session = self.backend.auth.sign_up(email, password).await?;
        self.backend
            .users
            .upsert(UserProfile::new(session.user.id, session.user.email.clone(), Utc::now()))
            .await?;

        info!(user_id = %session.user.id, "user registered");
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let (email, password) = trimmed_credentials(email, password)?;
        validate_email(email)?;

        let session = self.backend.auth.sign_in(email, password).await?;
        // Accounts created outside sign_up have no profile yet.
        if self.backend.users.get(session.user.id).await?.is_none() {
            self.backend
                .users
                .upsert(UserProfile::new(session.user.id, session.user.email.clone(), Utc::now()))
                .await?;
        }

        info!(user_id = %session.user.id, "user signed in");
        Ok(session)
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        self.backend.auth.sign_out(token).await
    }

    /// Resolves a session token to the signed-in user.
    pub async fn current_user(&self, token: &str) -> Result<AuthUser> {
        if token.trim().is_empty() {
            return Err(DomainError::Unauthorized("missing session token".into()));
        }
        self.backend.auth.verify(token).await
    }

    /// The stored profile, or a fresh one when the document does not exist yet.
    pub async fn profile(&self, user: &AuthUser) -> Result<UserProfile> {
        Ok(self
            .backend
            .users
            .get(user.id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user.id, user.email.clone(), Utc::now())))
    }

    pub async fn needs_nickname(&self, user: &AuthUser) -> Result<bool> {
        Ok(!self.profile(user).await?.is_onboarded())
    }

    /// Merges a nickname into the profile, creating the document if needed.
    pub async fn set_nickname(&self, user: &AuthUser, nickname: &str) -> Result<UserProfile> {
        let nickname = require_text(nickname, "Please enter a nickname.")?;

        let mut profile = self.profile(user).await?;
        profile.nickname = Some(nickname);
        profile.updated_at = Some(Utc::now());
        self.backend.users.upsert(profile.clone()).await?;

        // Lists render author nicknames.
        self.backend.feed.publish(ChangeEvent::PostsChanged);
        info!(user_id = %user.id, "nickname set");
        Ok(profile)
    }
}

fn trimmed_credentials<'a>(email: &'a str, password: &'a str) -> Result<(&'a str, &'a str)> {
    let (email, password) = (email.trim(), password.trim());
    if email.is_empty() || password.is_empty() {
        return Err(DomainError::validation(MISSING_CREDENTIALS));
    }
    Ok((email, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{user, Mocks};
    use domains::AuthFailure;
    use mockall::predicate::eq;

    fn session_for(u: &AuthUser) -> Session {
        Session {
            token: "tok".into(),
            user: u.clone(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn sign_up_trims_and_creates_profile() {
        let u = user("neo@matrix.io");
        let mut m = Mocks::new();
        let s = session_for(&u);
        m.auth
            .expect_sign_up()
            .with(eq("neo@matrix.io"), eq("secret1"))
            .times(1)
            .returning(move |_, _| Ok(s.clone()));
        let uid = u.id;
        m.users
            .expect_upsert()
            .withf(move |p| p.id == uid && p.email == "neo@matrix.io" && p.nickname.is_none())
            .times(1)
            .returning(|_| Ok(()));

        let svc = AuthService::new(m.into_backend());
        let session = svc.sign_up("  neo@matrix.io ", " secret1 ").await.unwrap();
        assert_eq!(session.user.id, u.id);
    }

    #[tokio::test]
    async fn sign_up_rejects_weak_password_before_calling_provider() {
        let mut m = Mocks::new();
        m.auth.expect_sign_up().never();
        let svc = AuthService::new(m.into_backend());

        let err = svc.sign_up("neo@matrix.io", "123").await.unwrap_err();
        assert!(matches!(err, DomainError::Auth(AuthFailure::WeakPassword)));
    }

    #[tokio::test]
    async fn blank_credentials_are_a_validation_error() {
        let svc = AuthService::new(Mocks::new().into_backend());
        let err = svc.sign_in("   ", "pw").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(m) if m == MISSING_CREDENTIALS));
    }

    #[tokio::test]
    async fn sign_in_backfills_missing_profile() {
        let u = user("trinity@matrix.io");
        let mut m = Mocks::new();
        let s = session_for(&u);
        m.auth.expect_sign_in().returning(move |_, _| Ok(s.clone()));
        m.users.expect_get().returning(|_| Ok(None));
        m.users.expect_upsert().times(1).returning(|_| Ok(()));

        let svc = AuthService::new(m.into_backend());
        svc.sign_in("trinity@matrix.io", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn nickname_onboarding() {
        let u = user("morpheus@matrix.io");
        let mut m = Mocks::new();
        let uid = u.id;
        let email = u.email.clone();
        m.users.expect_get().returning(move |_| {
            Ok(Some(UserProfile::new(uid, email.clone(), Utc::now())))
        });
        m.users
            .expect_upsert()
            .withf(|p| p.nickname.as_deref() == Some("Morpheus") && p.updated_at.is_some())
            .times(1)
            .returning(|_| Ok(()));

        let svc = AuthService::new(m.into_backend());
        assert!(svc.needs_nickname(&u).await.unwrap());
        let profile = svc.set_nickname(&u, "  Morpheus  ").await.unwrap();
        assert!(profile.is_onboarded());
    }

    #[tokio::test]
    async fn blank_nickname_is_rejected() {
        let u = user("smith@matrix.io");
        let mut m = Mocks::new();
        m.users.expect_upsert().never();
        let svc = AuthService::new(m.into_backend());
        assert!(matches!(
            svc.set_nickname(&u, "   ").await,
            Err(DomainError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn empty_token_is_unauthorized() {
        let mut m = Mocks::new();
        m.auth.expect_verify().never();
        let svc = AuthService::new(m.into_backend());
        assert!(matches!(svc.current_user("").await, Err(DomainError::Unauthorized(_))));
    }
}
