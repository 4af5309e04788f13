//! `AuthProvider` over a credential store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domains::{
    AuthFailure, AuthProvider, AuthUser, Credential, CredentialRepository, DomainError, Result,
    Session,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::lockout::{AttemptTracker, LockoutPolicy};
use crate::password::{hash_password, verify_password};
use crate::tokens::TokenIssuer;

pub struct PasswordAuthProvider {
    credentials: Arc<dyn CredentialRepository>,
    tokens: Arc<dyn TokenIssuer>,
    attempts: AttemptTracker,
}

impl PasswordAuthProvider {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        tokens: Arc<dyn TokenIssuer>,
        policy: LockoutPolicy,
    ) -> Self {
        Self { credentials, tokens, attempts: AttemptTracker::new(policy) }
    }

    fn session_for(&self, user: AuthUser) -> Result<Session> {
        let (token, expires_at) = self.tokens.issue(&user, Utc::now())?;
        Ok(Session { token, user, expires_at })
    }
}

/// Emails are compared case-insensitively.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for PasswordAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        if self.credentials.find_by_email(&email).await?.is_some() {
            return Err(AuthFailure::EmailAlreadyInUse.into());
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(DomainError::internal)??;

        let credential = Credential {
            user_id: Uuid::now_v7(),
            email: email.clone(),
            password_hash,
            created_at: Utc::now(),
        };
        let user_id = credential.user_id;
        // A concurrent sign-up may win between the lookup and the insert.
        match self.credentials.insert(credential).await {
            Err(DomainError::Conflict(_)) => return Err(AuthFailure::EmailAlreadyInUse.into()),
            other => other?,
        }

        info!(%user_id, "credential created");
        self.session_for(AuthUser { id: user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let now = Utc::now();
        if self.attempts.is_locked(&email, now) {
            warn!(email = %email, "sign-in rejected while locked out");
            return Err(AuthFailure::TooManyRequests.into());
        }

        let Some(credential) = self.credentials.find_by_email(&email).await? else {
            self.attempts.record_failure(&email, now);
            return Err(AuthFailure::UserNotFound.into());
        };

        let password = password.to_string();
        let hash = credential.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(DomainError::internal)?;
        if !verified {
            let failures = self.attempts.record_failure(&email, now);
            warn!(user_id = %credential.user_id, failures, "wrong password");
            return Err(AuthFailure::WrongPassword.into());
        }

        self.attempts.clear(&email);
        self.session_for(AuthUser { id: credential.user_id, email })
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        self.tokens.revoke(token, Utc::now());
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<AuthUser> {
        self.tokens.verify(token, Utc::now())
    }
}
