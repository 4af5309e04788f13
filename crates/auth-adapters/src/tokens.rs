//! Session token issuing and verification.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use domains::{AuthFailure, AuthUser, Result};

/// Issues, verifies and revokes bearer tokens.
pub trait TokenIssuer: Send + Sync {
    /// Returns the token and its expiry.
    fn issue(&self, user: &AuthUser, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)>;
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser>;
    /// Revoking an unknown or malformed token is a no-op.
    fn revoke(&self, token: &str, now: DateTime<Utc>);
}

/// Random tokens kept in a map. Sessions do not survive a restart.
pub struct OpaqueTokens {
    ttl: Duration,
    sessions: DashMap<String, (AuthUser, DateTime<Utc>)>,
}

impl OpaqueTokens {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: DashMap::new() }
    }
}

impl TokenIssuer for OpaqueTokens {
    fn issue(&self, user: &AuthUser, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let token = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
        let expires_at = now + self.ttl;
        self.sessions.insert(token.clone(), (user.clone(), expires_at));
        Ok((token, expires_at))
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser> {
        match self.sessions.get(token) {
            Some(entry) if entry.1 > now => Ok(entry.0.clone()),
            _ => Err(AuthFailure::InvalidToken.into()),
        }
    }

    fn revoke(&self, token: &str, now: DateTime<Utc>) {
        self.sessions.remove(token);
        self.sessions.retain(|_, (_, exp)| *exp > now);
    }
}

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtTokens;

#[cfg(feature = "auth-jwt")]
mod jwt {
    use super::*;
    use domains::DomainError;
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Serialize, Deserialize)]
    struct Claims {
        sub: Uuid,
        email: String,
        jti: String,
        iat: i64,
        exp: i64,
    }

    /// HS256-signed tokens. Sign-out records the token id until it expires.
    pub struct JwtTokens {
        encoding: EncodingKey,
        decoding: DecodingKey,
        ttl: Duration,
        revoked: DashMap<String, i64>,
    }

    impl JwtTokens {
        pub fn new(secret: &[u8], ttl: Duration) -> Self {
            Self {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl,
                revoked: DashMap::new(),
            }
        }

        /// Signature and shape only; expiry is checked against the caller's clock.
        fn decode(&self, token: &str) -> Option<Claims> {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_exp = false;
            decode::<Claims>(token, &self.decoding, &validation)
                .ok()
                .map(|data| data.claims)
        }
    }

    impl TokenIssuer for JwtTokens {
        fn issue(&self, user: &AuthUser, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
            let expires_at = now + self.ttl;
            let claims = Claims {
                sub: user.id,
                email: user.email.clone(),
                jti: Uuid::new_v4().to_string(),
                iat: now.timestamp(),
                exp: expires_at.timestamp(),
            };
            let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
                .map_err(|e| DomainError::internal(format!("token signing failed: {e}")))?;
            Ok((token, expires_at))
        }

        fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser> {
            let claims = self.decode(token).ok_or(AuthFailure::InvalidToken)?;
            if claims.exp <= now.timestamp() || self.revoked.contains_key(&claims.jti) {
                return Err(AuthFailure::InvalidToken.into());
            }
            Ok(AuthUser { id: claims.sub, email: claims.email })
        }

        fn revoke(&self, token: &str, now: DateTime<Utc>) {
            if let Some(claims) = self.decode(token) {
                self.revoked.insert(claims.jti, claims.exp);
            }
            let now = now.timestamp();
            self.revoked.retain(|_, exp| *exp > now);
        }
    }
}
