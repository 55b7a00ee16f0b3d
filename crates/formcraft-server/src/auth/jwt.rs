//! Access tokens.
//!
//! HS256 JWTs carrying:
//! - `sub`: user id
//! - `tenant_id`: tenant the user belongs to
//! - `role`: role at issue time
//! - `iat` / `exp`: Unix timestamps
//! - `iss`: configured issuer
//!
//! ```json
//! {
//!   "sub": "5b0c…",
//!   "tenant_id": "9e1f…",
//!   "role": "editor",
//!   "iat": 1735603200,
//!   "exp": 1735689600,
//!   "iss": "formcraft"
//! }
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formcraft_core::{Role, User};

use crate::error::{AppError, Result};

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Keys for an HMAC secret.
    pub fn new(secret: &[u8], ttl: Duration, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 30;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            issuer,
        }
    }

    /// Issue a token for `user`.
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AppError::Internal(format!("invalid token ttl: {e}")))?;
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;
        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at),
        })
    }

    /// Verify signature, issuer, and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected access token");
                AppError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn user() -> User {
        User::new(Uuid::new_v4(), "a@b.io", "A", Role::Editor, "hash")
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = JwtKeys::new(SECRET, Duration::from_secs(3600), "formcraft");
        let user = user();
        let issued = keys.issue(&user).unwrap();
        let claims = keys.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, user.tenant_id);
        assert_eq!(claims.role, Role::Editor);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new(SECRET, Duration::from_secs(3600), "formcraft");
        let other = JwtKeys::new(b"another-secret-another-secret-xx", Duration::from_secs(3600), "formcraft");
        let issued = other.issue(&user()).unwrap();
        assert!(matches!(keys.verify(&issued.token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let keys = JwtKeys::new(SECRET, Duration::from_secs(3600), "formcraft");
        let other = JwtKeys::new(SECRET, Duration::from_secs(3600), "someone-else");
        let issued = other.issue(&user()).unwrap();
        assert!(keys.verify(&issued.token).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let keys = JwtKeys::new(SECRET, Duration::from_secs(3600), "formcraft");
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::Viewer,
            iat: now - 7200,
            exp: now - 3600,
            iss: "formcraft".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(keys.verify(&token).is_err());
    }
}
