//! Bearer token extractor.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use formcraft_core::AuthContext;
use formcraft_store::StoreError;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// The authenticated caller.
///
/// The token's user is reloaded on every request so deactivation and role
/// changes take effect before the token expires.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub AuthContext);

fn bearer_token(parts: &Parts) -> Result<&str> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::Unauthorized("malformed authorization header".to_string()));
    }
    Ok(token.trim())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let claims = state.jwt.verify(bearer_token(parts)?)?;

        let user = match state.store.get_user(claims.tenant_id, claims.sub).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                return Err(AppError::Unauthorized("user no longer exists".to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !user.is_active {
            tracing::warn!(user_id = %user.id, tenant_id = %user.tenant_id, "deactivated user presented a token");
            return Err(AppError::Unauthorized("account is deactivated".to_string()));
        }

        Ok(AuthUser(AuthContext::for_user(&user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/forms");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert_eq!(bearer_token(&parts(Some("bearer  abc"))).unwrap(), "abc");
        assert!(bearer_token(&parts(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer"))).is_err());
        assert!(bearer_token(&parts(None)).is_err());
    }
}
