use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use uuid::Uuid;

use sociofeed_auth::TokenError;

use crate::error::ApiError;
use crate::sessions::ACCESS_COOKIE;
use crate::state::AppState;

/// The caller's identity, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Resolved identity on routes that work with or without a session.
/// Bad or expired tokens are treated as anonymous.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Uuid>);

/// Access token from the `accessToken` cookie, falling back to a bearer header.
fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Rejects the request unless it carries a valid access token.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = access_token(&jar, req.headers()) else {
        warn!("No access token on {}", req.uri().path());
        return Err(ApiError::Unauthorized("Unauthorized: No token provided".into()));
    };

    let id = state.tokens.verify_access(&token).map_err(|e| match e {
        TokenError::Expired => {
            debug!("Expired access token on {}", req.uri().path());
            ApiError::TokenExpired("Unauthorized: Token expired".into())
        }
        other => {
            warn!("Rejected access token on {}: {}", req.uri().path(), other);
            ApiError::Unauthorized("Unauthorized: Invalid token".into())
        }
    })?;

    req.extensions_mut().insert(AuthUser { id });
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized: No token provided".into()))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(MaybeUser(Some(user.id)));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let id = access_token(&jar, &parts.headers)
            .and_then(|token| state.tokens.verify_access(&token).ok());
        Ok(MaybeUser(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(access_token(&jar, &headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(access_token(&jar, &headers).as_deref(), Some("abc"));

        let empty = HeaderMap::new();
        assert!(access_token(&CookieJar::from_headers(&empty), &empty).is_none());
    }
}
