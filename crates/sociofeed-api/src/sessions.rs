//! Refresh-token persistence and the auth cookies.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sociofeed_auth::{TokenError, TokenPair};

use crate::error::{ApiError, ApiResult};
use crate::state::AppStateInner;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Issues a token pair and records the refresh token.
pub fn start(state: &AppStateInner, user_id: Uuid) -> ApiResult<TokenPair> {
    let pair = state.tokens.issue_pair(user_id)?;
    state
        .db
        .insert_refresh_token(&pair.refresh_token, user_id, pair.refresh_expires_at)?;
    info!("Session started for user {}", user_id);
    Ok(pair)
}

/// Exchanges a stored, unexpired refresh token for a new access token.
pub fn refresh(state: &AppStateInner, refresh_token: &str) -> ApiResult<String> {
    let user_id = state.tokens.verify_refresh(refresh_token).map_err(|e| match e {
        TokenError::Expired => ApiError::TokenExpired("Refresh token expired".into()),
        other => {
            warn!("Rejected refresh token: {}", other);
            ApiError::Unauthorized("Invalid refresh token".into())
        }
    })?;

    let Some(row) = state.db.get_refresh_token(refresh_token)? else {
        warn!("Refresh token for user {} is not on record", user_id);
        return Err(ApiError::Unauthorized("Invalid refresh token".into()));
    };

    if row.user_id != user_id {
        warn!("Refresh token subject does not match its stored owner");
        return Err(ApiError::Unauthorized("Invalid refresh token".into()));
    }

    if row.expires_at <= Utc::now() {
        state.db.delete_refresh_token(refresh_token)?;
        return Err(ApiError::TokenExpired("Refresh token expired".into()));
    }

    debug!("Access token refreshed for user {}", user_id);
    Ok(state.tokens.issue_access(user_id)?)
}

/// Deletes every stored copy of the token. Unknown tokens are not an error.
pub fn revoke(state: &AppStateInner, refresh_token: &str) -> ApiResult<usize> {
    let removed = state.db.delete_refresh_token(refresh_token)?;
    debug!("Revoked {} refresh token row(s)", removed);
    Ok(removed)
}

pub fn access_cookie(state: &AppStateInner, token: &str) -> String {
    cookie(ACCESS_COOKIE, token, state.tokens.access_ttl(), state.settings.cookie_secure)
}

pub fn refresh_cookie(state: &AppStateInner, token: &str) -> String {
    cookie(REFRESH_COOKIE, token, state.tokens.refresh_ttl(), state.settings.cookie_secure)
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    cookie(name, "", Duration::zero(), secure)
}

fn cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let mut out = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        value,
        max_age.num_seconds().max(0)
    );
    if secure {
        out.push_str("; Secure");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            cookie("accessToken", "abc", Duration::minutes(15), true),
            "accessToken=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=900; Secure"
        );
        assert_eq!(
            clear_cookie("refreshToken", false),
            "refreshToken=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }
}
