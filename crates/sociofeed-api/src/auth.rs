use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};
use uuid::Uuid;

use sociofeed_auth::{hash_password, verify_password};
use sociofeed_db::DbError;
use sociofeed_db::models::NewUser;
use sociofeed_types::api::{
    ActivateRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RefreshResponse, RegisterRequest, ResetPasswordRequest,
};
use sociofeed_types::models::Account;

use crate::error::{ApiError, ApiResult};
use crate::mailer::{activation_email, reset_email};
use crate::middleware::AuthUser;
use crate::sessions::{self, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::state::{AppState, blocking};
use crate::validation::{
    Errors, JsonBody, check_email, check_registration_password, check_reset_password,
    check_username, present,
};
use crate::views;

const DUPLICATE_ACCOUNT: &str = "Username or email already exists";
const BAD_CREDENTIALS: &str = "Invalid email or password";
const BAD_RESET_TOKEN: &str = "Invalid or expired token";

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = Errors::default();
    check_username(req.username.as_deref(), &mut errors);
    check_email(req.email.as_deref(), &mut errors);
    check_registration_password(req.password.as_deref(), &mut errors);
    match req.confirm_password.as_deref().filter(|c| !c.is_empty()) {
        None => errors.push("Confirm password is required"),
        Some(confirm) if Some(confirm) != req.password.as_deref() => {
            errors.push("Passwords must match")
        }
        Some(_) => {}
    }
    errors.into_result()?;

    let username = present(req.username.as_deref()).unwrap_or_default().to_string();
    let email = present(req.email.as_deref()).unwrap_or_default().to_lowercase();
    let password = req.password.unwrap_or_default();
    let user_id = Uuid::new_v4();

    let (email, token) = blocking(&state, move |s| {
        if s.db.find_user_by_username_or_email(&username, &email)?.is_some() {
            return Err(ApiError::conflict(DUPLICATE_ACCOUNT));
        }

        let token = s.tokens.issue_activation(user_id)?;
        let password_hash = hash_password(&password)?;
        s.db
            .create_user(&NewUser {
                id: user_id,
                username: &username,
                email: &email,
                password_hash: &password_hash,
            })
            .map_err(|e| match e {
                // Lost a race with a concurrent registration.
                DbError::Conflict(_) => ApiError::conflict(DUPLICATE_ACCOUNT),
                other => other.into(),
            })?;

        info!("Registered user {} ({})", username, user_id);
        Ok((email, token))
    })
    .await?;

    let link = state.activation_link(&token);
    if let Err(e) = state.mailer.send(activation_email(&email, &link)).await {
        error!("Activation email to {} failed: {}", email, e);
        blocking(&state, move |s| Ok(s.db.delete_user(user_id)?)).await?;
        return Err(ApiError::Delivery("Failed to send activation email".into()));
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Registration successful. Check your email to activate your account.",
        )),
    ))
}

/// POST /api/auth/activate
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ActivateRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Some(token) = present(req.token.as_deref()).map(str::to_string) else {
        return Err(ApiError::Validation(vec!["Activation token is required".into()]));
    };

    let user_id = state.tokens.verify_activation(&token).map_err(|e| {
        warn!("Activation token rejected: {}", e);
        ApiError::InvalidToken("Invalid or expired activation token".into())
    })?;

    blocking(&state, move |s| {
        if s.db.get_user_by_id(user_id)?.is_none() {
            return Err(ApiError::InvalidToken("Account no longer exists".into()));
        }
        if !s.db.activate_user(user_id)? {
            return Err(ApiError::InvalidToken("Account already activated".into()));
        }
        info!("Activated user {}", user_id);
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse::new("Account activated successfully")))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Response> {
    let mut errors = Errors::default();
    check_email(req.email.as_deref(), &mut errors);
    if req.password.as_deref().is_none_or(str::is_empty) {
        errors.push("Password is required");
    }
    errors.into_result()?;

    let email = present(req.email.as_deref()).unwrap_or_default().to_lowercase();
    let password = req.password.unwrap_or_default();

    let (user, pair, access_cookie, refresh_cookie) = blocking(&state, move |s| {
        let Some(user) = s.db.get_user_by_email(&email)? else {
            warn!("Login for unknown email {}", email);
            return Err(ApiError::InvalidCredentials(BAD_CREDENTIALS.into()));
        };
        if !verify_password(&password, &user.password_hash)? {
            warn!("Wrong password for user {}", user.id);
            return Err(ApiError::InvalidCredentials(BAD_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(ApiError::NotActivated(
                "Account not activated. Check your email.".into(),
            ));
        }

        let pair = sessions::start(s, user.id)?;
        let access_cookie = sessions::access_cookie(s, &pair.access_token);
        let refresh_cookie = sessions::refresh_cookie(s, &pair.refresh_token);
        Ok((user, pair, access_cookie, refresh_cookie))
    })
    .await?;

    let body = LoginResponse {
        message: "Login successful".into(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: views::account(user),
    };

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, access_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
        Json(body),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser { id }: AuthUser,
) -> ApiResult<Json<Account>> {
    let user = blocking(&state, move |s| Ok(s.db.get_user_by_id(id)?)).await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(views::account(user)))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> ApiResult<Response> {
    if let Some(token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) {
        if !token.is_empty() {
            blocking(&state, move |s| sessions::revoke(s, &token)).await?;
        }
    }

    let secure = state.settings.cookie_secure;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, sessions::clear_cookie(ACCESS_COOKIE, secure)),
            (header::SET_COOKIE, sessions::clear_cookie(REFRESH_COOKIE, secure)),
        ]),
        Json(MessageResponse::new("Logged out successfully")),
    )
        .into_response())
}

/// POST /api/auth/refresh-token
pub async fn refresh_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let secure = state.settings.cookie_secure;
    let clear = AppendHeaders([
        (header::SET_COOKIE, sessions::clear_cookie(ACCESS_COOKIE, secure)),
        (header::SET_COOKIE, sessions::clear_cookie(REFRESH_COOKIE, secure)),
    ]);

    let Some(token) = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
    else {
        return (clear, ApiError::Unauthorized("Refresh token missing".into())).into_response();
    };

    let result = blocking(&state, move |s| {
        let access = sessions::refresh(s, &token)?;
        let cookie = sessions::access_cookie(s, &access);
        Ok((access, cookie))
    })
    .await;

    match result {
        Ok((access_token, cookie)) => (
            AppendHeaders([(header::SET_COOKIE, cookie)]),
            Json(RefreshResponse { access_token }),
        )
            .into_response(),
        Err(e) => (clear, e).into_response(),
    }
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut errors = Errors::default();
    check_email(req.email.as_deref(), &mut errors);
    errors.into_result()?;

    let email = present(req.email.as_deref()).unwrap_or_default().to_lowercase();

    let (email, token) = blocking(&state, move |s| {
        let Some(user) = s.db.get_user_by_email(&email)? else {
            return Err(ApiError::not_found("User not found"));
        };
        let token = s.tokens.issue_reset(&user.email)?;
        s.db.set_reset_token(user.id, &token)?;
        info!("Issued password reset for user {}", user.id);
        Ok((user.email, token))
    })
    .await?;

    let link = state.reset_link(&token);
    if let Err(e) = state.mailer.send(reset_email(&email, &link)).await {
        // The stored token stays valid; a retry supersedes it.
        error!("Reset email to {} failed: {}", email, e);
        return Err(ApiError::Delivery("Failed to send reset email".into()));
    }

    Ok(Json(MessageResponse::new("Password reset link sent to your email.")))
}

/// POST /api/auth/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let mut errors = Errors::default();
    check_reset_password(req.password.as_deref(), &mut errors);
    errors.into_result()?;

    let email = state.tokens.verify_reset(&token).map_err(|e| {
        warn!("Reset token rejected: {}", e);
        ApiError::InvalidToken(BAD_RESET_TOKEN.into())
    })?;
    let password = req.password.unwrap_or_default();

    blocking(&state, move |s| {
        let user = s
            .db
            .get_user_by_email(&email)?
            .filter(|u| u.reset_token.as_deref() == Some(token.as_str()))
            .ok_or_else(|| ApiError::InvalidToken(BAD_RESET_TOKEN.into()))?;

        let password_hash = hash_password(&password)?;
        if !s.db.reset_password(user.id, &token, &password_hash)? {
            return Err(ApiError::InvalidToken(BAD_RESET_TOKEN.into()));
        }
        info!("Password reset for user {}", user.id);
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse::new("Password reset successful")))
}
