//! Field validation and the JSON body extractor.
//!
//! Validators collect every failing message instead of stopping at the first,
//! so a client can show them all at once.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use email_address::EmailAddress;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ApiError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const REGISTER_PASSWORD_MIN: usize = 6;
pub const RESET_PASSWORD_MIN: usize = 8;

/// `Json<T>` with rejections mapped into the API error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!("Rejected request body: {}", rejection.body_text());
                Err(ApiError::BadRequest(rejection_message(&rejection)))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body".into(),
        _ => "Malformed JSON body".into(),
    }
}

/// Accumulates field messages; empty means valid.
#[derive(Debug, Default)]
pub struct Errors(Vec<String>);

impl Errors {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

/// Returns the trimmed value, or `None` when absent or blank.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn check_username(value: Option<&str>, errors: &mut Errors) {
    let Some(username) = present(value) else {
        errors.push("Username is required");
        return;
    };
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        errors.push(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        errors.push("Username may only contain letters, numbers, '_', '.' and '-'");
    }
}

pub fn check_email(value: Option<&str>, errors: &mut Errors) {
    match present(value) {
        None => errors.push("Email is required"),
        Some(email) if !EmailAddress::is_valid(email) => errors.push("Invalid email"),
        Some(_) => {}
    }
}

/// Registration rule: six characters and all four character classes.
pub fn check_registration_password(value: Option<&str>, errors: &mut Errors) {
    let Some(password) = value.filter(|p| !p.is_empty()) else {
        errors.push("Password is required");
        return;
    };
    if password.chars().count() < REGISTER_PASSWORD_MIN {
        errors.push(format!(
            "Password must be at least {REGISTER_PASSWORD_MIN} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number");
    }
    if !password.chars().any(is_special) {
        errors.push("Password must contain at least one special character");
    }
}

/// Reset rule: eight characters and all four character classes.
pub fn check_reset_password(value: Option<&str>, errors: &mut Errors) {
    let Some(password) = value.filter(|p| !p.is_empty()) else {
        errors.push("Password is required");
        return;
    };
    if password.chars().count() < RESET_PASSWORD_MIN {
        errors.push(format!("Password must be at least {RESET_PASSWORD_MIN} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Must include an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Must include a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Must include a number");
    }
    if !password.chars().any(is_special) {
        errors.push("Must include a special character");
    }
}

fn is_special(c: char) -> bool {
    !c.is_ascii_alphanumeric()
}
