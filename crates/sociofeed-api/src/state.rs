use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use sociofeed_auth::TokenService;
use sociofeed_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::mailer::Mailer;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
    pub media: Arc<dyn MediaStore>,
    pub settings: ApiSettings,
}

/// Values the handlers need from configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Frontend origin; email links point here.
    pub client_url: String,
    /// Adds `Secure` to auth cookies.
    pub cookie_secure: bool,
}

impl AppStateInner {
    pub fn activation_link(&self, token: &str) -> String {
        format!("{}/activate/{}", self.settings.client_url.trim_end_matches('/'), token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password/{}",
            self.settings.client_url.trim_end_matches('/'),
            token
        )
    }
}

/// Runs blocking work (SQLite, argon2) off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {e}"))
        })?
}
