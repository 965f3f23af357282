use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, warn};

use sociofeed_api::AppState;

/// Background task that prunes expired refresh tokens on an interval.
pub async fn run_token_sweep(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match sweep_once(&state).await {
            Ok(count) if count > 0 => info!("Token sweep: pruned {} expired refresh tokens", count),
            Ok(_) => {}
            Err(e) => warn!("Token sweep error: {:#}", e),
        }
    }
}

pub async fn sweep_once(state: &AppState) -> anyhow::Result<usize> {
    let state = state.clone();
    let removed = tokio::task::spawn_blocking(move || {
        state.db.delete_expired_refresh_tokens(Utc::now())
    })
    .await
    .map_err(|e| anyhow!("sweep task failed: {e}"))??;
    Ok(removed)
}
