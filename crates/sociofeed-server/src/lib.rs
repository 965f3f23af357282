pub mod config;
pub mod sweep;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use sociofeed_api::mailer::{LogMailer, Mailer, SmtpMailer};
use sociofeed_api::media::{CloudinaryMediaStore, LocalMediaStore, MediaStore};
use sociofeed_api::{ApiSettings, AppState, AppStateInner};
use sociofeed_auth::TokenService;
use sociofeed_db::Database;

use crate::config::{AppConfig, MediaConfig};

pub const DEFAULT_LOG_FILTER: &str = "sociofeed_server=debug,sociofeed_api=debug,sociofeed_gateway=debug,sociofeed_db=info,tower_http=debug";

/// Opens the database and wires the token service, mailer and media store.
pub fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let db = Database::open(&config.db_path)?;
    let tokens = TokenService::new(config.tokens.clone());

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            info!("No SMTP host configured; emails will be logged");
            Arc::new(LogMailer)
        }
    };

    let media: Arc<dyn MediaStore> = match &config.media {
        MediaConfig::Local { dir, public_url } => {
            info!("Storing media under {}", dir.display());
            Arc::new(LocalMediaStore::new(dir.clone(), public_url.clone()))
        }
        MediaConfig::Cloudinary(settings) => {
            info!("Storing media on Cloudinary cloud {}", settings.cloud_name);
            Arc::new(CloudinaryMediaStore::new(settings.clone()))
        }
    };

    Ok(Arc::new(AppStateInner {
        db,
        tokens,
        mailer,
        media,
        settings: ApiSettings {
            client_url: config.client_url.clone(),
            cookie_secure: config.cookie_secure,
        },
    }))
}

/// The full HTTP surface: REST API, realtime socket, uploads and probes.
pub fn build_app(state: AppState, config: &AppConfig) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(config.client_url.trim_end_matches('/'))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let mut app = Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .merge(sociofeed_api::router(state))
        .merge(sociofeed_gateway::routes());

    if let MediaConfig::Local { dir, .. } = &config.media {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    Ok(app.layer(cors).layer(TraceLayer::new_for_http()))
}

async fn welcome() -> &'static str {
    "Welcome to the SocioFeed API"
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
