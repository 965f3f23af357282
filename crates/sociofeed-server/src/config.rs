use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::warn;

use sociofeed_api::mailer::SmtpSettings;
use sociofeed_api::media::CloudinarySettings;
use sociofeed_auth::{TokenConfig, TokenSettings};

/// Placeholder secrets that MUST NOT be used in production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "secret",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Where uploaded media ends up.
#[derive(Debug, Clone)]
pub enum MediaConfig {
    Local { dir: PathBuf, public_url: String },
    Cloudinary(CloudinarySettings),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub environment: Environment,
    pub client_url: String,
    pub cookie_secure: bool,
    pub tokens: TokenConfig,
    /// `None` logs action links instead of sending mail.
    pub smtp: Option<SmtpSettings>,
    pub media: MediaConfig,
    pub token_sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("SOCIOFEED_ENV").as_deref() {
            Some("production") => Environment::Production,
            _ => Environment::Development,
        };

        let secret = |key: &str| -> anyhow::Result<String> {
            match get(key) {
                Some(value) if !PLACEHOLDER_SECRETS.contains(&value.as_str()) => Ok(value),
                _ if environment == Environment::Production => {
                    bail!("{key} is unset or still a placeholder")
                }
                _ => {
                    warn!("{} is unset; using a development secret", key);
                    Ok(format!("dev-{}-change-me", key.to_lowercase()))
                }
            }
        };
        let ttl = |key: &str, default: i64| -> anyhow::Result<chrono::Duration> {
            Ok(chrono::Duration::seconds(parsed(&get, key, default)?))
        };

        let tokens = TokenConfig {
            access: TokenSettings::new(
                secret("ACCESS_SECRET")?,
                ttl("ACCESS_TOKEN_TTL_SECS", 15 * 60)?,
            ),
            refresh: TokenSettings::new(
                secret("REFRESH_SECRET")?,
                ttl("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?,
            ),
            activation: TokenSettings::new(
                secret("ACTIVATION_SECRET")?,
                ttl("ACTIVATION_TOKEN_TTL_SECS", 24 * 60 * 60)?,
            ),
            reset: TokenSettings::new(
                secret("RESET_SECRET")?,
                ttl("RESET_TOKEN_TTL_SECS", 60 * 60)?,
            ),
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = get("SMTP_USERNAME");
                let from = get("EMAIL_FROM")
                    .or_else(|| username.clone())
                    .unwrap_or_else(|| "SocioFeed <no-reply@sociofeed.local>".into());
                Some(SmtpSettings {
                    host,
                    port: parsed(&get, "SMTP_PORT", 587)?,
                    username,
                    password: get("SMTP_PASSWORD"),
                    tls: parsed(&get, "SMTP_TLS", true)?,
                    from,
                })
            }
            None => {
                if environment == Environment::Production {
                    warn!("SMTP_HOST is unset; emails will only be logged");
                }
                None
            }
        };

        let media = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => {
                MediaConfig::Cloudinary(CloudinarySettings {
                    cloud_name,
                    api_key,
                    api_secret,
                })
            }
            _ => MediaConfig::Local {
                dir: get("MEDIA_DIR").unwrap_or_else(|| "./uploads".into()).into(),
                public_url: get("MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|| "http://localhost:2000/uploads".into()),
            },
        };

        let sweep_secs: u64 = parsed(&get, "TOKEN_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_secs == 0 {
            bail!("TOKEN_SWEEP_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            host: get("SOCIOFEED_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "SOCIOFEED_PORT", 2000)?,
            db_path: get("SOCIOFEED_DB_PATH")
                .unwrap_or_else(|| "sociofeed.db".into())
                .into(),
            environment,
            client_url: get("CLIENT_URL").unwrap_or_else(|| "http://localhost:5173".into()),
            cookie_secure: parsed(&get, "COOKIE_SECURE", true)?,
            tokens,
            smtp,
            media,
            token_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
