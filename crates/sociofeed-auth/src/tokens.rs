use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Seconds of clock skew tolerated when checking `exp`.
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Activation,
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,

    /// Signature checked out but the token was minted for another purpose.
    #[error("token has the wrong kind")]
    WrongKind,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }
}

/// One secret and lifetime per token kind.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access: TokenSettings,
    pub refresh: TokenSettings,
    pub activation: TokenSettings,
    pub reset: TokenSettings,
}

impl TokenConfig {
    fn settings(&self, kind: TokenKind) -> &TokenSettings {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Activation => &self.activation,
            TokenKind::Reset => &self.reset,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    kind: TokenKind,
    jti: Uuid,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenService {
    config: TokenConfig,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    pub fn access_ttl(&self) -> Duration {
        self.config.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.config.refresh.ttl
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        let access_token = self.issue_access(user_id)?;
        let (refresh_token, refresh_expires_at) = self.sign(TokenKind::Refresh, user_id.to_string())?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }

    pub fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.sign(TokenKind::Access, user_id.to_string()).map(|(t, _)| t)
    }

    pub fn issue_activation(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.sign(TokenKind::Activation, user_id.to_string()).map(|(t, _)| t)
    }

    /// Reset tokens carry the account email rather than the id.
    pub fn issue_reset(&self, email: &str) -> Result<String, TokenError> {
        self.sign(TokenKind::Reset, email.to_string()).map(|(t, _)| t)
    }

    pub fn verify_access(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_user(TokenKind::Access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_user(TokenKind::Refresh, token)
    }

    pub fn verify_activation(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_user(TokenKind::Activation, token)
    }

    pub fn verify_reset(&self, token: &str) -> Result<String, TokenError> {
        self.verify(TokenKind::Reset, token)
    }

    fn sign(&self, kind: TokenKind, sub: String) -> Result<(String, DateTime<Utc>), TokenError> {
        let settings = self.config.settings(kind);
        let issued = Utc::now();
        let expires = issued + settings.ttl;
        let claims = Claims {
            sub,
            kind,
            jti: Uuid::new_v4(),
            iat: issued.timestamp(),
            exp: expires.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(settings.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok((token, expires))
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<String, TokenError> {
        let settings = self.config.settings(kind);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(settings.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            other => {
                debug!("{:?} token failed validation: {:?}", kind, other);
                TokenError::Invalid
            }
        })?;

        if data.claims.kind != kind {
            debug!("Expected a {:?} token, got {:?}", kind, data.claims.kind);
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims.sub)
    }

    fn verify_user(&self, kind: TokenKind, token: &str) -> Result<Uuid, TokenError> {
        let sub = self.verify(kind, token)?;
        Uuid::parse_str(&sub).map_err(|_| TokenError::Invalid)
    }
}
