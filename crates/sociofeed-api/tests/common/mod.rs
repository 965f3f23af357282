#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use sociofeed_api::mailer::{MailError, Mailer, OutgoingEmail};
use sociofeed_api::media::LocalMediaStore;
use sociofeed_api::{ApiSettings, AppStateInner, router};
use sociofeed_auth::{TokenConfig, TokenService, TokenSettings};
use sociofeed_db::Database;

pub const PASSWORD: &str = "Secret1!";
const ACCESS_SECRET: &str = "access-test-secret";

/// Keeps every email instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last_link(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|m| m.action_link.clone())
            .expect("no email was sent")
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("mail server unreachable".into()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub mail: Arc<RecordingMailer>,
    _media_dir: TempDir,
}

pub struct Session {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
}

fn settings(secret: &str, minutes: i64) -> TokenSettings {
    TokenSettings::new(secret, chrono::Duration::minutes(minutes))
}

pub fn test_app() -> TestApp {
    let media_dir = TempDir::new().unwrap();
    let mail = Arc::new(RecordingMailer::default());

    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        tokens: TokenService::new(TokenConfig {
            access: settings(ACCESS_SECRET, 15),
            refresh: settings("refresh-test-secret", 60 * 24 * 7),
            activation: settings("activation-test-secret", 60 * 24),
            reset: settings("reset-test-secret", 15),
        }),
        mailer: mail.clone(),
        media: Arc::new(LocalMediaStore::new(media_dir.path(), "/uploads")),
        settings: ApiSettings {
            client_url: "http://localhost:5173".into(),
            cookie_secure: false,
        },
    });

    TestApp {
        router: router(state),
        mail,
        _media_dir: media_dir,
    }
}

/// An access token signed with the app's secret whose lifetime ended an hour ago.
pub fn expired_access_token() -> String {
    let tokens = TokenService::new(TokenConfig {
        access: settings(ACCESS_SECRET, -60),
        refresh: settings("refresh-test-secret", 1),
        activation: settings("activation-test-secret", 1),
        reset: settings("reset-test-secret", 1),
    });
    tokens.issue_access(uuid::Uuid::new_v4()).unwrap()
}

pub fn token_from_link(link: &str) -> String {
    link.rsplit('/').next().unwrap().to_string()
}

pub fn json_request(method: &str, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Builds a `multipart/form-data` body from text fields and `(name, file name, bytes)` files.
pub fn multipart_request(
    method: &str,
    uri: &str,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
    bearer: &str,
) -> Request<Body> {
    let boundary = "sociofeed-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::from(body))
        .unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub cookies: Vec<String>,
    pub body: Value,
}

impl TestApp {
    pub fn media_root(&self) -> &Path {
        self._media_dir.path()
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply {
            status,
            cookies,
            body,
        }
    }

    pub async fn register(&self, username: &str, email: &str) -> Reply {
        self.send(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "username": username,
                "email": email,
                "password": PASSWORD,
                "confirmPassword": PASSWORD,
            }),
            None,
        ))
        .await
    }

    pub async fn activate_last(&self) -> Reply {
        let token = token_from_link(&self.mail.last_link());
        self.send(json_request(
            "POST",
            "/api/auth/activate",
            json!({ "token": token }),
            None,
        ))
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Reply {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            json!({ "email": email, "password": password }),
            None,
        ))
        .await
    }

    /// Registers, activates and logs a user in.
    pub async fn signed_in(&self, username: &str) -> Session {
        let email = format!("{username}@example.com");
        assert_eq!(self.register(username, &email).await.status, StatusCode::CREATED);
        assert_eq!(self.activate_last().await.status, StatusCode::OK);
        let reply = self.login(&email, PASSWORD).await;
        assert_eq!(reply.status, StatusCode::OK);
        Session {
            id: reply.body["user"]["id"].as_str().unwrap().to_string(),
            access_token: reply.body["accessToken"].as_str().unwrap().to_string(),
            refresh_token: reply.body["refreshToken"].as_str().unwrap().to_string(),
        }
    }
}
