mod common;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::{PASSWORD, empty_request, expired_access_token, json_request, test_app, token_from_link};

#[tokio::test]
async fn register_activate_login_and_logout() {
    let app = test_app();

    let reply = app.register("alice", "Alice@Example.com").await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(app.mail.count(), 1);
    assert!(app.mail.last_link().starts_with("http://localhost:5173/activate/"));

    // Inactive accounts cannot sign in yet.
    let reply = app.login("alice@example.com", PASSWORD).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["code"], "NOT_ACTIVATED");

    assert_eq!(app.activate_last().await.status, StatusCode::OK);

    let reply = app.login("ALICE@example.com", PASSWORD).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["user"]["email"], "alice@example.com");
    assert_eq!(reply.cookies.len(), 2);
    assert!(reply.cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(reply.cookies.iter().all(|c| c.contains("HttpOnly")));
    let access = reply.body["accessToken"].as_str().unwrap().to_string();
    let refresh = reply.body["refreshToken"].as_str().unwrap().to_string();

    let reply = app.send(empty_request("GET", "/api/auth/me", Some(&access))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["username"], "alice");

    // The cookie alone also authenticates.
    let request = axum::http::Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("accessToken={access}"))
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::OK);

    let logout = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let reply = app.send(logout).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.cookies.iter().all(|c| c.contains("Max-Age=0")));

    // The revoked refresh token no longer mints access tokens.
    let again = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-token")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let reply = app.send(again).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn me_requires_a_token() {
    let app = test_app();

    let reply = app.send(empty_request("GET", "/api/auth/me", None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "Unauthorized: No token provided");

    let reply = app
        .send(empty_request("GET", "/api/auth/me", Some("not-a-jwt")))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "Unauthorized: Invalid token");
}

#[tokio::test]
async fn expired_access_token_is_reported_distinctly() {
    let app = test_app();
    let token = expired_access_token();

    let reply = app.send(empty_request("GET", "/api/auth/me", Some(&token))).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["code"], "TOKEN_EXPIRED");
    assert_eq!(reply.body["error"], "Unauthorized: Token expired");

    // Gated routes elsewhere share the same check.
    let reply = app.send(empty_request("GET", "/api/post/feed", Some(&token))).await;
    assert_eq!(reply.body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn refresh_token_issues_a_new_access_cookie() {
    let app = test_app();
    let session = app.signed_in("bob").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-token")
        .header(header::COOKIE, format!("refreshToken={}", session.refresh_token))
        .body(axum::body::Body::empty())
        .unwrap();
    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["accessToken"].is_string());
    assert!(reply.cookies[0].starts_with("accessToken="));

    let reply = app
        .send(empty_request("POST", "/api/auth/refresh-token", None))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "Refresh token missing");
}

#[tokio::test]
async fn duplicate_registration_is_rejected_case_insensitively() {
    let app = test_app();
    assert_eq!(
        app.register("carol", "carol@example.com").await.status,
        StatusCode::CREATED
    );

    let reply = app.register("someone", "CAROL@example.com").await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"], "Username or email already exists");

    let reply = app.register("carol", "other@example.com").await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_validation_lists_every_problem() {
    let app = test_app();

    let reply = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            json!({
                "username": "x",
                "email": "nope",
                "password": "short",
                "confirmPassword": "different",
            }),
            None,
        ))
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "VALIDATION_ERROR");
    let errors: Vec<&str> = reply.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert!(errors.contains(&"Username must be between 3 and 32 characters"));
    assert!(errors.contains(&"Invalid email"));
    assert!(errors.contains(&"Password must be at least 6 characters"));
    assert!(errors.contains(&"Passwords must match"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = test_app();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let reply = app.send(request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn failed_activation_email_rolls_back_the_account() {
    let app = test_app();
    app.mail.fail_next(true);

    let reply = app.register("dave", "dave@example.com").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["error"], "Failed to send activation email");

    // The same identity can register again once mail works.
    app.mail.fail_next(false);
    assert_eq!(
        app.register("dave", "dave@example.com").await.status,
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn activation_tokens_work_once() {
    let app = test_app();
    app.register("erin", "erin@example.com").await;
    let link = app.mail.last_link();

    assert_eq!(app.activate_last().await.status, StatusCode::OK);

    let reply = app
        .send(json_request(
            "POST",
            "/api/auth/activate",
            json!({ "token": token_from_link(&link) }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Account already activated");

    let reply = app
        .send(json_request("POST", "/api/auth/activate", json!({}), None))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["errors"][0], "Activation token is required");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = test_app();
    app.signed_in("frank").await;

    let wrong = app.login("frank@example.com", "Nope123!").await;
    let unknown = app.login("ghost@example.com", PASSWORD).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);
}

#[tokio::test]
async fn password_reset_token_is_single_use() {
    let app = test_app();
    app.signed_in("grace").await;

    let reply = app
        .send(json_request(
            "POST",
            "/api/auth/forgot-password",
            json!({ "email": "grace@example.com" }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let link = app.mail.last_link();
    assert!(link.starts_with("http://localhost:5173/reset-password/"));
    let token = token_from_link(&link);

    let reply = app
        .send(json_request(
            "POST",
            &format!("/api/auth/reset-password/{token}"),
            json!({ "password": "short" }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "VALIDATION_ERROR");

    let new_password = "Brand-new9";
    let reply = app
        .send(json_request(
            "POST",
            &format!("/api/auth/reset-password/{token}"),
            json!({ "password": new_password }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app
        .send(json_request(
            "POST",
            &format!("/api/auth/reset-password/{token}"),
            json!({ "password": "Another-one9" }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Invalid or expired token");

    assert_eq!(
        app.login("grace@example.com", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("grace@example.com", new_password).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn forgot_password_for_unknown_email_is_not_found() {
    let app = test_app();
    let reply = app
        .send(json_request(
            "POST",
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
            None,
        ))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(app.mail.count(), 0);
}
