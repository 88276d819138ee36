#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use sesame::{
    access::AllowList,
    api::legacy_app,
    legacy::{users::UserStore, LegacyService},
    token::TOKEN_LENGTH,
};
use tower::ServiceExt;

const AUTH_TOKEN: &str = "ops-token";

// one connection: every sqlite::memory: connection is its own database
async fn app() -> Result<Router> {
    let users = UserStore::connect("sqlite::memory:", 1).await?;
    Ok(legacy_app(
        LegacyService::new(users),
        AllowList::parse(AUTH_TOKEN),
    ))
}

async fn call(app: &Router, uri: &str, body: &Value) -> Result<Response> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Auth-Token", AUTH_TOKEN)
        .body(Body::from(serde_json::to_vec(body)?))?;
    Ok(app.clone().oneshot(request).await?)
}

async fn json_of(response: Response) -> Result<Value> {
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn register(app: &Router, username: &str, password: &str) -> Result<String> {
    let response = call(app, "/register", &json!({ "username": username, "password": password })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await?;
    assert_eq!(body["status"], "created");
    Ok(body["public_key"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn register_login_verify() -> Result<()> {
    let app = app().await?;
    let first = register(&app, "ada", "correct horse").await?;
    assert_eq!(STANDARD.decode(&first)?.len(), TOKEN_LENGTH);

    let verified = json_of(call(&app, "/verify", &json!({ "username": "ada", "public_key": first })).await?).await?;
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["username"], "ada");
    assert!(verified["user_id"].is_i64());

    let response = call(&app, "/login", &json!({ "username": "ada", "password": "correct horse" })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let login = json_of(response).await?;
    assert_eq!(login["status"], "authenticated");
    assert_ne!(login["public_key"], first.as_str());

    // tokens are bound to the username
    let other = json_of(call(&app, "/verify", &json!({ "username": "bob", "public_key": first })).await?).await?;
    assert_eq!(other["valid"], false);
    Ok(())
}

#[tokio::test]
async fn bad_password_is_invalid_not_an_error() -> Result<()> {
    let app = app().await?;
    register(&app, "ada", "correct horse").await?;

    for body in [
        json!({ "username": "ada", "password": "wrong" }),
        json!({ "username": "nobody", "password": "wrong" }),
    ] {
        let response = call(&app, "/login", &body).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let login = json_of(response).await?;
        assert_eq!(login["status"], "invalid");
        assert_eq!(login["public_key"], "");
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let app = app().await?;
    register(&app, "ada", "pw").await?;
    let response = call(&app, "/register", &json!({ "username": "ada", "password": "other" })).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_bad_requests() -> Result<()> {
    let app = app().await?;
    let response = call(&app, "/register", &json!({ "username": "ada" })).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = call(&app, "/verify", &json!({ "username": "ada" })).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn malformed_token_verifies_false() -> Result<()> {
    let app = app().await?;
    register(&app, "ada", "pw").await?;
    let response = call(&app, "/verify", &json!({ "username": "ada", "public_key": "not-a-token" })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await?["valid"], false);
    Ok(())
}

#[tokio::test]
async fn refresh_renews_valid_tokens_only() -> Result<()> {
    let app = app().await?;
    let token = register(&app, "ada", "pw").await?;

    let response = call(&app, "/refresh", &json!({ "username": "ada", "old_public_key": token })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let renewed = json_of(response).await?["public_key"].as_str().unwrap().to_string();
    assert_ne!(renewed, token);
    let verified = json_of(call(&app, "/verify", &json!({ "username": "ada", "public_key": renewed })).await?).await?;
    assert_eq!(verified["valid"], true);

    let response = call(&app, "/refresh", &json!({ "username": "ghost", "old_public_key": token })).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut tampered = token.into_bytes();
    tampered[0] = if tampered[0] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered)?;
    let response = call(&app, "/refresh", &json!({ "username": "ada", "old_public_key": tampered })).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await?["error"], "invalid old token");
    Ok(())
}

#[tokio::test]
async fn rotate_invalidates_previous_tokens() -> Result<()> {
    let app = app().await?;
    let before = register(&app, "ada", "pw").await?;

    let response = call(&app, "/rotate", &json!({ "username": "ada", "password": "pw" })).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = json_of(response).await?;
    assert_eq!(rotated["status"], "rotated");
    let after = rotated["public_key"].as_str().unwrap().to_string();

    let old = json_of(call(&app, "/verify", &json!({ "username": "ada", "public_key": before })).await?).await?;
    assert_eq!(old["valid"], false);
    let new = json_of(call(&app, "/verify", &json!({ "username": "ada", "public_key": after })).await?).await?;
    assert_eq!(new["valid"], true);

    let denied = json_of(call(&app, "/rotate", &json!({ "username": "ada", "password": "nope" })).await?).await?;
    assert_eq!(denied["status"], "invalid");
    Ok(())
}

#[tokio::test]
async fn auth_token_guards_protected_routes() -> Result<()> {
    let app = app().await?;
    let body = serde_json::to_vec(&json!({ "username": "ada", "password": "pw" }))?;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await?["error"], "missing X-Auth-Token header");

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Auth-Token", "guess")
        .body(Body::from(body))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(response).await?["error"], "invalid token");
    Ok(())
}

#[tokio::test]
async fn empty_token_list_admits_nobody() -> Result<()> {
    let users = UserStore::connect("sqlite::memory:", 1).await?;
    let app = legacy_app(LegacyService::new(users), AllowList::default());

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Auth-Token", "")
        .body(Body::from("{}"))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Auth-Token", "anything")
        .body(Body::from("{}"))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn index_and_health_are_public() -> Result<()> {
    let app = app().await?;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_of(response).await?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "ok");

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_of(response).await?;
    assert!(doc["paths"]["/register"].is_object());
    Ok(())
}
