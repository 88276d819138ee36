//! Legacy username/password endpoints.
//!
//! Every route except `/` and `/health` sits behind [`require_token`]. Signed
//! tokens travel in the historical `public_key` / `old_public_key` fields.
//! Failed credentials are a normal `200` answer, not an HTTP error.

use crate::{
    access::AllowList,
    api::{error::ApiError, handlers::health::x_app_headers, handlers::json_body},
    legacy::{LegacyService, Refresh, Registration},
    GIT_COMMIT_HASH,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

pub const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(ToSchema, Deserialize, Debug)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    /// `created`, `authenticated`, `rotated` or `invalid`.
    status: String,
    /// The signed token; empty when `status` is `invalid`.
    public_key: String,
}

impl AuthResponse {
    fn issued(status: &str, token: String) -> Self {
        Self {
            status: status.to_string(),
            public_key: token,
        }
    }

    fn invalid() -> Self {
        Self::issued("invalid", String::new())
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct VerifyRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    public_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct VerifyResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RefreshRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    old_public_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    public_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LegacyHealth {
    status: String,
    database: String,
}

fn credentials(payload: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, ApiError> {
    let request = json_body(payload, "invalid request body")?;
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password required"));
    }
    Ok(request)
}

/// Reject requests without a configured `X-Auth-Token`. An empty list admits nobody.
pub async fn require_token(
    State(tokens): State<Arc<AllowList>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if presented.is_empty() {
        return ApiError::Unauthorized("missing X-Auth-Token header".to_string()).into_response();
    }
    if !tokens.contains(presented) {
        warn!(path = %request.uri().path(), "rejected unknown X-Auth-Token");
        return ApiError::Unauthorized("invalid token".to_string()).into_response();
    }

    next.run(request).await
}

#[utoipa::path(
    get,
    path = "/",
    responses (
        (status = 200, description = "OpenAPI description of the legacy service"),
    ),
    tag = "legacy",
)]
pub async fn index() -> impl IntoResponse {
    Json(crate::api::openapi::legacy_openapi())
}

#[utoipa::path(
    get,
    path = "/health",
    responses (
        (status = 200, description = "Database reachable", body = LegacyHealth),
        (status = 503, description = "Database unreachable", body = LegacyHealth),
    ),
    tag = "health",
)]
pub async fn health(Extension(service): Extension<LegacyService>) -> impl IntoResponse {
    let (status, database) = match service.users().ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            error!("legacy database ping failed: {err:#}");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let headers = x_app_headers(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        GIT_COMMIT_HASH,
    );
    let body = LegacyHealth {
        status: if status.is_success() { "ok" } else { "error" }.to_string(),
        database: database.to_string(),
    };

    (status, headers, Json(body))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = Credentials,
    responses (
        (status = 200, description = "User created; `public_key` holds the first token", body = AuthResponse),
        (status = 400, description = "Missing username or password", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or unknown X-Auth-Token", body = crate::api::error::ErrorBody),
        (status = 409, description = "User already exists", body = crate::api::error::ErrorBody),
    ),
    tag = "legacy",
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(service): Extension<LegacyService>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request = credentials(payload)?;
    match service.register(&request.username, &request.password).await? {
        Registration::Created { token } => Ok(Json(AuthResponse::issued("created", token))),
        Registration::AlreadyExists => Err(ApiError::Conflict("user already exists".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "`authenticated` with a token, or `invalid` with an empty token", body = AuthResponse),
        (status = 400, description = "Missing username or password", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or unknown X-Auth-Token", body = crate::api::error::ErrorBody),
    ),
    tag = "legacy",
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(service): Extension<LegacyService>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request = credentials(payload)?;
    let response = match service.login(&request.username, &request.password).await? {
        Some(token) => AuthResponse::issued("authenticated", token),
        None => {
            info!("legacy login rejected");
            AuthResponse::invalid()
        }
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/verify",
    request_body = VerifyRequest,
    responses (
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 400, description = "Missing username or token", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or unknown X-Auth-Token", body = crate::api::error::ErrorBody),
    ),
    tag = "legacy",
)]
#[instrument(skip_all)]
pub async fn verify(
    Extension(service): Extension<LegacyService>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request = json_body(payload, "invalid request body")?;
    if request.username.is_empty() || request.public_key.is_empty() {
        return Err(ApiError::bad_request("username and public_key required"));
    }

    let response = match service.verify(&request.username, &request.public_key).await? {
        Some(user) => VerifyResponse {
            valid: true,
            user_id: Some(user.id),
            username: Some(user.username),
            created_at: Some(user.created_at),
        },
        None => VerifyResponse::default(),
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshRequest,
    responses (
        (status = 200, description = "New token", body = RefreshResponse),
        (status = 400, description = "Missing username or token", body = crate::api::error::ErrorBody),
        (status = 401, description = "Invalid old token or X-Auth-Token", body = crate::api::error::ErrorBody),
        (status = 404, description = "User not found", body = crate::api::error::ErrorBody),
    ),
    tag = "legacy",
)]
#[instrument(skip_all)]
pub async fn refresh(
    Extension(service): Extension<LegacyService>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let request = json_body(payload, "invalid request body")?;
    if request.username.is_empty() || request.old_public_key.is_empty() {
        return Err(ApiError::bad_request("username and old_public_key required"));
    }

    match service.refresh(&request.username, &request.old_public_key).await? {
        Refresh::Renewed { token } => Ok(Json(RefreshResponse { public_key: token })),
        Refresh::UnknownUser => Err(ApiError::NotFound("user not found".to_string())),
        Refresh::InvalidToken => Err(ApiError::Unauthorized("invalid old token".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/rotate",
    request_body = Credentials,
    responses (
        (status = 200, description = "`rotated` with a token under the new key, or `invalid`", body = AuthResponse),
        (status = 400, description = "Missing username or password", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or unknown X-Auth-Token", body = crate::api::error::ErrorBody),
    ),
    tag = "legacy",
)]
#[instrument(skip_all)]
pub async fn rotate(
    Extension(service): Extension<LegacyService>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let request = credentials(payload)?;
    let response = match service.rotate(&request.username, &request.password).await? {
        Some(token) => AuthResponse::issued("rotated", token),
        None => AuthResponse::invalid(),
    };
    Ok(Json(response))
}
