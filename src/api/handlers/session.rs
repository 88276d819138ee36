//! QR login sessions: creation and browser polling.

use crate::{
    api::{error::ApiError, integrations::Integrations},
    broker::{
        identity::Identity,
        session::{SessionView, Status},
        Broker,
    },
    providers::telegram::deep_link,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    redirect: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateSessionResponse {
    token: String,
    /// Telegram deep link to render as a QR code.
    url: String,
}

#[derive(ToSchema, Serialize, Debug, PartialEq)]
pub struct PollResponse {
    status: Status,
    user: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

impl From<SessionView> for PollResponse {
    fn from(view: SessionView) -> Self {
        Self {
            status: view.status,
            user: view.identity,
            code: view.exchange_code,
            redirect: view.redirect,
        }
    }
}

#[utoipa::path(
    post,
    path = "/qr-session",
    request_body = CreateSessionRequest,
    responses (
        (status = 200, description = "Pending session created", body = CreateSessionResponse),
    ),
    tag = "broker",
)]
#[instrument(skip(broker, integrations, payload))]
pub async fn create_session(
    Extension(broker): Extension<Arc<Broker>>,
    Extension(integrations): Extension<Arc<Integrations>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    // the body is optional; an unreadable one simply means "no redirect"
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let token = broker.sessions().create(request.redirect).await?;
    let url = deep_link(integrations.bot_username(), &token);
    debug!("qr session ready");

    Ok(Json(CreateSessionResponse { token, url }))
}

#[utoipa::path(
    get,
    path = "/poll/{token}",
    params(
        ("token" = String, Path, description = "Session token returned by /qr-session")
    ),
    responses (
        (status = 200, description = "Current session state", body = PollResponse),
        (status = 404, description = "Unknown or expired session", body = crate::api::error::ErrorBody),
    ),
    tag = "broker",
)]
#[instrument(skip_all)]
pub async fn poll(
    Extension(broker): Extension<Arc<Broker>>,
    Path(token): Path<String>,
) -> Result<Json<PollResponse>, ApiError> {
    broker
        .sessions()
        .poll(&token)
        .await
        .map(|view| Json(view.into()))
        .ok_or_else(|| ApiError::NotFound("expired".to_string()))
}
