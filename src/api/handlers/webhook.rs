//! Telegram bot webhook.
//!
//! `/start <token>` from the QR deep link authenticates the matching session.
//! Acknowledgements are queued on the notifier and never awaited here.

use crate::{
    access::secret_matches,
    api::{error::ApiError, handlers::json_body, integrations::Integrations},
    broker::{identity::Identity, session::AuthOutcome, Broker},
    providers::telegram::{start_token, Update},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub const AUTHENTICATED_TEXT: &str = "You are authenticated!";
pub const EXPIRED_TEXT: &str = "This QR code has expired.";

#[utoipa::path(
    post,
    path = "/webhook",
    request_body = Update,
    responses (
        (status = 200, description = "Update processed"),
        (status = 400, description = "Malformed update", body = crate::api::error::ErrorBody),
        (status = 403, description = "Bad webhook secret", body = crate::api::error::ErrorBody),
    ),
    tag = "telegram",
)]
#[instrument(skip_all)]
pub async fn webhook(
    Extension(broker): Extension<Arc<Broker>>,
    Extension(integrations): Extension<Arc<Integrations>>,
    headers: HeaderMap,
    payload: Result<Json<Update>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    if let Some(expected) = integrations.webhook_secret() {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !secret_matches(expected.expose_secret(), presented) {
            warn!("webhook rejected: bad secret token");
            return Err(ApiError::forbidden("unauthorized"));
        }
    }

    let update = json_body(payload, "invalid update")?;

    let Some(message) = update.message else {
        return Ok(StatusCode::OK);
    };
    let (Some(text), Some(from)) = (message.text, message.from) else {
        return Ok(StatusCode::OK);
    };
    let Some(token) = start_token(&text) else {
        return Ok(StatusCode::OK);
    };

    let chat_id = from.id;
    let identity = Identity::telegram(from.id, from.first_name, from.last_name, from.username);

    match broker.authenticate_session(token, identity).await? {
        AuthOutcome::Authenticated { .. } => {
            integrations.notifier().submit(chat_id, AUTHENTICATED_TEXT);
        }
        AuthOutcome::Expired | AuthOutcome::AlreadyAuthenticated => {
            info!(update_id = update.update_id, "stale qr code used");
            integrations.notifier().submit(chat_id, EXPIRED_TEXT);
        }
        AuthOutcome::Unknown => {
            info!(update_id = update.update_id, "start command for unknown session");
        }
    }

    Ok(StatusCode::OK)
}
