pub mod exchange;
pub mod google;
pub mod health;
pub mod legacy;
pub mod root;
pub mod session;
pub mod solana;
pub mod webhook;

use crate::api::error::ApiError;
use axum::{
    extract::rejection::JsonRejection,
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::debug;

/// `302 Found` to `target`, the status browsers and relying parties expect.
pub(crate) fn found(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Err(_) => ApiError::bad_request("invalid redirect target").into_response(),
    }
}

/// Unwrap a JSON body or fail with `400 {message}`.
pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        debug!("rejected request body: {rejection}");
        ApiError::bad_request(message)
    })
}
