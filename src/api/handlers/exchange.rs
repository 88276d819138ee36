use crate::{
    api::{error::ApiError, handlers::json_body},
    broker::{
        identity::{Identity, Method},
        Broker,
    },
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct ExchangeRequest {
    #[serde(default)]
    code: String,
    /// Relying-party token; required only when an allow-list is configured.
    #[serde(default)]
    app_token: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ExchangeResponse {
    ok: bool,
    user: Identity,
    method: Method,
}

#[utoipa::path(
    post,
    path = "/exchange",
    request_body = ExchangeRequest,
    responses (
        (status = 200, description = "Code redeemed", body = ExchangeResponse),
        (status = 400, description = "Missing code", body = crate::api::error::ErrorBody),
        (status = 403, description = "Unknown app token, or invalid or expired code", body = crate::api::error::ErrorBody),
    ),
    tag = "broker",
)]
#[instrument(skip_all)]
pub async fn exchange(
    Extension(broker): Extension<Arc<Broker>>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, ApiError> {
    let request = json_body(payload, "no data")?;
    let redeemed = broker
        .codes()
        .redeem(&request.code, &request.app_token)
        .await?;
    info!(method = %redeemed.method, "exchange code redeemed");

    Ok(Json(ExchangeResponse {
        ok: true,
        user: redeemed.identity,
        method: redeemed.method,
    }))
}
