//! Solana wallet sign-in: nonce issuance and signature submission.

use crate::{
    api::{error::ApiError, handlers::json_body},
    broker::{
        identity::{Identity, Method},
        utils::non_empty,
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
pub struct NonceRequest {
    #[serde(default)]
    public_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct NonceResponse {
    /// Text the wallet must sign verbatim.
    nonce: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SignatureRequest {
    /// Base58 wallet address.
    #[serde(default)]
    public_key: String,
    /// Base64 ed25519 signature over `nonce`.
    #[serde(default)]
    signature: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    redirect: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SignatureResponse {
    ok: bool,
    public_key: String,
    user: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

#[utoipa::path(
    post,
    path = "/solana/nonce",
    request_body = NonceRequest,
    responses (
        (status = 200, description = "Challenge issued", body = NonceResponse),
        (status = 400, description = "Missing public key", body = crate::api::error::ErrorBody),
    ),
    tag = "solana",
)]
#[instrument(skip_all)]
pub async fn nonce(
    Extension(broker): Extension<Arc<Broker>>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> Result<Json<NonceResponse>, ApiError> {
    let request = json_body(payload, "missing public_key")?;
    let public_key = request.public_key.trim();
    if public_key.is_empty() {
        return Err(ApiError::bad_request("missing public_key"));
    }

    let nonce = broker.challenges().issue(public_key).await?;
    Ok(Json(NonceResponse { nonce }))
}

#[utoipa::path(
    post,
    path = "/solana/auth",
    request_body = SignatureRequest,
    responses (
        (status = 200, description = "Signature accepted", body = SignatureResponse),
        (status = 400, description = "Malformed key or signature", body = crate::api::error::ErrorBody),
        (status = 403, description = "Bad or expired nonce, or bad signature", body = crate::api::error::ErrorBody),
    ),
    tag = "solana",
)]
#[instrument(skip_all)]
pub async fn auth(
    Extension(broker): Extension<Arc<Broker>>,
    payload: Result<Json<SignatureRequest>, JsonRejection>,
) -> Result<Json<SignatureResponse>, ApiError> {
    let request = json_body(payload, "no data")?;
    // same normalization as `nonce`, which stored the challenge
    let public_key = request.public_key.trim().to_string();
    if public_key.is_empty() || request.signature.is_empty() || request.nonce.is_empty() {
        return Err(ApiError::bad_request("missing fields"));
    }

    let identity = broker
        .challenges()
        .verify(&public_key, &request.signature, &request.nonce)
        .await?;
    info!("solana signature verified");

    let redirect = non_empty(request.redirect);
    let code = match redirect {
        Some(_) => Some(
            broker
                .codes()
                .issue(identity.clone(), Method::Solana)
                .await?,
        ),
        None => None,
    };

    Ok(Json(SignatureResponse {
        ok: true,
        public_key,
        user: identity,
        code,
        redirect,
    }))
}
