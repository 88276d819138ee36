//! Health endpoint for the broker.
//!
//! Reports build metadata and the number of live records per ephemeral store.
//! `OPTIONS /health` returns the same headers without a body.

use crate::{broker::Broker, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StoreCounts {
    sessions: usize,
    nonces: usize,
    codes: usize,
    oauth_states: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    stores: StoreCounts,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Broker is healthy", body = Health),
    ),
    tag = "health",
)]
pub async fn health(method: Method, broker: Extension<Arc<Broker>>) -> impl IntoResponse {
    let sizes = broker.sizes().await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stores: StoreCounts {
            sessions: sizes.sessions,
            nonces: sizes.nonces,
            codes: sizes.codes,
            oauth_states: sizes.oauth_states,
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    (StatusCode::OK, x_app_headers(&health.name, &health.version, &health.commit), body)
}

/// `X-App: name:version:short-hash`, shared with the legacy health handler.
pub(crate) fn x_app_headers(name: &str, version: &str, commit: &str) -> HeaderMap {
    let short_hash = if commit.len() > 7 { &commit[0..7] } else { "" };

    format!("{name}:{version}:{short_hash}")
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new())
}
