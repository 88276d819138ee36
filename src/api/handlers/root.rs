use crate::api::{handlers::found, integrations::Integrations};
use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct IndexArgs {
    /// Relying-party URL to return to after login.
    redirect: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Index {
    name: String,
    version: String,
    redirect: Option<String>,
}

#[utoipa::path(
    get,
    path = "/",
    params(IndexArgs),
    responses (
        (status = 200, description = "Login page bootstrap data", body = Index),
        (status = 302, description = "No relying party given, sent to the direct redirect"),
    ),
    tag = "broker",
)]
#[instrument(skip(integrations, query))]
pub async fn root(
    Extension(integrations): Extension<Arc<Integrations>>,
    query: Result<Query<IndexArgs>, QueryRejection>,
) -> Response {
    let args = query.map(|Query(args)| args).unwrap_or_default();
    let redirect = args.redirect.filter(|target| !target.is_empty());

    if let (None, Some(direct)) = (&redirect, integrations.direct_redirect()) {
        return found(direct);
    }

    Json(Index {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        redirect,
    })
    .into_response()
}
