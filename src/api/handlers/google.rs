//! Google OAuth login: redirect out with a one-time `state`, come back with
//! an authorization code.

use crate::{
    api::{error::ApiError, handlers::found, integrations::Integrations},
    broker::{identity::Method, Broker},
    providers::google::{append_code, GoogleClient},
};
use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::IntoParams;

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginArgs {
    /// Relying-party URL that receives `code=` after login.
    redirect: Option<String>,
}

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackArgs {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

fn configured(integrations: &Integrations) -> Result<&GoogleClient, ApiError> {
    integrations
        .google()
        .ok_or_else(|| ApiError::Unavailable("google login is not configured".to_string()))
}

#[utoipa::path(
    get,
    path = "/google/login",
    params(LoginArgs),
    responses (
        (status = 302, description = "Redirect to the Google consent page"),
        (status = 503, description = "Google login not configured", body = crate::api::error::ErrorBody),
    ),
    tag = "google",
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(broker): Extension<Arc<Broker>>,
    Extension(integrations): Extension<Arc<Integrations>>,
    query: Result<Query<LoginArgs>, QueryRejection>,
) -> Result<Response, ApiError> {
    let google = configured(&integrations)?;
    let args = query.map(|Query(args)| args).unwrap_or_default();

    let state = broker.oauth_states().create(args.redirect).await?;
    let url = google
        .authorization_url(&state)
        .map_err(|err| ApiError::Internal(err.into()))?;

    Ok(found(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/google/callback",
    params(CallbackArgs),
    responses (
        (status = 302, description = "Redirect to the relying party with `code=`, or to the direct redirect"),
        (status = 400, description = "Google error, bad state, or rejected code", body = crate::api::error::ErrorBody),
        (status = 502, description = "Google unreachable", body = crate::api::error::ErrorBody),
    ),
    tag = "google",
)]
#[instrument(skip_all)]
pub async fn callback(
    Extension(broker): Extension<Arc<Broker>>,
    Extension(integrations): Extension<Arc<Integrations>>,
    query: Result<Query<CallbackArgs>, QueryRejection>,
) -> Result<Response, ApiError> {
    let google = configured(&integrations)?;
    let args = query.map(|Query(args)| args).unwrap_or_default();

    if let Some(error) = args.error.filter(|error| !error.is_empty()) {
        warn!(%error, "google returned an error");
        return Err(ApiError::bad_request(format!("google auth error: {error}")));
    }

    let state = args.state.unwrap_or_default();
    let Some(redirect) = broker.oauth_states().consume(&state).await else {
        return Err(ApiError::bad_request("invalid or expired state"));
    };

    // no store lock is held across the provider round trips
    let identity = google
        .fetch_identity(&args.code.unwrap_or_default())
        .await?;
    info!("google identity fetched");

    if let Some(redirect) = redirect {
        let code = broker.codes().issue(identity, Method::Google).await?;
        return Ok(found(&append_code(&redirect, &code)));
    }

    Ok(found(integrations.direct_redirect().unwrap_or("/")))
}
