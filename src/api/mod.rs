//! HTTP surface for both services.
//!
//! `broker_app` and `legacy_app` return fully layered routers so tests can
//! drive them with `oneshot`; `serve` binds and runs one until shutdown.

use crate::{access::AllowList, broker::Broker, legacy::LegacyService};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::options,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

pub mod error;
mod handlers;
pub mod integrations;
pub mod openapi;

pub use self::integrations::Integrations;

const REQUEST_ID: &str = "x-request-id";

/// Broker router with request ids, tracing, CORS and shared state.
#[must_use]
pub fn broker_app(broker: Arc<Broker>, integrations: Arc<Integrations>) -> Router {
    let (router, _openapi) = openapi::broker_router().split_for_parts();

    with_http_layers(router.route("/health", options(handlers::health::health)))
        .layer(Extension(broker))
        .layer(Extension(integrations))
}

/// Legacy router; everything but `/` and `/health` requires `X-Auth-Token`.
#[must_use]
pub fn legacy_app(service: LegacyService, tokens: AllowList) -> Router {
    let (public, _openapi) = openapi::legacy_public_router().split_for_parts();
    let (protected, _openapi) = openapi::legacy_protected_router().split_for_parts();

    let protected = protected.route_layer(middleware::from_fn_with_state(
        Arc::new(tokens),
        handlers::legacy::require_token,
    ));

    with_http_layers(public.merge(protected)).layer(Extension(service))
}

fn with_http_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // login pages are served from another origin
        .allow_origin(Any);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    )
}

/// Bind `[::]:port` and serve `app` until Ctrl-C.
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

// span; headers are not recorded since they carry webhook and caller secrets
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method().as_str();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http.request", method, path, request_id)
}
