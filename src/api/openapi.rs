use crate::api::handlers::{exchange, google, health, legacy, root, session, solana, webhook};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the router wiring and keep only the generated document.
    let (_router, openapi) = broker_router().split_for_parts();
    openapi
}

#[must_use]
pub fn legacy_openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = legacy_public_router()
        .merge(legacy_protected_router())
        .split_for_parts();
    openapi
}

/// Build the broker router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` document.
/// Routes added outside (like `OPTIONS /health`) are intentionally not documented.
pub(crate) fn broker_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi("Federated login broker"))
        .routes(routes!(root::root))
        .routes(routes!(health::health))
        .routes(routes!(session::create_session))
        .routes(routes!(session::poll))
        .routes(routes!(webhook::webhook))
        .routes(routes!(solana::nonce))
        .routes(routes!(solana::auth))
        .routes(routes!(google::login))
        .routes(routes!(google::callback))
        .routes(routes!(exchange::exchange));

    let mut broker_tag = Tag::new("broker");
    broker_tag.description = Some("QR sessions and one-time code exchange".to_string());
    router.get_openapi_mut().tags = Some(vec![
        broker_tag,
        Tag::new("telegram"),
        Tag::new("solana"),
        Tag::new("google"),
        Tag::new("health"),
    ]);

    router
}

/// Legacy routes reachable without `X-Auth-Token`.
pub(crate) fn legacy_public_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi("Legacy username/password service"))
        .routes(routes!(legacy::index))
        .routes(routes!(legacy::health))
}

/// Legacy routes guarded by `X-Auth-Token`.
pub(crate) fn legacy_protected_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::new()
        .routes(routes!(legacy::register))
        .routes(routes!(legacy::login))
        .routes(routes!(legacy::verify))
        .routes(routes!(legacy::refresh))
        .routes(routes!(legacy::rotate));

    let mut legacy_tag = Tag::new("legacy");
    legacy_tag.description = Some("Self-contained signed tokens".to_string());
    router.get_openapi_mut().tags = Some(vec![legacy_tag]);

    router
}

fn cargo_openapi(description: &str) -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(description))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = env!("CARGO_PKG_LICENSE").trim();
    if identifier.is_empty() {
        return None;
    }
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_document_lists_every_route() {
        let doc = openapi();
        for path in [
            "/",
            "/health",
            "/qr-session",
            "/poll/{token}",
            "/webhook",
            "/solana/nonce",
            "/solana/auth",
            "/google/login",
            "/google/callback",
            "/exchange",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn webhook_documents_update_body() {
        let doc = openapi();
        let webhook = doc.paths.paths.get("/webhook").and_then(|item| item.post.as_ref());
        assert!(webhook.is_some_and(|operation| operation.request_body.is_some()));
        let schemas = doc.components.as_ref().map(|components| &components.schemas);
        assert!(schemas.is_some_and(|schemas| schemas.contains_key("Update")));
    }

    #[test]
    fn legacy_document_lists_every_route() {
        let doc = legacy_openapi();
        for path in ["/", "/health", "/register", "/login", "/verify", "/refresh", "/rotate"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(!doc.paths.paths.contains_key("/exchange"));
    }

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Team Sesame <team@sesame.dev>"),
            (Some("Team Sesame"), Some("team@sesame.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author(" "), (None, None));
    }
}
