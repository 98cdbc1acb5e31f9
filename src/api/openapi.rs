use super::handlers::{account, auth, health};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Everything documented lives under `/v1`. Add new endpoints here via
/// `.routes(routes!(...))` so they are both served and included in the
/// generated spec. Routes added outside (like `/` or `OPTIONS /health`)
/// are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path.
    let v1 = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::otp::verify_otp))
        .routes(routes!(auth::otp::resend_otp))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::session::refresh))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::reset::request_reset))
        .routes(routes!(auth::reset::confirm_reset))
        .routes(routes!(auth::reset::set_new_password))
        .routes(routes!(account::update, account::delete))
        .routes(routes!(account::dashboard));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description =
        Some("Registration, email verification, sessions, and password reset".to_string());

    let mut account_tag = Tag::new("account");
    account_tag.description = Some("Authenticated account management".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and database health".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![auth_tag, account_tag, health_tag]);

    OpenApiRouter::with_openapi(openapi).nest("/v1", v1)
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

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
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
