use super::handlers::{
    announcements, auth, devotees, events, health, otp_auth, payments, pujas, root,
};
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Handlers sharing a path must be registered in the same `routes!` call.
/// Routes added outside (like `/` or `OPTIONS /health`) are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(root::status))
        .routes(routes!(otp_auth::request_otp))
        .routes(routes!(otp_auth::verify_otp))
        .routes(routes!(auth::profile))
        .routes(routes!(auth::register_admin))
        .routes(routes!(auth::legacy_register))
        .routes(routes!(auth::legacy_login))
        .routes(routes!(devotees::list_devotees, devotees::create_devotee))
        .routes(routes!(
            devotees::get_devotee,
            devotees::update_devotee,
            devotees::delete_devotee
        ))
        .routes(routes!(devotees::add_donation))
        .routes(routes!(
            announcements::list_announcements,
            announcements::create_announcement
        ))
        .routes(routes!(
            announcements::get_announcement,
            announcements::update_announcement,
            announcements::delete_announcement
        ))
        .routes(routes!(events::list_events, events::create_event))
        .routes(routes!(events::upcoming_events))
        .routes(routes!(
            events::get_event,
            events::update_event,
            events::delete_event
        ))
        .routes(routes!(events::register_for_event))
        .routes(routes!(pujas::list_pujas, pujas::create_puja))
        .routes(routes!(pujas::book_puja))
        .routes(routes!(pujas::my_bookings))
        .routes(routes!(pujas::cancel_booking))
        .routes(routes!(pujas::list_bookings))
        .routes(routes!(pujas::update_booking_status))
        .routes(routes!(pujas::get_puja, pujas::update_puja, pujas::delete_puja))
        .routes(routes!(payments::create_payment))
        .routes(routes!(payments::list_payments))
        .routes(routes!(payments::my_payments))
        .routes(routes!(
            payments::get_payment,
            payments::update_payment,
            payments::delete_payment
        ));

    router.get_openapi_mut().tags = Some(vec![
        tag("temple", "Service status"),
        tag("auth", "Mobile OTP sign-in and registration"),
        tag("devotees", "Member records and donations"),
        tag("announcements", "Temple announcements"),
        tag("events", "Temple events and sign-ups"),
        tag("pujas", "Puja catalogue and bookings"),
        tag("payments", "Payment ledger"),
        tag("health", "Liveness and dependency checks"),
    ]);

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
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

    let mut components = Components::new();
    components.add_security_scheme(
        "bearer",
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build(),
        ),
    );

    OpenApiBuilder::new()
        .info(info)
        .components(Some(components))
        .build()
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
    fn non_empty(s: &str) -> Option<&str> {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }

    match author.find('<') {
        Some(start) => (
            non_empty(&author[..start]),
            non_empty(author[start + 1..].trim_end_matches('>')),
        ),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Temple Devs"));
            assert_eq!(contact.email.as_deref(), Some("devs@temple.app"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        for name in [
            "temple",
            "auth",
            "devotees",
            "announcements",
            "events",
            "pujas",
            "payments",
            "health",
        ] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }

        for path in [
            "/api/otp-auth/request-otp",
            "/api/otp-auth/verify-otp",
            "/api/auth/profile",
            "/api/auth/register/admin",
            "/api/devotees",
            "/api/devotees/{id}",
            "/api/devotees/{id}/donations",
            "/api/announcements",
            "/api/announcements/{id}",
            "/api/events",
            "/api/events/upcoming",
            "/api/events/{id}",
            "/api/events/{id}/register",
            "/api/pujas",
            "/api/pujas/{id}",
            "/api/pujas/book",
            "/api/pujas/bookings",
            "/api/pujas/bookings/{id}",
            "/api/pujas/admin/bookings",
            "/api/pujas/admin/bookings/{id}",
            "/api/payments",
            "/api/payments/all",
            "/api/payments/my-payments",
            "/api/payments/{id}",
            "/api/status",
            "/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let spec = openapi();
        let schemes = spec
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Temple Devs <devs@temple.app>"),
            (Some("Temple Devs"), Some("devs@temple.app"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
    }
}
