use crate::api::{
    handlers::{health, root},
    state::AppState,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;
pub mod state;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, Swagger UI, the
/// undocumented banner and health preflight, and the shared middleware stack.
///
/// # Errors
/// Returns an error if `cors_origin` is not a valid absolute URL.
pub fn app(state: Arc<AppState>, cors_origin: Option<&str>) -> Result<Router> {
    let cors = cors_layer(cors_origin)?;

    let (router, openapi) = router().split_for_parts();
    let app = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, state: Arc<AppState>, cors_origin: Option<String>) -> Result<()> {
    let app = app(state, cors_origin.as_deref())?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn cors_layer(cors_origin: Option<&str>) -> Result<CorsLayer> {
    let Some(origin) = cors_origin else {
        // Mobile clients send no Origin; browsers in development get any origin.
        return Ok(CorsLayer::permissive());
    };

    Ok(CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("admin-secret-key"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(AllowOrigin::exact(frontend_origin(origin)?)))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid CORS origin: {frontend_base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {frontend_base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://admin.temple.app:8443/dashboard?x=1")?;
        assert_eq!(origin, "https://admin.temple.app:8443");
        Ok(())
    }

    #[test]
    fn frontend_origin_without_port() -> Result<()> {
        let origin = frontend_origin("http://localhost/")?;
        assert_eq!(origin, "http://localhost");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
        assert!(cors_layer(Some("not a url")).is_err());
        assert!(cors_layer(None).is_ok());
    }
}
