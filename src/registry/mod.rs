//! HTTP service exposing projects, extensions and items.

use crate::typecode::{RangeRegistry, TypecodeAllocator};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::get,
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

use handlers::{extensions, health, items, projects};

/// Server settings resolved from the command line.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub dsn: SecretString,
    pub max_connections: u32,
    pub ranges: RangeRegistry,
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable or the listener cannot be bound
pub async fn new(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(config.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let ranges = config.ranges;
    info!(
        shared = %ranges.shared(),
        project = %ranges.project(),
        hybris = %ranges.hybris(),
        "Typecode ranges"
    );

    let app = router(pool, TypecodeAllocator::new(ranges));

    let listener = TcpListener::bind(format!("::0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the application router with middleware and shared state.
pub fn router(pool: PgPool, allocator: TypecodeAllocator) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .route("/health", get(health::health).options(health::health))
        .route("/healthcheck", get(health::health))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/extensions",
            get(extensions::list_extensions).post(extensions::create_extension),
        )
        // GET takes a scope name, PUT and DELETE an extension id
        .route(
            "/extensions/:id",
            get(extensions::list_extensions_by_scope)
                .put(extensions::update_extension)
                .delete(extensions::delete_extension),
        )
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
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
                .layer(Extension(allocator))
                .layer(Extension(pool)),
        )
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

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}
