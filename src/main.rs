use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Extension},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use civic_reports::config::{LifecycleConfig, StoreConfig};
use civic_reports::routes;
use civic_reports::services::store::ReportStore;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // base64 photos

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        civic_reports::handlers::report::create_report,
        civic_reports::handlers::report::list_reports,
        civic_reports::handlers::report::get_report,
        civic_reports::handlers::report::update_status,
        civic_reports::handlers::report::issue_fine,
        civic_reports::handlers::report::resolve_report,
    ),
    components(
        schemas(
            civic_reports::error::AppError,
            civic_reports::models::Report,
            civic_reports::models::ReportStatus,
            civic_reports::handlers::report::CreateReportRequest,
            civic_reports::handlers::report::ListReportsQuery,
            civic_reports::handlers::report::UpdateStatusRequest,
        )
    ),
    tags(
        (name = "reports", description = "Civic issue reports and their workflow"),
    )
)]
struct ApiDoc;

struct ServerConfig {
    lifecycle: LifecycleConfig,
    store: StoreConfig,
    public_dir: String,
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = validate_config()?;

    tracing::info!("Starting Civic Reports API v{}...", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Fine amount {}, reward amount {}, strict submissions: {}, status override: {}",
        config.lifecycle.fine_amount,
        config.lifecycle.reward_amount,
        config.lifecycle.require_fields,
        config.lifecycle.allow_status_override
    );

    // A store that cannot be read must never be served.
    let store = ReportStore::open(&config.store.data_file)
        .await
        .with_context(|| {
            format!(
                "Failed to load report store from '{}'",
                config.store.data_file.display()
            )
        })?;

    let app = create_app(&config.public_dir, config.max_body_bytes)
        .layer(Extension(store))
        .layer(Extension(config.lifecycle));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "civic_reports=debug,tower_http=debug,axum=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json_logs = env::var("LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<ServerConfig> {
    let lifecycle = LifecycleConfig::from_env()?;
    let store = StoreConfig::from_env();

    let public_dir = env::var("PUBLIC_DIR").unwrap_or_else(|_| "./public".to_string());
    if !std::path::Path::new(&public_dir).is_dir() {
        tracing::warn!(
            "Static asset directory '{}' does not exist, only the API will be served",
            public_dir
        );
    }

    let max_body_bytes = match env::var("MAX_BODY_BYTES") {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!("MAX_BODY_BYTES must be a positive integer, got '{}'", raw)
        })?,
        Err(_) => DEFAULT_MAX_BODY_BYTES,
    };

    Ok(ServerConfig {
        lifecycle,
        store,
        public_dir,
        max_body_bytes,
    })
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app(public_dir: &str, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(public_dir))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(store): Extension<ReportStore>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "Civic Reports API",
        "version": env!("CARGO_PKG_VERSION"),
        "reports": store.len().await,
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
