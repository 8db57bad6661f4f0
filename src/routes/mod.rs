use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use axum::{routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    create_routes_with(&RateLimitConfig::from_env())
}

pub fn create_routes_with(rate_limit_config: &RateLimitConfig) -> Router {
    let api = read_routes(rate_limit_config).merge(write_routes(rate_limit_config));
    Router::new().nest("/api/v1", api)
}

/// Listing and lookup.
fn read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/reports", routing::get(handlers::report::list_reports))
        .route("/reports/{id}", routing::get(handlers::report::get_report));

    with_optional_rate_limit(router, config.enabled, config.read)
}

/// Submission and workflow transitions.
fn write_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/reports", routing::post(handlers::report::create_report))
        .route(
            "/reports/{id}/status",
            routing::put(handlers::report::update_status),
        )
        .route(
            "/reports/{id}/fine",
            routing::put(handlers::report::issue_fine),
        )
        .route(
            "/reports/{id}/resolve",
            routing::put(handlers::report::resolve_report),
        );

    with_optional_rate_limit(router, config.enabled, config.write)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(rule.replenish_interval_ms())
        .burst_size(rule.burst_size)
        .finish()
        .expect("Invalid rate limit configuration");

    router.layer(GovernorLayer::new(governor_conf))
}
