use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::api::{account_handlers, handlers, instance_handlers};
use crate::store::traits::Store;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    create_router_with_timeout(DEFAULT_REQUEST_TIMEOUT)
}

pub fn create_router_with_timeout<S: Store + 'static>(request_timeout: Duration) -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/catalog/stats", get(handlers::catalog_stats::<S>))
        .route("/sets/search", get(handlers::search_sets::<S>))
        .route("/sets/suggestions", get(handlers::suggest_sets::<S>))
        .route("/sets/:set_num", get(handlers::get_set::<S>))
        .route("/themes/:theme_id", get(handlers::get_theme::<S>))
        .route("/parts/:part_num", get(handlers::get_part::<S>))
        .route("/colors/:color_id", get(handlers::get_color::<S>))
        // Accounts
        .route("/accounts/register", post(account_handlers::register::<S>))
        .route("/accounts/login", post(account_handlers::login::<S>))
        // Inventory instances
        .route(
            "/instances",
            get(instance_handlers::list_instances::<S>)
                .post(instance_handlers::create_instance::<S>),
        )
        .route(
            "/instances/:instance_id",
            get(instance_handlers::get_instance::<S>)
                .delete(instance_handlers::delete_instance::<S>),
        )
        .route(
            "/instances/:instance_id/name",
            patch(instance_handlers::rename_instance::<S>),
        )
        .route(
            "/instances/:instance_id/quantity",
            post(instance_handlers::adjust_quantity::<S>),
        )
        .route(
            "/instances/:instance_id/parts",
            put(instance_handlers::add_part::<S>),
        )
        // Batch save keyed by set and instance name
        .route(
            "/sets/:set_num/modifications",
            get(instance_handlers::get_modifications::<S>)
                .put(instance_handlers::save_modifications::<S>),
        )
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}
