//! Router construction: every route nests under `/api`.

use std::time::Duration;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::{intervals, managers, organizations, resources, status};

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/organization", post(organizations::create))
        .route("/organization/{id}", get(organizations::get))
        .route("/organization/{id}", delete(organizations::delete))
        .route("/organization/{id}/intervals", get(organizations::intervals))
        .route("/manager/add_many", post(managers::add_many))
        .route("/resource/add_many", post(resources::add_many))
        .route("/resource/{id}/membership", get(resources::get_membership))
        .route("/resource/{id}/membership", put(resources::put_membership))
        .route("/resource/{id}/membership", delete(resources::delete_membership))
        .route("/resource/{id}/apply_schedule", post(resources::apply_schedule))
        .route("/resource/{id}/intervals", get(resources::intervals))
        .route(
            "/resource/{id}/clear_unavailable_interval",
            post(resources::clear_unavailable_interval),
        )
        .route("/interval", post(intervals::create))
        .route("/interval/delete_many", delete(intervals::delete_many))
        .route("/interval/{id}", patch(intervals::update))
        .route("/interval/{id}", delete(intervals::delete))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        TraceLayer::new_for_http(),
        CompressionLayer::new().gzip(true).br(true).zstd(true),
        TimeoutLayer::new(Duration::from_secs(30)),
    ))
}
