use axum::{Router, http::Method, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::pipeline::SearchPipeline;

pub mod handlers;
pub mod models;

pub fn create_router(pipeline: Arc<SearchPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/up_test", get(handlers::up_test_handler))
        .route("/search", get(handlers::search_handler))
        .with_state(pipeline)
        .layer(cors)
}
