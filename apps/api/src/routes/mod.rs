pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/searches",
            post(handlers::handle_create_search).get(handlers::handle_recent_searches),
        )
        .route(
            "/api/v1/searches/:id/documents",
            get(handlers::handle_search_documents),
        )
        .route("/api/v1/documents/top", get(handlers::handle_top_documents))
        .route(
            "/api/v1/comments/:external_id",
            get(handlers::handle_document_comments),
        )
        .with_state(state)
}
