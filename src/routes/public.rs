use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only endpoints reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /comment/{commentId}
        // A single comment with a summary of the post it belongs to.
        .route("/comment/{commentId}", get(handlers::get_comment))
        // GET /comment/author/{authorId}
        .route(
            "/comment/author/{authorId}",
            get(handlers::get_comments_by_author),
        )
}
