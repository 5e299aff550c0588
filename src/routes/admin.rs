use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Admin Router Module
///
/// Moderation and dashboard endpoints. `create_router` wraps this group in the auth
/// middleware and then the admin middleware, and the handlers re-check the role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /post/stats
        // Dashboard counters read from one snapshot.
        .route("/post/stats", get(handlers::get_stats))
        // PATCH /comment/{commentId}/commentControlByAdmin
        // Approve or reject a comment.
        .route(
            "/comment/{commentId}/commentControlByAdmin",
            patch(handlers::moderate_comment),
        )
}
