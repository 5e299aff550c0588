use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Everything a signed-in `USER` or `ADMIN` can do. The auth middleware layered on top
/// has already resolved the `AuthUser`; ownership checks happen in the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Posts ---
        // POST /post creates, GET /post lists with filters and paging.
        .route("/post", post(handlers::create_post).get(handlers::list_posts))
        // GET /post/my-post
        // The caller's own posts regardless of status.
        .route("/post/my-post", get(handlers::get_my_posts))
        // GET/PUT/DELETE /post/{id}
        // Reading counts a view. Writes are limited to the author or an admin.
        .route(
            "/post/{id}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        // --- Comments ---
        // POST /comment
        // New comments start as PENDING until a moderator approves them.
        .route("/comment", post(handlers::create_comment))
        // PUT/DELETE /comment/{commentId}
        // GET on the same path is public and merged in from `public_routes`.
        .route(
            "/comment/{commentId}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}
