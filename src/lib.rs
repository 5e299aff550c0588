use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod comment_tree;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;

// Route groups split by access level (public, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use models::UserRole;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and the `ToSchema`
/// models. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_post, handlers::list_posts, handlers::get_stats,
        handlers::get_my_posts, handlers::get_post, handlers::update_post,
        handlers::delete_post, handlers::create_comment, handlers::get_comment,
        handlers::get_comments_by_author, handlers::update_comment,
        handlers::delete_comment, handlers::moderate_comment
    ),
    components(
        schemas(
            models::Post, models::PostWithCount, models::PostDetail, models::PostSummary,
            models::Comment, models::CommentThread, models::CommentWithPost,
            models::AuthorPosts, models::BlogStats, models::CreatePostRequest,
            models::UpdatePostRequest, models::CreateCommentRequest,
            models::UpdateCommentRequest, models::ModerateCommentRequest,
            models::PostStatus, models::CommentStatus, models::UserRole,
            pagination::Pagination,
        )
    ),
    tags(
        (name = "blog", description = "Blog posts, threaded comments and moderation")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable container for everything a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Data access, behind the `Repository` trait so tests can swap in a double.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Resolves the session once and stores the `AuthUser` in the request extensions.
/// A failed resolution short-circuits with the extractor's 401/403 rejection.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Runs after `auth_middleware`, so the principal is read back from the extensions.
async fn admin_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.ensure_role(&[UserRole::Admin])?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the route groups, their guards, the observability layers and CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // The last route_layer runs first: auth resolves the principal, admin checks it.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    admin_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// cors_layer
///
/// Only the configured front-end origin is allowed, with credentials. A malformed
/// `APP_URL` falls back to the local default instead of opening up to any origin.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = HeaderValue::from_str(&config.app_url).unwrap_or_else(|_| {
        tracing::warn!(app_url = %config.app_url, "APP_URL is not a valid origin; using default");
        HeaderValue::from_static(crate::config::DEFAULT_APP_URL)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-request-id"),
        ])
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags every log line of a request with its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
