use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{JsonBody, PathParam},
    models::{
        ApiResponse, AuthorPosts, BlogStats, Comment, CommentWithPost, CreateCommentRequest,
        CreatePostRequest, ModerateCommentRequest, PaginatedResponse, Post, PostDetail,
        PostListQuery, PostStatus, PostWithCount, UpdateCommentRequest, UpdatePostRequest,
        UserRole,
    },
    pagination::{PageOptions, Pagination},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

pub const POST_NOT_FOUND: &str = "Post not found";
pub const COMMENT_NOT_FOUND: &str = "Comment not found";
pub const NOT_POST_OWNER: &str = "You are not the owner/creator of the post!";

// --- Filter Structs ---

/// PostFilter
///
/// Raw query parameters of `GET /post`. Everything arrives as text and is interpreted
/// leniently in `into_query`: unparseable paging values and unknown `isFeatured` values are
/// ignored, while a malformed `status` or `authorId` is a client error.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PostFilter {
    /// Case-insensitive match on title or content, or an exact tag.
    pub search: Option<String>,
    /// Comma-separated tags; a post must carry all of them.
    pub tags: Option<String>,
    /// `true` or `false`; any other value disables the filter.
    pub is_featured: Option<String>,
    /// `DRAFT`, `PUBLISHED` or `ARCHIVED`.
    pub status: Option<String>,
    pub author_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    /// `createdAt` (default), `updatedAt`, `title` or `views`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

impl PostFilter {
    pub fn into_query(self) -> AppResult<PostListQuery> {
        let tags = self
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let is_featured = match self.is_featured.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        let status = self
            .status
            .as_deref()
            .map(|raw| raw.parse::<PostStatus>().map_err(AppError::BadRequest))
            .transpose()?;

        let author_id = self
            .author_id
            .as_deref()
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::BadRequest(format!("Invalid authorId '{raw}'")))
            })
            .transpose()?;

        let page = PageOptions::from_raw(
            self.page.as_deref(),
            self.limit.as_deref(),
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
        );

        Ok(PostListQuery {
            search: self.search,
            tags,
            is_featured,
            status,
            author_id,
            page,
        })
    }
}

fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

// --- Misc ---

/// root
///
/// [Public Route] Service banner.
pub async fn root() -> &'static str {
    "Blog API"
}

// --- Post Handlers ---

/// create_post
///
/// [Authenticated Route] Creates a post owned by the caller. Only admins may create a
/// featured post.
#[utoipa::path(
    post,
    path = "/post",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Post>),
        (status = 400, description = "Blank title or content"),
        (status = 403, description = "Non-admin tried to feature the post")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Post>>)> {
    require_text(&payload.title, "title")?;
    require_text(&payload.content, "content")?;
    if payload.is_featured && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admin can feature a post!".to_string(),
        ));
    }

    let post = state.repo.create_post(user.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Post created successfully", post)),
    ))
}

/// list_posts
///
/// [Authenticated Route] Filtered, sorted and paged listing with per-post comment counts.
#[utoipa::path(
    get,
    path = "/post",
    params(PostFilter),
    responses(
        (status = 200, description = "Page of posts", body = PaginatedResponse<PostWithCount>),
        (status = 400, description = "Malformed status or authorId")
    )
)]
pub async fn list_posts(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> AppResult<Json<PaginatedResponse<PostWithCount>>> {
    let query = filter.into_query()?;
    let (posts, total) = state.repo.list_posts(&query).await?;

    Ok(Json(PaginatedResponse {
        success: true,
        message: "Posts retrieved successfully".to_string(),
        data: posts,
        pagination: Pagination::new(total, &query.page),
    }))
}

/// get_stats
///
/// [Admin Route] Aggregate counters for the moderation dashboard.
#[utoipa::path(
    get,
    path = "/post/stats",
    responses(
        (status = 200, description = "Stats", body = ApiResponse<BlogStats>),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BlogStats>>> {
    user.ensure_role(&[UserRole::Admin])?;
    let stats = state.repo.get_stats().await?;
    Ok(Json(ApiResponse::ok("Stats retrieved successfully", stats)))
}

/// get_my_posts
///
/// [Authenticated Route] Every post authored by the caller, drafts and archived included.
#[utoipa::path(
    get,
    path = "/post/my-post",
    responses((status = 200, description = "My posts", body = ApiResponse<AuthorPosts>))
)]
pub async fn get_my_posts(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<AuthorPosts>>> {
    let posts = state.repo.get_posts_by_author(id).await?;
    let data = AuthorPosts {
        total: posts.len() as i64,
        posts,
    };
    Ok(Json(ApiResponse::ok("My posts retrieved successfully", data)))
}

/// get_post
///
/// [Authenticated Route] Post detail. Each call counts as a view; the increment and the
/// read happen in one transaction inside the repository.
#[utoipa::path(
    get,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<PostDetail>),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    _user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<PostDetail>>> {
    let detail = state
        .repo
        .get_post_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Post retrieved successfully", detail)))
}

/// update_post
///
/// [Authenticated Route] Partial update by the author or an admin. Changing the featured
/// flag is reserved to admins.
#[utoipa::path(
    put,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Post>),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdatePostRequest>,
) -> AppResult<Json<ApiResponse<Post>>> {
    let existing = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;

    if existing.author_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(NOT_POST_OWNER.to_string()));
    }
    if let Some(is_featured) = payload.is_featured {
        if is_featured != existing.is_featured && !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only admin can change the featured flag!".to_string(),
            ));
        }
    }
    if let Some(title) = &payload.title {
        require_text(title, "title")?;
    }
    if let Some(content) = &payload.content {
        require_text(content, "content")?;
    }

    let post = state
        .repo
        .update_post(id, payload)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Post updated successfully", post)))
}

/// delete_post
///
/// [Authenticated Route] Removes a post (and its comments). Author or admin only.
#[utoipa::path(
    delete,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Post>),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Post>>> {
    let existing = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;

    if existing.author_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(NOT_POST_OWNER.to_string()));
    }

    let post = state
        .repo
        .delete_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Post deleted successfully", post)))
}

// --- Comment Handlers ---

/// create_comment
///
/// [Authenticated Route] Comments on a post, or replies to a comment of the same post.
/// Both targets are looked up right before the insert.
#[utoipa::path(
    post,
    path = "/comment",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Comment>),
        (status = 400, description = "Blank content or parent on another post"),
        (status = 404, description = "Post or parent comment not found")
    )
)]
pub async fn create_comment(
    AuthUser { id: author_id, .. }: AuthUser,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Comment>>)> {
    require_text(&payload.content, "content")?;

    state
        .repo
        .get_post(payload.post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(POST_NOT_FOUND.to_string()))?;

    if let Some(parent_id) = payload.parent_id {
        let parent = state
            .repo
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
        if parent.post_id != payload.post_id {
            return Err(AppError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
    }

    let comment = state.repo.create_comment(author_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Comment created successfully", comment)),
    ))
}

/// get_comment
///
/// [Public Route] A single comment with a summary of its post.
#[utoipa::path(
    get,
    path = "/comment/{commentId}",
    params(("commentId" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<CommentWithPost>),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<CommentWithPost>>> {
    let comment = state
        .repo
        .get_comment_with_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Comment retrieved successfully", comment)))
}

/// get_comments_by_author
///
/// [Public Route] All comments written by a user, newest first.
#[utoipa::path(
    get,
    path = "/comment/author/{authorId}",
    params(("authorId" = Uuid, Path, description = "Author ID")),
    responses((status = 200, description = "Comments", body = ApiResponse<Vec<CommentWithPost>>))
)]
pub async fn get_comments_by_author(
    State(state): State<AppState>,
    PathParam(author_id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<CommentWithPost>>>> {
    let comments = state.repo.get_comments_by_author(author_id).await?;
    Ok(Json(ApiResponse::ok(
        "Comments retrieved successfully",
        comments,
    )))
}

/// update_comment
///
/// [Authenticated Route] The author edits their own comment. Someone else's comment is
/// reported as missing. The `status` field is only accepted from admins.
#[utoipa::path(
    put,
    path = "/comment/{commentId}",
    params(("commentId" = Uuid, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Comment>),
        (status = 403, description = "Non-admin tried to change the status"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let existing = state
        .repo
        .get_comment(id)
        .await?
        .filter(|c| c.author_id == user.id)
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

    if payload.status.is_some() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admin can change a comment's status!".to_string(),
        ));
    }
    if let Some(content) = &payload.content {
        require_text(content, "content")?;
    }

    let comment = state
        .repo
        .update_comment(existing.id, payload)
        .await?
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Comment updated successfully", comment)))
}

/// delete_comment
///
/// [Authenticated Route] Two tiers: admins may force-delete any comment, everyone else
/// only their own. Replies are removed with it.
#[utoipa::path(
    delete,
    path = "/comment/{commentId}",
    params(("commentId" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Comment>),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let existing = state
        .repo
        .get_comment(id)
        .await?
        .filter(|c| c.author_id == user.id || user.is_admin())
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

    let comment = state
        .repo
        .delete_comment(existing.id)
        .await?
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok("Comment deleted successfully", comment)))
}

/// moderate_comment
///
/// [Admin Route] Approves or rejects a comment. Re-applying the current status is a
/// client error so moderators notice stale screens.
#[utoipa::path(
    patch,
    path = "/comment/{commentId}/commentControlByAdmin",
    params(("commentId" = Uuid, Path, description = "Comment ID")),
    request_body = ModerateCommentRequest,
    responses(
        (status = 200, description = "Moderated", body = ApiResponse<Comment>),
        (status = 400, description = "Status already applied"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn moderate_comment(
    user: AuthUser,
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<ModerateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    user.ensure_role(&[UserRole::Admin])?;

    let existing = state
        .repo
        .get_comment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;

    if existing.status == payload.status {
        return Err(AppError::BadRequest(format!(
            "Your provided status ({}) is already up to date.",
            payload.status
        )));
    }

    let comment = state
        .repo
        .set_comment_status(id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(COMMENT_NOT_FOUND.to_string()))?;
    Ok(Json(ApiResponse::ok(
        "Comment status updated successfully",
        comment,
    )))
}
