use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pagination::{PageOptions, Pagination};

// --- Enumerations (Mapped to Postgres ENUM types) ---

/// UserRole
///
/// The RBAC field carried by every principal. Stored as the `user_role` enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// PostStatus
///
/// Publication lifecycle of a post. New posts are `PUBLISHED` unless the author says otherwise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "post_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "PUBLISHED" => Ok(PostStatus::Published),
            "ARCHIVED" => Ok(PostStatus::Archived),
            other => Err(format!("unknown post status '{other}'")),
        }
    }
}

/// CommentStatus
///
/// Moderation state of a comment. Only `APPROVED` comments are rendered under a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "comment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CommentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommentStatus::Pending => "PENDING",
            CommentStatus::Approved => "APPROVED",
            CommentStatus::Rejected => "REJECTED",
        };
        f.write_str(label)
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Mirror of the identity record owned by the external auth provider (`public.users`).
/// Only the fields needed to resolve a principal are read.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    // Unverified accounts are refused by the auth extractor.
    pub email_verified: bool,
}

/// Post
///
/// A blog article from the `public.posts` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub is_featured: bool,
    pub status: PostStatus,
    pub tags: Vec<String>,
    pub views: i32,
    // FK to public.users.id (Owner).
    pub author_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostWithCount
///
/// List row: a post plus the number of comments attached to it (any status).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,
    pub comment_count: i64,
}

/// Comment
///
/// A reply to a post, or to another comment when `parent_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub status: CommentStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CommentThread
///
/// A comment with its approved replies, as rendered on the post detail page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    #[schema(no_recursion)]
    pub replies: Vec<CommentThread>,
}

/// PostDetail
///
/// Output of `GET /post/{id}`: the post, its threaded approved comments, and the
/// total comment count regardless of moderation state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentThread>,
    pub comment_count: i64,
}

/// PostSummary
///
/// The slice of a post embedded in comment lookups.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub views: i32,
}

/// CommentWithPost
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentWithPost {
    #[serde(flatten)]
    pub comment: Comment,
    pub post: PostSummary,
}

/// AuthorPosts
///
/// Output of `GET /post/my-post`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthorPosts {
    pub total: i64,
    pub posts: Vec<PostWithCount>,
}

/// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for `POST /post`. The author is always taken from the session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// UpdatePostRequest
///
/// Partial update payload for `PUT /post/{id}`. Absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// CreateCommentRequest
///
/// Input payload for `POST /comment`. `parent_id` turns the comment into a reply.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
}

/// UpdateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    // Honoured only for admins; the handler rejects it for anyone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CommentStatus>,
}

/// ModerateCommentRequest
///
/// Input payload for `PATCH /comment/{commentId}/commentControlByAdmin`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ModerateCommentRequest {
    pub status: CommentStatus,
}

/// PostListQuery
///
/// Parsed, validated filter set handed from the list handler to the repository.
#[derive(Debug, Clone, Default)]
pub struct PostListQuery {
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: Option<bool>,
    pub status: Option<PostStatus>,
    pub author_id: Option<Uuid>,
    pub page: PageOptions,
}

/// --- Dashboard Schemas (Output) ---

/// BlogStats
///
/// Output schema for the administrative statistics endpoint (`GET /post/stats`).
/// All counters are read inside one transaction so they describe the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BlogStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub draft_posts: i64,
    pub archived_posts: i64,
    pub featured_posts: i64,
    pub total_views: i64,
    pub total_comments: i64,
    pub approved_comments: i64,
    pub pending_comments: i64,
    pub rejected_comments: i64,
    pub total_users: i64,
    pub admin_count: i64,
    pub user_count: i64,
}

/// --- Response Envelopes ---

/// ApiResponse
///
/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// PaginatedResponse
///
/// Success envelope for paged listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: Pagination,
}
