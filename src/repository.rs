use crate::{
    comment_tree::{MAX_REPLY_DEPTH, build_comment_tree},
    error::AppResult,
    models::{
        BlogStats, Comment, CommentStatus, CommentWithPost, CreateCommentRequest,
        CreatePostRequest, Post, PostDetail, PostListQuery, PostStatus, PostSummary,
        PostWithCount, UpdateCommentRequest, UpdatePostRequest, User, UserRole,
    },
    pagination::PostSortField,
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, letting handlers talk to
/// the data layer without knowing whether it is Postgres or an in-memory double.
///
/// Every method returns `AppResult` so data-layer failures travel untouched to the global
/// error translator. "Not found" is modelled as `Ok(None)` and left to the handler to
/// phrase.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    // --- Posts ---
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> AppResult<Post>;
    // Filtered, sorted page of posts plus the total number of matches.
    async fn list_posts(&self, query: &PostListQuery) -> AppResult<(Vec<PostWithCount>, i64)>;
    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>>;
    // Increments the view counter and reads the threaded post in one transaction.
    async fn get_post_detail(&self, id: Uuid) -> AppResult<Option<PostDetail>>;
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<Post>>;
    async fn delete_post(&self, id: Uuid) -> AppResult<Option<Post>>;
    async fn get_posts_by_author(&self, author_id: Uuid) -> AppResult<Vec<PostWithCount>>;
    async fn get_stats(&self) -> AppResult<BlogStats>;

    // --- Comments ---
    async fn create_comment(
        &self,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> AppResult<Comment>;
    async fn get_comment(&self, id: Uuid) -> AppResult<Option<Comment>>;
    async fn get_comment_with_post(&self, id: Uuid) -> AppResult<Option<CommentWithPost>>;
    async fn get_comments_by_author(&self, author_id: Uuid) -> AppResult<Vec<CommentWithPost>>;
    async fn update_comment(
        &self,
        id: Uuid,
        req: UpdateCommentRequest,
    ) -> AppResult<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> AppResult<Option<Comment>>;
    // Admin moderation: approve, reject or send back to pending.
    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> AppResult<Option<Comment>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Row shape of the comment + post join; folded into `CommentWithPost`.
#[derive(FromRow)]
struct CommentPostRow {
    #[sqlx(flatten)]
    comment: Comment,
    post_title: String,
    post_views: i32,
}

impl From<CommentPostRow> for CommentWithPost {
    fn from(row: CommentPostRow) -> Self {
        let post = PostSummary {
            id: row.comment.post_id,
            title: row.post_title,
            views: row.post_views,
        };
        CommentWithPost {
            comment: row.comment,
            post,
        }
    }
}

#[derive(FromRow)]
struct PostCounters {
    total: i64,
    published: i64,
    draft: i64,
    archived: i64,
    featured: i64,
    total_views: i64,
}

#[derive(FromRow)]
struct CommentCounters {
    total: i64,
    approved: i64,
    pending: i64,
    rejected: i64,
}

#[derive(FromRow)]
struct UserCounters {
    total: i64,
    admins: i64,
    users: i64,
}

/// Escapes `LIKE` wildcards so user input matches literally under `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// push_post_filters
///
/// Appends the AND-ed list filters to a query whose base already ends in a `WHERE` clause.
/// Every client-supplied value goes through `push_bind`.
fn push_post_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PostListQuery) {
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // Literal case-insensitive substring on title/content, exact match on a tag.
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (p.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\' OR p.content ILIKE ");
        builder.push_bind(pattern);
        builder.push(r" ESCAPE '\' OR ");
        builder.push_bind(search.to_string());
        builder.push(" = ANY(p.tags))");
    }

    if !query.tags.is_empty() {
        // Post must carry every requested tag.
        builder.push(" AND p.tags @> ");
        builder.push_bind(query.tags.clone());
    }

    if let Some(is_featured) = query.is_featured {
        builder.push(" AND p.is_featured = ");
        builder.push_bind(is_featured);
    }

    if let Some(status) = query.status {
        builder.push(" AND p.status = ");
        builder.push_bind(status);
    }

    if let Some(author_id) = query.author_id {
        builder.push(" AND p.author_id = ");
        builder.push_bind(author_id);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Reads the fields needed to resolve a principal.
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, email_verified FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // --- POSTS ---

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> AppResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, title, content, thumbnail, is_featured, status, tags, views, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, NOW(), NOW())
            RETURNING id, title, content, thumbnail, is_featured, status, tags, views, author_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.content)
        .bind(req.thumbnail)
        .bind(req.is_featured)
        .bind(req.status.unwrap_or_default())
        .bind(req.tags)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(post_id = %post.id, %author_id, "post created");
        Ok(post)
    }

    /// list_posts
    ///
    /// Uses QueryBuilder so the optional filters stay parameterized. The same filter
    /// set drives both the page query and the total count.
    async fn list_posts(&self, query: &PostListQuery) -> AppResult<(Vec<PostWithCount>, i64)> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                p.id, p.title, p.content, p.thumbnail, p.is_featured, p.status,
                p.tags, p.views, p.author_id, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
            FROM posts p
            WHERE 1 = 1
            "#,
        );
        push_post_filters(&mut builder, query);

        builder.push(" ORDER BY ");
        builder.push(query.page.sort_by.column());
        builder.push(" ");
        builder.push(query.page.sort_order.as_sql());
        if query.page.sort_by != PostSortField::CreatedAt {
            builder.push(", p.created_at ASC");
        }
        builder.push(" LIMIT ");
        builder.push_bind(query.page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.page.skip);

        let posts = builder
            .build_query_as::<PostWithCount>()
            .fetch_all(&self.pool)
            .await?;

        let mut counter: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1 = 1");
        push_post_filters(&mut counter, query);
        let total: i64 = counter
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, total))
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, thumbnail, is_featured, status, tags, views,
                      author_id, created_at, updated_at
               FROM posts
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    /// get_post_detail
    ///
    /// The view increment, the comment read and the count run in one transaction so the
    /// returned `views` is the value this request produced. A missing post rolls back
    /// without touching anything.
    async fn get_post_detail(&self, id: Uuid) -> AppResult<Option<PostDetail>> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(
            r#"UPDATE posts SET views = views + 1
               WHERE id = $1
               RETURNING id, title, content, thumbnail, is_featured, status, tags, views,
                         author_id, created_at, updated_at"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(post) = post else {
            tx.rollback().await?;
            return Ok(None);
        };

        let approved = sqlx::query_as::<_, Comment>(
            r#"SELECT id, content, author_id, post_id, parent_id, status, created_at, updated_at
               FROM comments
               WHERE post_id = $1 AND status = $2
               ORDER BY created_at DESC"#,
        )
        .bind(id)
        .bind(CommentStatus::Approved)
        .fetch_all(&mut *tx)
        .await?;

        let comment_count: i64 =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Some(PostDetail {
            post,
            comments: build_comment_tree(approved, MAX_REPLY_DEPTH),
            comment_count,
        }))
    }

    /// update_post
    ///
    /// Partial update: `COALESCE` keeps the stored value for every field left as `None`.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                thumbnail = COALESCE($4, thumbnail),
                is_featured = COALESCE($5, is_featured),
                status = COALESCE($6, status),
                tags = COALESCE($7, tags),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, content, thumbnail, is_featured, status, tags, views,
                      author_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.thumbnail)
        .bind(req.is_featured)
        .bind(req.status)
        .bind(req.tags)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    /// delete_post
    ///
    /// Comments go with the post through `ON DELETE CASCADE`.
    async fn delete_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"DELETE FROM posts WHERE id = $1
               RETURNING id, title, content, thumbnail, is_featured, status, tags, views,
                         author_id, created_at, updated_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(post) = &post {
            tracing::info!(post_id = %post.id, "post deleted");
        }
        Ok(post)
    }

    async fn get_posts_by_author(&self, author_id: Uuid) -> AppResult<Vec<PostWithCount>> {
        let posts = sqlx::query_as::<_, PostWithCount>(
            r#"
            SELECT
                p.id, p.title, p.content, p.thumbnail, p.is_featured, p.status,
                p.tags, p.views, p.author_id, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
            FROM posts p
            WHERE p.author_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// get_stats
    ///
    /// All dashboard counters from one REPEATABLE READ snapshot.
    async fn get_stats(&self) -> AppResult<BlogStats> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let posts = sqlx::query_as::<_, PostCounters>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = $1) AS published,
                COUNT(*) FILTER (WHERE status = $2) AS draft,
                COUNT(*) FILTER (WHERE status = $3) AS archived,
                COUNT(*) FILTER (WHERE is_featured) AS featured,
                COALESCE(SUM(views), 0)::BIGINT AS total_views
            FROM posts
            "#,
        )
        .bind(PostStatus::Published)
        .bind(PostStatus::Draft)
        .bind(PostStatus::Archived)
        .fetch_one(&mut *tx)
        .await?;

        let comments = sqlx::query_as::<_, CommentCounters>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = $1) AS approved,
                COUNT(*) FILTER (WHERE status = $2) AS pending,
                COUNT(*) FILTER (WHERE status = $3) AS rejected
            FROM comments
            "#,
        )
        .bind(CommentStatus::Approved)
        .bind(CommentStatus::Pending)
        .bind(CommentStatus::Rejected)
        .fetch_one(&mut *tx)
        .await?;

        let users = sqlx::query_as::<_, UserCounters>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE role = $1) AS admins,
                COUNT(*) FILTER (WHERE role = $2) AS users
            FROM users
            "#,
        )
        .bind(UserRole::Admin)
        .bind(UserRole::User)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BlogStats {
            total_posts: posts.total,
            published_posts: posts.published,
            draft_posts: posts.draft,
            archived_posts: posts.archived,
            featured_posts: posts.featured,
            total_views: posts.total_views,
            total_comments: comments.total,
            approved_comments: comments.approved,
            pending_comments: comments.pending,
            rejected_comments: comments.rejected,
            total_users: users.total,
            admin_count: users.admins,
            user_count: users.users,
        })
    }

    // --- COMMENTS ---

    /// create_comment
    ///
    /// New comments start as `PENDING` and stay hidden from the post page until approved.
    async fn create_comment(
        &self,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> AppResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, content, author_id, post_id, parent_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, content, author_id, post_id, parent_id, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.content)
        .bind(author_id)
        .bind(req.post_id)
        .bind(req.parent_id)
        .bind(CommentStatus::Pending)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(comment_id = %comment.id, post_id = %comment.post_id, "comment created");
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"SELECT id, content, author_id, post_id, parent_id, status, created_at, updated_at
               FROM comments
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn get_comment_with_post(&self, id: Uuid) -> AppResult<Option<CommentWithPost>> {
        let row = sqlx::query_as::<_, CommentPostRow>(
            r#"
            SELECT
                c.id, c.content, c.author_id, c.post_id, c.parent_id, c.status,
                c.created_at, c.updated_at,
                p.title AS post_title, p.views AS post_views
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CommentWithPost::from))
    }

    async fn get_comments_by_author(&self, author_id: Uuid) -> AppResult<Vec<CommentWithPost>> {
        let rows = sqlx::query_as::<_, CommentPostRow>(
            r#"
            SELECT
                c.id, c.content, c.author_id, c.post_id, c.parent_id, c.status,
                c.created_at, c.updated_at,
                p.title AS post_title, p.views AS post_views
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.author_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CommentWithPost::from).collect())
    }

    async fn update_comment(
        &self,
        id: Uuid,
        req: UpdateCommentRequest,
    ) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments
            SET content = COALESCE($2, content),
                status = COALESCE($3, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, content, author_id, post_id, parent_id, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(req.content)
        .bind(req.status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    /// delete_comment
    ///
    /// Replies are removed with their parent through `ON DELETE CASCADE`.
    async fn delete_comment(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"DELETE FROM comments WHERE id = $1
               RETURNING id, content, author_id, post_id, parent_id, status, created_at, updated_at"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> AppResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            UPDATE comments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, content, author_id, post_id, parent_id, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(comment) = &comment {
            tracing::info!(comment_id = %comment.id, %status, "comment moderated");
        }
        Ok(comment)
    }
}
