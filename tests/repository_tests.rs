//! Postgres-backed repository tests. They need a reachable `DATABASE_URL` and are
//! ignored by default: `cargo test -- --ignored`.

use blog_api::{
    models::{
        CommentStatus, CreateCommentRequest, CreatePostRequest, PostListQuery, PostStatus,
        UpdateCommentRequest, UpdatePostRequest, User, UserRole,
    },
    pagination::PageOptions,
    repository::{PostgresRepository, Repository},
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(pool: &PgPool, role: UserRole) -> User {
    let id = Uuid::new_v4();
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, role, email_verified)
        VALUES ($1, $2, $3, $4, TRUE)
        RETURNING id, name, email, role, email_verified
        "#,
    )
    .bind(id)
    .bind("Test User")
    .bind(format!("{id}@blog.test"))
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to create test user")
}

fn post_request(title: &str, tags: &[&str]) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        content: format!("{title} content"),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..CreatePostRequest::default()
    }
}

// --- Tests ---

#[test]
#[ignore]
async fn test_get_user_roundtrip() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let admin = create_test_user(&ctx.pool, UserRole::Admin).await;

    let found = repo.get_user(admin.id).await.unwrap().unwrap();
    assert_eq!(found.role, UserRole::Admin);
    assert!(repo.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_post_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&ctx.pool, UserRole::User).await;

    let post = repo
        .create_post(author.id, post_request("Lifecycle", &["rust"]))
        .await
        .unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.views, 0);

    let updated = repo
        .update_post(
            post.id,
            UpdatePostRequest {
                title: Some("Lifecycle v2".to_string()),
                ..UpdatePostRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Lifecycle v2");
    assert_eq!(updated.content, "Lifecycle content");
    assert!(updated.updated_at >= post.updated_at);

    let deleted = repo.delete_post(post.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, post.id);
    assert!(repo.get_post(post.id).await.unwrap().is_none());
    assert!(repo.delete_post(post.id).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_list_posts_filters_by_author_and_tags() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&ctx.pool, UserRole::User).await;

    repo.create_post(author.id, post_request("Tagged both", &["rust", "web"]))
        .await
        .unwrap();
    repo.create_post(author.id, post_request("Tagged one", &["rust"]))
        .await
        .unwrap();

    let query = PostListQuery {
        author_id: Some(author.id),
        tags: vec!["rust".to_string(), "web".to_string()],
        page: PageOptions::default(),
        ..PostListQuery::default()
    };
    let (posts, total) = repo.list_posts(&query).await.unwrap();

    assert_eq!(total, 1);
    assert_eq!(posts[0].post.title, "Tagged both");
    assert_eq!(posts[0].comment_count, 0);

    let search = PostListQuery {
        author_id: Some(author.id),
        search: Some("TAGGED ONE".to_string()),
        ..PostListQuery::default()
    };
    let (posts, total) = repo.list_posts(&search).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(posts[0].post.title, "Tagged one");
}

#[test]
#[ignore]
async fn test_search_treats_wildcards_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&ctx.pool, UserRole::User).await;

    repo.create_post(author.id, post_request("Plain title", &[]))
        .await
        .unwrap();
    repo.create_post(author.id, post_request("Save 50% today", &[]))
        .await
        .unwrap();
    repo.create_post(author.id, post_request("Only 50 left", &[]))
        .await
        .unwrap();

    let search = |term: &str| PostListQuery {
        author_id: Some(author.id),
        search: Some(term.to_string()),
        ..PostListQuery::default()
    };

    let (_, total) = repo.list_posts(&search("_")).await.unwrap();
    assert_eq!(total, 0);

    let (posts, total) = repo.list_posts(&search("50%")).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(posts[0].post.title, "Save 50% today");
}

#[test]
#[ignore]
async fn test_post_detail_counts_view_and_threads_comments() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&ctx.pool, UserRole::User).await;
    let post = repo
        .create_post(author.id, post_request("Detail", &[]))
        .await
        .unwrap();

    let root = repo
        .create_comment(
            author.id,
            CreateCommentRequest {
                content: "root".to_string(),
                post_id: post.id,
                parent_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(root.status, CommentStatus::Pending);

    let reply = repo
        .create_comment(
            author.id,
            CreateCommentRequest {
                content: "reply".to_string(),
                post_id: post.id,
                parent_id: Some(root.id),
            },
        )
        .await
        .unwrap();

    repo.set_comment_status(root.id, CommentStatus::Approved)
        .await
        .unwrap();
    repo.set_comment_status(reply.id, CommentStatus::Approved)
        .await
        .unwrap();

    let detail = repo.get_post_detail(post.id).await.unwrap().unwrap();
    assert_eq!(detail.post.views, 1);
    assert_eq!(detail.comment_count, 2);
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].replies[0].comment.id, reply.id);

    let again = repo.get_post_detail(post.id).await.unwrap().unwrap();
    assert_eq!(again.post.views, 2);

    assert!(repo.get_post_detail(Uuid::new_v4()).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_comment_queries_and_updates() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&ctx.pool, UserRole::User).await;
    let post = repo
        .create_post(author.id, post_request("Comments", &[]))
        .await
        .unwrap();
    let comment = repo
        .create_comment(
            author.id,
            CreateCommentRequest {
                content: "hello".to_string(),
                post_id: post.id,
                parent_id: None,
            },
        )
        .await
        .unwrap();

    let with_post = repo.get_comment_with_post(comment.id).await.unwrap().unwrap();
    assert_eq!(with_post.post.title, "Comments");

    let by_author = repo.get_comments_by_author(author.id).await.unwrap();
    assert_eq!(by_author.len(), 1);

    let edited = repo
        .update_comment(
            comment.id,
            UpdateCommentRequest {
                content: Some("edited".to_string()),
                status: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edited.content, "edited");
    assert_eq!(edited.status, CommentStatus::Pending);

    repo.delete_comment(comment.id).await.unwrap().unwrap();
    assert!(repo.get_comment(comment.id).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_stats_reflect_new_rows() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let before = repo.get_stats().await.unwrap();

    let author = create_test_user(&ctx.pool, UserRole::User).await;
    repo.create_post(
        author.id,
        CreatePostRequest {
            status: Some(PostStatus::Draft),
            ..post_request("Stats", &[])
        },
    )
    .await
    .unwrap();

    let after = repo.get_stats().await.unwrap();
    assert!(after.total_posts > before.total_posts);
    assert!(after.draft_posts > before.draft_posts);
    assert!(after.total_users > before.total_users);
}
