#![allow(dead_code)]

use async_trait::async_trait;
use blog_api::{
    AppState,
    auth::AuthUser,
    comment_tree::{MAX_REPLY_DEPTH, build_comment_tree},
    config::AppConfig,
    error::AppResult,
    models::{
        BlogStats, Comment, CommentStatus, CommentWithPost, CreateCommentRequest,
        CreatePostRequest, Post, PostDetail, PostListQuery, PostStatus, PostSummary,
        PostWithCount, UpdateCommentRequest, UpdatePostRequest, User, UserRole,
    },
    pagination::{PostSortField, SortOrder},
    repository::Repository,
};
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

// Keeps rows in plain vectors so handler and router tests can seed data, call the
// API, and inspect what was written without a database.
#[derive(Default)]
pub struct InMemoryRepo {
    pub users: Mutex<Vec<User>>,
    pub posts: Mutex<Vec<Post>>,
    pub comments: Mutex<Vec<Comment>>,
}

impl InMemoryRepo {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    pub fn insert_post(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }

    pub fn insert_comment(&self, comment: Comment) {
        self.comments.lock().unwrap().push(comment);
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    pub fn comment(&self, id: Uuid) -> Option<Comment> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    fn count_comments(&self, post_id: Uuid) -> i64 {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.post_id == post_id)
            .count() as i64
    }

    fn summary(&self, post_id: Uuid) -> PostSummary {
        self.post(post_id)
            .map(|p| PostSummary {
                id: p.id,
                title: p.title,
                views: p.views,
            })
            .unwrap_or_default()
    }
}

fn matches(post: &Post, query: &PostListQuery) -> bool {
    if let Some(term) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let term = term.to_lowercase();
        let hit = post.title.to_lowercase().contains(&term)
            || post.content.to_lowercase().contains(&term)
            || post.tags.iter().any(|t| t.to_lowercase() == term);
        if !hit {
            return false;
        }
    }
    query.tags.iter().all(|t| post.tags.contains(t))
        && query.is_featured.is_none_or(|f| post.is_featured == f)
        && query.status.is_none_or(|s| post.status == s)
        && query.author_id.is_none_or(|a| post.author_id == a)
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> AppResult<Post> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            thumbnail: req.thumbnail,
            is_featured: req.is_featured,
            status: req.status.unwrap_or_default(),
            tags: req.tags,
            views: 0,
            author_id,
            created_at: now,
            updated_at: now,
        };
        self.insert_post(post.clone());
        Ok(post)
    }

    async fn list_posts(&self, query: &PostListQuery) -> AppResult<(Vec<PostWithCount>, i64)> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches(p, query))
            .cloned()
            .collect();

        posts.sort_by(|a, b| {
            let ord = match query.page.sort_by {
                PostSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                PostSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                PostSortField::Title => a.title.cmp(&b.title),
                PostSortField::Views => a.views.cmp(&b.views),
            };
            match query.page.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = posts.len() as i64;
        let page = posts
            .into_iter()
            .skip(query.page.skip as usize)
            .take(query.page.limit as usize)
            .map(|post| PostWithCount {
                comment_count: self.count_comments(post.id),
                post,
            })
            .collect();
        Ok((page, total))
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        Ok(self.post(id))
    }

    async fn get_post_detail(&self, id: Uuid) -> AppResult<Option<PostDetail>> {
        let post = {
            let mut posts = self.posts.lock().unwrap();
            let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
                return Ok(None);
            };
            post.views += 1;
            post.clone()
        };

        let approved = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.post_id == id && c.status == CommentStatus::Approved)
            .cloned()
            .collect();

        Ok(Some(PostDetail {
            comment_count: self.count_comments(id),
            comments: build_comment_tree(approved, MAX_REPLY_DEPTH),
            post,
        }))
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<Post>> {
        let mut posts = self.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(content) = req.content {
            post.content = content;
        }
        if let Some(thumbnail) = req.thumbnail {
            post.thumbnail = Some(thumbnail);
        }
        if let Some(is_featured) = req.is_featured {
            post.is_featured = is_featured;
        }
        if let Some(status) = req.status {
            post.status = status;
        }
        if let Some(tags) = req.tags {
            post.tags = tags;
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<Option<Post>> {
        let mut posts = self.posts.lock().unwrap();
        let Some(index) = posts.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        self.comments.lock().unwrap().retain(|c| c.post_id != id);
        Ok(Some(posts.remove(index)))
    }

    async fn get_posts_by_author(&self, author_id: Uuid) -> AppResult<Vec<PostWithCount>> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts
            .into_iter()
            .map(|post| PostWithCount {
                comment_count: self.count_comments(post.id),
                post,
            })
            .collect())
    }

    async fn get_stats(&self) -> AppResult<BlogStats> {
        let posts = self.posts.lock().unwrap();
        let comments = self.comments.lock().unwrap();
        let users = self.users.lock().unwrap();

        let posts_with = |s: PostStatus| posts.iter().filter(|p| p.status == s).count() as i64;
        let comments_with =
            |s: CommentStatus| comments.iter().filter(|c| c.status == s).count() as i64;
        let users_with = |r: UserRole| users.iter().filter(|u| u.role == r).count() as i64;

        Ok(BlogStats {
            total_posts: posts.len() as i64,
            published_posts: posts_with(PostStatus::Published),
            draft_posts: posts_with(PostStatus::Draft),
            archived_posts: posts_with(PostStatus::Archived),
            featured_posts: posts.iter().filter(|p| p.is_featured).count() as i64,
            total_views: posts.iter().map(|p| p.views as i64).sum(),
            total_comments: comments.len() as i64,
            approved_comments: comments_with(CommentStatus::Approved),
            pending_comments: comments_with(CommentStatus::Pending),
            rejected_comments: comments_with(CommentStatus::Rejected),
            total_users: users.len() as i64,
            admin_count: users_with(UserRole::Admin),
            user_count: users_with(UserRole::User),
        })
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        req: CreateCommentRequest,
    ) -> AppResult<Comment> {
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            content: req.content,
            author_id,
            post_id: req.post_id,
            parent_id: req.parent_id,
            status: CommentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.insert_comment(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> AppResult<Option<Comment>> {
        Ok(self.comment(id))
    }

    async fn get_comment_with_post(&self, id: Uuid) -> AppResult<Option<CommentWithPost>> {
        Ok(self.comment(id).map(|comment| CommentWithPost {
            post: self.summary(comment.post_id),
            comment,
        }))
    }

    async fn get_comments_by_author(&self, author_id: Uuid) -> AppResult<Vec<CommentWithPost>> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.author_id == author_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments
            .into_iter()
            .map(|comment| CommentWithPost {
                post: self.summary(comment.post_id),
                comment,
            })
            .collect())
    }

    async fn update_comment(
        &self,
        id: Uuid,
        req: UpdateCommentRequest,
    ) -> AppResult<Option<Comment>> {
        let mut comments = self.comments.lock().unwrap();
        let Some(comment) = comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(content) = req.content {
            comment.content = content;
        }
        if let Some(status) = req.status {
            comment.status = status;
        }
        comment.updated_at = Utc::now();
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: Uuid) -> AppResult<Option<Comment>> {
        let mut comments = self.comments.lock().unwrap();
        let Some(index) = comments.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let removed = comments.remove(index);
        // Direct replies go with it, like the ON DELETE CASCADE on parent_id.
        comments.retain(|c| c.parent_id != Some(id));
        Ok(Some(removed))
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> AppResult<Option<Comment>> {
        let mut comments = self.comments.lock().unwrap();
        let Some(comment) = comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        comment.status = status;
        comment.updated_at = Utc::now();
        Ok(Some(comment.clone()))
    }
}

// --- TEST UTILITIES ---

pub const USER_ID: Uuid = Uuid::from_u128(123);
pub const OTHER_USER_ID: Uuid = Uuid::from_u128(789);
pub const ADMIN_ID: Uuid = Uuid::from_u128(456);
pub const UNVERIFIED_ID: Uuid = Uuid::from_u128(999);

pub fn user_record(id: Uuid, role: UserRole) -> User {
    User {
        id,
        name: format!("user-{}", id.as_u128()),
        email: format!("{}@blog.test", id.as_u128()),
        role,
        email_verified: true,
    }
}

pub fn seeded_users() -> Vec<User> {
    vec![
        user_record(USER_ID, UserRole::User),
        user_record(OTHER_USER_ID, UserRole::User),
        user_record(ADMIN_ID, UserRole::Admin),
        User {
            email_verified: false,
            ..user_record(UNVERIFIED_ID, UserRole::User)
        },
    ]
}

pub fn auth_user(id: Uuid, role: UserRole) -> AuthUser {
    AuthUser {
        id,
        name: format!("user-{}", id.as_u128()),
        email: format!("{}@blog.test", id.as_u128()),
        role,
    }
}

pub fn regular_user() -> AuthUser {
    auth_user(USER_ID, UserRole::User)
}

pub fn other_user() -> AuthUser {
    auth_user(OTHER_USER_ID, UserRole::User)
}

pub fn admin_user() -> AuthUser {
    auth_user(ADMIN_ID, UserRole::Admin)
}

pub fn test_state(repo: Arc<InMemoryRepo>) -> AppState {
    AppState {
        repo,
        config: AppConfig::default(),
    }
}

// A post `age_minutes` old, so ordering assertions are deterministic.
pub fn post_fixture(author_id: Uuid, title: &str, age_minutes: i64) -> Post {
    let created = Utc::now() - Duration::minutes(age_minutes);
    Post {
        id: Uuid::new_v4(),
        title: title.to_string(),
        content: format!("{title} body"),
        author_id,
        created_at: created,
        updated_at: created,
        ..Post::default()
    }
}

pub fn comment_fixture(
    post_id: Uuid,
    author_id: Uuid,
    parent_id: Option<Uuid>,
    status: CommentStatus,
    age_minutes: i64,
) -> Comment {
    let created = Utc::now() - Duration::minutes(age_minutes);
    Comment {
        id: Uuid::new_v4(),
        content: "nice read".to_string(),
        author_id,
        post_id,
        parent_id,
        status,
        created_at: created,
        updated_at: created,
    }
}
