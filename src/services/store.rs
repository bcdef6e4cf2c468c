use crate::{
    error::Result,
    models::{
        comment::{Comment, CommentFilter},
        follow::{FollowEdge, FollowState},
        like::{LikeToggle, SubjectKind},
        post::{Post, PostFilter, PostOrder},
        user::UserProfile,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// 文档存储接口
///
/// Every service reaches the backing store through this trait. Lookups return
/// `Ok(None)` for missing documents; only transport or decode failures are errors.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    // 文章
    async fn insert_post(&self, post: Post) -> Result<Post>;
    async fn get_post(&self, id: &str) -> Result<Option<Post>>;
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
    /// Replaces every field except likes and views, which only move through
    /// `toggle_like` and `increment_views`.
    async fn save_post(&self, post: Post) -> Result<Option<Post>>;
    async fn delete_post(&self, id: &str) -> Result<bool>;
    /// Adds exactly one view and returns the post as stored afterwards.
    async fn increment_views(&self, id: &str) -> Result<Option<Post>>;
    async fn find_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>>;
    /// Unordered, unpaged; used when ranking must see the whole candidate set.
    async fn find_all_posts(&self, filter: &PostFilter) -> Result<Vec<Post>>;
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64>;
    /// Published posts liked by `user_id`, with the time of that like, most recent first.
    async fn posts_liked_by(&self, user_id: &str) -> Result<Vec<(Post, DateTime<Utc>)>>;

    // 评论
    async fn insert_comment(&self, comment: Comment) -> Result<Comment>;
    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;
    async fn save_comment(&self, comment: Comment) -> Result<Option<Comment>>;
    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>>;
    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64>;
    /// Number of comments per post id; posts without comments are absent.
    async fn comment_counts(&self, post_ids: &[String]) -> Result<HashMap<String, u64>>;
    async fn delete_comments(&self, ids: &[String]) -> Result<u64>;
    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64>;

    /// 点赞切换，在单个文档上原子完成；文档不存在时返回 `None`
    async fn toggle_like(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<LikeToggle>>;

    // 用户
    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>>;
    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>>;
    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile>;
    /// Saves profile fields; follower/following sets are left as stored.
    async fn save_user(&self, user: UserProfile) -> Result<Option<UserProfile>>;
    async fn search_users(&self, term: &str, offset: usize, limit: usize) -> Result<Vec<UserProfile>>;
    async fn count_users(&self, term: &str) -> Result<u64>;
    /// Writes both sides of the edge together. `None` when either user is missing.
    async fn set_follow(&self, edge: &FollowEdge, follow: bool) -> Result<Option<FollowState>>;
}

pub type DynStore = Arc<dyn BlogStore>;
