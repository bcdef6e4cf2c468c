use crate::{
    error::{AppError, Result},
    models::{
        like::{Engagement, LikeToggle, SubjectKind},
        post::{Post, PostView},
        user::UserSummary,
    },
    services::store::DynStore,
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

/// 点赞与互动统计
#[derive(Clone)]
pub struct EngagementService {
    store: DynStore,
}

impl EngagementService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Likes the subject if the user has not, unlikes it otherwise.
    pub async fn toggle_like(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> Result<LikeToggle> {
        debug!("Toggling like on {} {} for user {}", kind.table(), subject_id, user_id);

        self.ensure_visible(kind, subject_id, user_id).await?;

        let toggle = self
            .store
            .toggle_like(kind, subject_id, user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found(kind.label()))?;

        info!(
            "User {} {} {} {} ({} likes)",
            user_id,
            if toggle.is_liked { "liked" } else { "unliked" },
            kind.table(),
            subject_id,
            toggle.like_count
        );
        Ok(toggle)
    }

    /// 草稿及其评论只有文章作者能看到，其他人按不存在处理
    async fn ensure_visible(&self, kind: SubjectKind, subject_id: &str, user_id: &str) -> Result<()> {
        let post_id = match kind {
            SubjectKind::Post => subject_id.to_string(),
            SubjectKind::Comment => {
                self.store
                    .get_comment(subject_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(kind.label()))?
                    .post_id
            }
        };

        self.store
            .get_post(&post_id)
            .await?
            .filter(|post| post.is_visible_to(Some(user_id)))
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(kind.label()))
    }

    /// Looks up author summaries for a set of user ids in one store call.
    pub async fn authors(&self, mut author_ids: Vec<String>) -> Result<HashMap<String, UserSummary>> {
        author_ids.sort();
        author_ids.dedup();
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.store.get_users(&author_ids).await?;
        Ok(users
            .iter()
            .map(|user| (user.id.clone(), UserSummary::from(user)))
            .collect())
    }

    /// Reads the like count and the viewer's like state without mutating anything.
    pub async fn annotate(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Engagement> {
        let likes = match kind {
            SubjectKind::Post => self.store.get_post(subject_id).await?.map(|p| p.likes),
            SubjectKind::Comment => self.store.get_comment(subject_id).await?.map(|c| c.likes),
        }
        .ok_or_else(|| AppError::not_found(kind.label()))?;

        Ok(Engagement::of(&likes, viewer_id))
    }

    /// Attaches engagement and comment counts to a batch of posts, keeping their order.
    pub async fn annotate_posts(&self, posts: Vec<Post>, viewer_id: Option<&str>) -> Result<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let counts = self.store.comment_counts(&ids).await?;
        let authors = self
            .authors(posts.iter().map(|p| p.author_id.clone()).collect())
            .await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let engagement = Engagement::of(&post.likes, viewer_id);
                let comment_count = counts.get(&post.id).copied().unwrap_or(0);
                let author = authors.get(&post.author_id).cloned();
                PostView::new(post, engagement, comment_count).with_author(author)
            })
            .collect())
    }

    pub async fn annotate_post(&self, post: Post, viewer_id: Option<&str>) -> Result<PostView> {
        self.annotate_posts(vec![post], viewer_id)
            .await?
            .pop()
            .ok_or_else(|| AppError::internal("Failed to annotate post"))
    }
}
