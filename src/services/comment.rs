use crate::{
    error::{AppError, Result},
    models::{
        comment::*,
        like::{LikeToggle, SubjectKind},
        pagination::{Page, PageRequest},
        post::PostSummary,
        user::UserSummary,
    },
    services::{engagement::EngagementService, store::DynStore},
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct CommentService {
    store: DynStore,
    engagement: EngagementService,
    max_comment_length: usize,
}

/// 将回复挂到对应的顶层评论下
///
/// Replies are ordered oldest first (then by id) regardless of how the
/// top-level comments were sorted. Replies whose parent is not in `top_level`
/// are dropped.
pub fn assemble_threads(
    top_level: Vec<Comment>,
    replies: Vec<Comment>,
    authors: &HashMap<String, UserSummary>,
    viewer_id: Option<&str>,
) -> Vec<CommentView> {
    let view = |comment: Comment| {
        let author = authors.get(&comment.author_id).cloned();
        CommentView::new(comment, viewer_id).with_author(author)
    };

    let mut by_parent: HashMap<String, Vec<Comment>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id.clone() {
            by_parent.entry(parent_id).or_default().push(reply);
        }
    }

    top_level
        .into_iter()
        .map(|comment| {
            let mut children = by_parent.remove(&comment.id).unwrap_or_default();
            children.sort_by(|a, b| CommentSort::Oldest.compare(a, b));

            let mut thread = view(comment);
            thread.replies = children.into_iter().map(&view).collect();
            thread
        })
        .collect()
}

impl CommentService {
    pub fn new(store: DynStore, engagement: EngagementService, max_comment_length: usize) -> Self {
        Self {
            store,
            engagement,
            max_comment_length,
        }
    }

    /// 顶层评论分页，每条附带全部直接回复
    pub async fn list_top_level(
        &self,
        post_id: &str,
        sort: CommentSort,
        request: PageRequest,
        viewer_id: Option<&str>,
    ) -> Result<Page<CommentView>> {
        debug!("Getting comments for post: {}", post_id);

        let post = self
            .store
            .get_post(post_id)
            .await?
            .filter(|post| post.is_visible_to(viewer_id))
            .ok_or_else(|| AppError::not_found("Post"))?;

        let filter = CommentFilter::top_level(&post.id);
        let total = self.store.count_comments(&filter).await?;

        let mut top_level = self.store.find_comments(&filter).await?;
        top_level.sort_by(|a, b| sort.compare(a, b));
        let page = request.slice(top_level);

        let parent_ids: Vec<String> = page.iter().map(|c| c.id.clone()).collect();
        let replies = if parent_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .find_comments(&CommentFilter::replies_to(parent_ids))
                .await?
        };

        let authors = self
            .engagement
            .authors(page.iter().chain(&replies).map(|c| c.author_id.clone()).collect())
            .await?;

        Ok(Page::new(
            assemble_threads(page, replies, &authors, viewer_id),
            request,
            total,
        ))
    }

    pub async fn create_comment(
        &self,
        user_id: &str,
        request: CreateCommentRequest,
    ) -> Result<CommentView> {
        debug!("Creating comment for post: {}", request.post_id);

        request.validate().map_err(AppError::ValidatorError)?;
        let body = self.check_body(&request.body)?;

        let post = self
            .store
            .get_post(&request.post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        if !post.is_published() && !post.is_authored_by(user_id) {
            return Err(AppError::forbidden("Cannot comment on unpublished posts"));
        }

        // 只允许回复顶层评论
        if let Some(parent_id) = &request.parent_comment_id {
            let parent = self
                .store
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| AppError::not_found("Parent comment"))?;

            if parent.post_id != post.id {
                return Err(AppError::invalid_parent(
                    "Parent comment belongs to a different post",
                ));
            }
            if !parent.is_top_level() {
                return Err(AppError::invalid_parent("Cannot reply to a reply"));
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post.id,
            author_id: user_id.to_string(),
            parent_id: request.parent_comment_id,
            body,
            likes: Default::default(),
            is_edited: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert_comment(comment).await?;
        info!("Created comment: {} on post: {}", created.id, created.post_id);

        let author = self.author(user_id).await?;
        Ok(CommentView::new(created, Some(user_id)).with_author(author))
    }

    pub async fn update_comment(
        &self,
        comment_id: &str,
        user_id: &str,
        request: UpdateCommentRequest,
    ) -> Result<CommentView> {
        request.validate().map_err(AppError::ValidatorError)?;
        let body = self.check_body(&request.body)?;

        let mut comment = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if !comment.is_authored_by(user_id) {
            return Err(AppError::forbidden("You can only edit your own comments"));
        }

        comment.edit(body, Utc::now());

        let saved = self
            .store
            .save_comment(comment)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        let author = self.author(user_id).await?;
        Ok(CommentView::new(saved, Some(user_id)).with_author(author))
    }

    /// 删除评论；顶层评论会连同其直接回复一起删除
    pub async fn delete_comment(&self, comment_id: &str, user_id: &str) -> Result<u64> {
        let comment = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if !comment.is_authored_by(user_id) {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }

        let mut ids = vec![comment.id.clone()];
        if comment.is_top_level() {
            let replies = self
                .store
                .find_comments(&CommentFilter::replies_to(vec![comment.id.clone()]))
                .await?;
            ids.extend(replies.into_iter().map(|reply| reply.id));
        }

        let removed = self.store.delete_comments(&ids).await?;
        info!("Deleted comment: {} ({} records)", comment_id, removed);
        Ok(removed)
    }

    pub async fn toggle_like(&self, comment_id: &str, user_id: &str) -> Result<LikeToggle> {
        self.engagement
            .toggle_like(SubjectKind::Comment, comment_id, user_id)
            .await
    }

    /// Comments written by a user, newest first, each with a summary of its post.
    pub async fn list_by_author(
        &self,
        author_id: &str,
        request: PageRequest,
        viewer_id: Option<&str>,
    ) -> Result<Page<AuthoredCommentView>> {
        let filter = CommentFilter::by_author(author_id);
        let total = self.store.count_comments(&filter).await?;

        let mut comments = self.store.find_comments(&filter).await?;
        comments.sort_by(|a, b| CommentSort::Newest.compare(a, b));
        let page = request.slice(comments);

        let mut summaries: HashMap<String, Option<PostSummary>> = HashMap::new();
        for comment in &page {
            if !summaries.contains_key(&comment.post_id) {
                let summary = self
                    .store
                    .get_post(&comment.post_id)
                    .await?
                    .filter(|post| post.is_visible_to(viewer_id))
                    .map(|post| PostSummary::from(&post));
                summaries.insert(comment.post_id.clone(), summary);
            }
        }

        let author = self.author(author_id).await?;
        let items = page
            .into_iter()
            .map(|comment| {
                let post = summaries.get(&comment.post_id).cloned().flatten();
                AuthoredCommentView {
                    comment: CommentView::new(comment, viewer_id).with_author(author.clone()),
                    post,
                }
            })
            .collect();

        Ok(Page::new(items, request, total))
    }

    async fn author(&self, user_id: &str) -> Result<Option<UserSummary>> {
        Ok(self
            .engagement
            .authors(vec![user_id.to_string()])
            .await?
            .remove(user_id))
    }

    fn check_body(&self, body: &str) -> Result<String> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::validation("Comment body is required"));
        }
        if body.chars().count() > self.max_comment_length {
            return Err(AppError::Validation(format!(
                "Comment must be at most {} characters",
                self.max_comment_length
            )));
        }
        Ok(body.to_string())
    }
}
