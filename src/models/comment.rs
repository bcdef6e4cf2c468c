use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;
use crate::models::like::{Engagement, LikeSet};
use crate::models::post::PostSummary;
use crate::models::user::UserSummary;
use crate::utils::serde_helpers::thing_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(deserialize_with = "thing_id::deserialize")]
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    /// `None` for top-level comments; replies always point at a top-level comment
    pub parent_id: Option<String>,
    pub body: String,
    #[serde(default)]
    pub likes: LikeSet,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    pub fn edit(&mut self, body: String, now: DateTime<Utc>) {
        self.body = body;
        self.is_edited = true;
        self.edited_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Valid post ID is required"))]
    pub post_id: String,
    pub parent_comment_id: Option<String>,
    #[validate(length(min = 1, max = 10000, message = "Comment body is required"))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 10000, message = "Comment body is required"))]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CommentQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: Option<String>, // "newest", "oldest", "popular"
}

/// 评论及其直接回复
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author: Option<UserSummary>,
    pub parent_id: Option<String>,
    pub body: String,
    pub like_count: u64,
    pub is_liked: bool,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<CommentView>,
}

impl CommentView {
    pub fn new(comment: Comment, viewer_id: Option<&str>) -> Self {
        let engagement = Engagement::of(&comment.likes, viewer_id);
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author: None,
            parent_id: comment.parent_id,
            body: comment.body,
            like_count: engagement.like_count,
            is_liked: engagement.is_liked,
            is_edited: comment.is_edited,
            edited_at: comment.edited_at,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            replies: Vec::new(),
        }
    }

    pub fn with_author(mut self, author: Option<UserSummary>) -> Self {
        self.author = author;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoredCommentView {
    #[serde(flatten)]
    pub comment: CommentView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<PostSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl FromStr for CommentSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "popular" => Ok(Self::Popular),
            other => Err(AppError::Validation(format!("Invalid sort option: {}", other))),
        }
    }
}

impl CommentSort {
    pub fn compare(&self, a: &Comment, b: &Comment) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)),
            Self::Oldest => a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)),
            Self::Popular => b
                .likes
                .count()
                .cmp(&a.likes.count())
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id)),
        }
    }
}

/// Which comments a lookup should return, relative to nesting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParentScope {
    #[default]
    Any,
    TopLevel,
    RepliesTo(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub post_id: Option<String>,
    pub author_id: Option<String>,
    pub parent: ParentScope,
}

impl CommentFilter {
    pub fn top_level(post_id: &str) -> Self {
        Self {
            post_id: Some(post_id.to_string()),
            parent: ParentScope::TopLevel,
            ..Default::default()
        }
    }

    pub fn replies_to(parent_ids: Vec<String>) -> Self {
        Self {
            parent: ParentScope::RepliesTo(parent_ids),
            ..Default::default()
        }
    }

    pub fn by_author(author_id: &str) -> Self {
        Self {
            author_id: Some(author_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, comment: &Comment) -> bool {
        if let Some(post_id) = &self.post_id {
            if &comment.post_id != post_id {
                return false;
            }
        }
        if let Some(author_id) = &self.author_id {
            if &comment.author_id != author_id {
                return false;
            }
        }
        match &self.parent {
            ParentScope::Any => true,
            ParentScope::TopLevel => comment.parent_id.is_none(),
            ParentScope::RepliesTo(ids) => comment
                .parent_id
                .as_ref()
                .map(|parent| ids.contains(parent))
                .unwrap_or(false),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::comment;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_popular_sort_breaks_ties_by_newest() {
        let now = Utc::now();
        let mut old = comment("a", "p", None, now - Duration::hours(2));
        let new = comment("b", "p", None, now);
        assert_eq!(CommentSort::Popular.compare(&old, &new), Ordering::Greater);

        old.likes.toggle("x", now);
        assert_eq!(CommentSort::Popular.compare(&old, &new), Ordering::Less);
    }

    #[test]
    fn test_edit_keeps_creation_time() {
        let created = Utc::now() - Duration::hours(1);
        let mut c = comment("a", "p", None, created);
        c.edit("changed".to_string(), Utc::now());

        assert!(c.is_edited);
        assert!(c.edited_at.is_some());
        assert_eq!(c.created_at, created);
    }

    #[test]
    fn test_filter_scopes() {
        let now = Utc::now();
        let top = comment("a", "p", None, now);
        let reply = comment("b", "p", Some("a"), now);

        assert!(CommentFilter::top_level("p").matches(&top));
        assert!(!CommentFilter::top_level("p").matches(&reply));
        assert!(!CommentFilter::top_level("q").matches(&top));
        assert!(CommentFilter::replies_to(vec!["a".to_string()]).matches(&reply));
        assert!(!CommentFilter::replies_to(vec!["z".to_string()]).matches(&reply));
    }
}
