use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 可以被点赞的对象类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Post,
    Comment,
}

impl SubjectKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Post => "Post",
            Self::Comment => "Comment",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Like {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Like records embedded in a post or comment document.
///
/// Holds at most one record per user; `toggle` is the only mutator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LikeSet(Vec<Like>);

impl LikeSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn count(&self) -> u64 {
        self.0.len() as u64
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|like| like.user_id == user_id)
    }

    pub fn liked_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.0
            .iter()
            .find(|like| like.user_id == user_id)
            .map(|like| like.created_at)
    }

    /// Removes the user's record if present, inserts one otherwise.
    /// Returns whether the user likes the subject afterwards.
    pub fn toggle(&mut self, user_id: &str, at: DateTime<Utc>) -> bool {
        if self.contains(user_id) {
            self.0.retain(|like| like.user_id != user_id);
            false
        } else {
            self.0.push(Like {
                user_id: user_id.to_string(),
                created_at: at,
            });
            true
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Like> {
        self.0.iter()
    }
}

/// 点赞数与当前访问者的点赞状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub like_count: u64,
    pub is_liked: bool,
}

impl Engagement {
    /// `is_liked` is always false for an anonymous viewer.
    pub fn of(likes: &LikeSet, viewer_id: Option<&str>) -> Self {
        Self {
            like_count: likes.count(),
            is_liked: viewer_id.map(|id| likes.contains(id)).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub is_liked: bool,
    pub like_count: u64,
}

impl LikeToggle {
    pub fn from_set(likes: &LikeSet, user_id: &str) -> Self {
        Self {
            is_liked: likes.contains(user_id),
            like_count: likes.count(),
        }
    }
}
