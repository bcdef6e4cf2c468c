use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;
use crate::models::like::{Engagement, LikeSet};
use crate::models::user::UserSummary;
use crate::utils::serde_helpers::thing_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "thing_id::deserialize")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: String,
    /// true when the author supplied the excerpt; derived excerpts follow body edits
    pub excerpt_is_custom: bool,
    pub cover_image: Option<String>,
    pub author_id: String,
    pub tags: Vec<String>,
    pub category: String,
    pub status: PostStatus,
    #[serde(default)]
    pub likes: LikeSet,
    pub views: u64,
    pub reading_time: ReadingTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl Default for PostStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for PostStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(AppError::Validation(format!("Invalid status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReadingTime {
    pub minutes: u32,
    pub words: u32,
}

impl Post {
    /// Moves the post to `published`. The publish timestamp is only ever set once.
    pub fn publish(&mut self, now: DateTime<Utc>) {
        self.status = PostStatus::Published;
        if self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.updated_at = now;
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.status = PostStatus::Archived;
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: PostStatus, now: DateTime<Utc>) {
        match status {
            PostStatus::Published => self.publish(now),
            PostStatus::Archived => self.archive(now),
            PostStatus::Draft => {
                self.status = PostStatus::Draft;
                self.updated_at = now;
            }
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    /// Published posts are public; everything else is visible to its author only.
    pub fn is_visible_to(&self, viewer_id: Option<&str>) -> bool {
        self.is_published() || viewer_id.map(|id| self.is_authored_by(id)).unwrap_or(false)
    }

    pub fn like_count(&self) -> u64 {
        self.likes.count()
    }

    /// Continuous age in days since creation; never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.created_at).num_milliseconds().max(0);
        millis as f64 / 86_400_000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required and must be at most 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,

    #[validate(length(max = 300))]
    pub excerpt: Option<String>,

    #[validate(url)]
    pub cover_image: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Category is required"))]
    pub category: String,

    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Body cannot be empty"))]
    pub body: Option<String>,

    #[validate(length(max = 300))]
    pub excerpt: Option<String>,

    pub cover_image: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Category cannot be empty"))]
    pub category: Option<String>,

    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
}

/// 返回给调用方的文章，附带点赞与评论统计
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub author_id: String,
    pub author: Option<UserSummary>,
    pub tags: Vec<String>,
    pub category: String,
    pub status: PostStatus,
    pub views: u64,
    pub like_count: u64,
    pub is_liked: bool,
    pub comment_count: u64,
    pub reading_time: ReadingTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_score: Option<f64>,
}

impl PostView {
    pub fn new(post: Post, engagement: Engagement, comment_count: u64) -> Self {
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            body: post.body,
            excerpt: post.excerpt,
            cover_image: post.cover_image,
            author_id: post.author_id,
            author: None,
            tags: post.tags,
            category: post.category,
            status: post.status,
            views: post.views,
            like_count: engagement.like_count,
            is_liked: engagement.is_liked,
            comment_count,
            reading_time: post.reading_time,
            created_at: post.created_at,
            updated_at: post.updated_at,
            published_at: post.published_at,
            trending_score: None,
        }
    }

    pub fn with_author(mut self, author: Option<UserSummary>) -> Self {
        self.author = author;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.trending_score = Some(score);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            slug: post.slug.clone(),
        }
    }
}

/// 列表查询参数
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct PostQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: Option<String>, // "newest", "oldest", "popular", "trending"
    pub category: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct TrendingQuery {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    #[default]
    Newest,
    Oldest,
    Popular,
    Trending,
}

impl FromStr for PostSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "popular" => Ok(Self::Popular),
            "trending" => Ok(Self::Trending),
            other => Err(AppError::Validation(format!("Invalid sort option: {}", other))),
        }
    }
}

impl PostSort {
    /// Sorts the store can apply directly; `None` means the ranking engine must score first.
    pub fn store_order(&self) -> Option<PostOrder> {
        match self {
            Self::Newest => Some(PostOrder::Newest),
            Self::Oldest => Some(PostOrder::Oldest),
            Self::Popular => Some(PostOrder::Popular),
            Self::Trending => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    Newest,
    Oldest,
    Popular,
}

impl PostOrder {
    /// Total order; the id is the last tie-breaker so pages never overlap.
    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)),
            Self::Oldest => a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)),
            Self::Popular => b
                .views
                .cmp(&a.views)
                .then_with(|| b.like_count().cmp(&a.like_count()))
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id)),
        }
    }
}

/// Filter predicate shared by the count query and the data query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    /// lowercase substring
    pub category: Option<String>,
    /// lowercase, matches when any tag is present
    pub tags: Vec<String>,
    pub author_id: Option<String>,
    /// lowercase terms, matches when any term occurs
    pub search_terms: Vec<String>,
}

impl PostFilter {
    pub fn published() -> Self {
        Self {
            status: Some(PostStatus::Published),
            ..Default::default()
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        if let Some(status) = self.status {
            if post.status != status {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if !post.category.to_lowercase().contains(category.as_str()) {
                return false;
            }
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|tag| post.tags.contains(tag)) {
            return false;
        }

        if let Some(author_id) = &self.author_id {
            if &post.author_id != author_id {
                return false;
            }
        }

        if !self.search_terms.is_empty() {
            let title = post.title.to_lowercase();
            let body = post.body.to_lowercase();
            let category = post.category.to_lowercase();
            let hit = self.search_terms.iter().any(|term| {
                title.contains(term.as_str())
                    || body.contains(term.as_str())
                    || category.contains(term.as_str())
                    || post.tags.iter().any(|tag| tag.contains(term.as_str()))
            });
            if !hit {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;

    pub fn post(id: &str, author_id: &str, created_at: DateTime<Utc>) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Post {}", id),
            slug: format!("post-{}", id),
            body: "<p>Some body text</p>".to_string(),
            excerpt: "Some body text".to_string(),
            excerpt_is_custom: false,
            cover_image: None,
            author_id: author_id.to_string(),
            tags: vec!["rust".to_string()],
            category: "Programming".to_string(),
            status: PostStatus::Published,
            likes: LikeSet::new(),
            views: 0,
            reading_time: ReadingTime { minutes: 1, words: 3 },
            created_at,
            updated_at: created_at,
            published_at: Some(created_at),
        }
    }

    pub fn aged_post(id: &str, now: DateTime<Utc>, age: Duration, likes: usize, views: u64) -> Post {
        let mut p = post(id, "author", now - age);
        for i in 0..likes {
            p.likes.toggle(&format!("liker-{}", i), now);
        }
        p.views = views;
        p
    }
}
