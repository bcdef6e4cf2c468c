use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::serde_helpers::thing_id;

/// 用户资料文档，id 与身份服务中的用户 ID 一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "thing_id::deserialize")]
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: &str, username: String, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            username,
            display_name,
            bio: None,
            avatar_url: None,
            social_links: SocialLinks::default(),
            followers: Vec::new(),
            following: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.following.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
pub struct SocialLinks {
    #[validate(url(message = "Invalid Twitter URL"))]
    pub twitter: Option<String>,
    #[validate(url(message = "Invalid LinkedIn URL"))]
    pub linkedin: Option<String>,
    #[validate(url(message = "Invalid GitHub URL"))]
    pub github: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
}

impl SocialLinks {
    /// Fields present in `update` overwrite ours, the rest are kept.
    pub fn merge(&mut self, update: SocialLinks) {
        if update.twitter.is_some() {
            self.twitter = update.twitter;
        }
        if update.linkedin.is_some() {
            self.linkedin = update.linkedin;
        }
        if update.github.is_some() {
            self.github = update.github;
        }
        if update.website.is_some() {
            self.website = update.website;
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be 3 to 30 characters"))]
    pub username: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Display name cannot be empty"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "Bio must be less than 500 characters"))]
    pub bio: Option<String>,

    #[validate(url)]
    pub avatar_url: Option<String>,

    #[validate]
    pub social_links: Option<SocialLinks>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub social_links: SocialLinks,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub comment_count: u64,
    pub is_following: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl From<&UserProfile> for UserSummary {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UserSearchQuery {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}
