use crate::{
    error::{AppError, Result},
    models::{
        comment::CommentFilter,
        pagination::{Page, PageRequest},
        post::{PostFilter, PostStatus},
        user::*,
    },
    services::store::DynStore,
    utils::validation::{validate_display_name, validate_username},
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    store: DynStore,
}

impl UserService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// 获取或创建用户资料，首次见到已认证用户时调用
    pub async fn get_or_create_profile(
        &self,
        user_id: &str,
        username: Option<&str>,
    ) -> Result<UserProfile> {
        if let Some(profile) = self.store.get_user(user_id).await? {
            return Ok(profile);
        }

        debug!("Creating new user profile for user: {}", user_id);

        // 使用令牌中的用户名，否则从用户 ID 生成
        let mut base_username: String = username
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(24)
            .collect();
        if base_username.len() < 3 {
            let short_id: String = user_id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(8)
                .collect();
            base_username = format!("user_{}", short_id);
        }

        let username = self.generate_unique_username(&base_username).await?;
        let profile = UserProfile::new(user_id, username.clone(), username);
        let created = self.store.insert_user(profile).await?;

        info!("Created user profile: {} ({})", created.id, created.username);
        Ok(created)
    }

    async fn generate_unique_username(&self, base: &str) -> Result<String> {
        let mut candidate = base.to_string();
        let mut counter = 1;

        while self.store.get_user_by_username(&candidate).await?.is_some() {
            candidate = format!("{}{}", base, counter);
            counter += 1;

            if counter > 100 {
                let suffix = Uuid::new_v4().simple().to_string();
                return Ok(format!("{}_{}", base, &suffix[..6]));
            }
        }

        Ok(candidate)
    }

    async fn find_profile(&self, identifier: &str) -> Result<UserProfile> {
        if let Some(profile) = self.store.get_user(identifier).await? {
            return Ok(profile);
        }
        self.store
            .get_user_by_username(identifier)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// 按 ID 或用户名获取公开资料
    pub async fn get_profile(&self, identifier: &str, viewer_id: Option<&str>) -> Result<ProfileView> {
        let profile = self.find_profile(identifier).await?;

        let post_count = self
            .store
            .count_posts(&PostFilter {
                status: Some(PostStatus::Published),
                author_id: Some(profile.id.clone()),
                ..Default::default()
            })
            .await?;
        let comment_count = self
            .store
            .count_comments(&CommentFilter::by_author(&profile.id))
            .await?;

        let is_following = viewer_id
            .map(|viewer| profile.followers.iter().any(|id| id == viewer))
            .unwrap_or(false);

        Ok(ProfileView {
            follower_count: profile.followers.len() as u64,
            following_count: profile.following.len() as u64,
            post_count,
            comment_count,
            is_following,
            id: profile.id,
            username: profile.username,
            display_name: profile.display_name,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            social_links: profile.social_links,
            created_at: profile.created_at,
        })
    }

    /// 更新资料；并发编辑以最后写入为准
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<ProfileView> {
        debug!("Updating user profile for user: {}", user_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut profile = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User profile"))?;

        if let Some(username) = request.username {
            let username = username.trim().to_string();
            validate_username(&username)?;
            if username != profile.username {
                if let Some(owner) = self.store.get_user_by_username(&username).await? {
                    if owner.id != profile.id {
                        return Err(AppError::conflict("Username is already taken"));
                    }
                }
                profile.username = username;
            }
        }
        if let Some(display_name) = request.display_name {
            validate_display_name(&display_name)?;
            profile.display_name = display_name.trim().to_string();
        }
        if let Some(bio) = request.bio {
            profile.bio = Some(bio).filter(|b| !b.trim().is_empty());
        }
        if let Some(avatar_url) = request.avatar_url {
            profile.avatar_url = Some(avatar_url);
        }
        if let Some(links) = request.social_links {
            profile.social_links.merge(links);
        }

        profile.updated_at = Utc::now();

        self.store
            .save_user(profile)
            .await?
            .ok_or_else(|| AppError::not_found("User profile"))?;

        info!("Updated user profile for user: {}", user_id);
        self.get_profile(user_id, Some(user_id)).await
    }

    pub async fn search_users(&self, term: &str, request: PageRequest) -> Result<Page<UserSummary>> {
        let term = term.trim();
        let total = self.store.count_users(term).await?;
        let users = self
            .store
            .search_users(term, request.offset(), request.page_size)
            .await?;

        Ok(Page::new(
            users.iter().map(UserSummary::from).collect(),
            request,
            total,
        ))
    }

    pub async fn followers(&self, identifier: &str) -> Result<Vec<UserSummary>> {
        let profile = self.find_profile(identifier).await?;
        let users = self.store.get_users(&profile.followers).await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    pub async fn following(&self, identifier: &str) -> Result<Vec<UserSummary>> {
        let profile = self.find_profile(identifier).await?;
        let users = self.store.get_users(&profile.following).await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }
}
