use crate::{
    error::{AppError, Result},
    models::user::*,
    state::AppState,
    utils::{
        middleware::{OptionalAuth, RequireAuth, ValidatedQuery},
        validation,
    },
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // 公开路由
        .route("/search", get(search_users))
        .route("/:id", get(get_user_profile))
        .route("/:id/followers", get(get_followers))
        .route("/:id/following", get(get_following))
        // 需要认证的路由
        .route("/profile", put(update_profile))
        .route("/:id/follow", post(toggle_follow))
        .route("/:id/liked-posts", get(get_liked_posts))
}

#[derive(Debug, Deserialize)]
pub struct LikedPostsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// 搜索用户
/// GET /api/users/search
pub async fn search_users(
    State(app_state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<UserSearchQuery>,
) -> Result<Json<Value>> {
    debug!("Searching users with query: {:?}", query);

    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::bad_request("Search query is required"))?;

    let request = validation::page_request(
        query.page,
        query.limit,
        app_state.default_page_size("users"),
        app_state.config.max_page_size,
    )?;
    let result = app_state
        .user_service
        .search_users(term, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

/// 获取用户资料（ID 或用户名）
/// GET /api/users/:id
pub async fn get_user_profile(
    State(app_state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let profile = app_state
        .user_service
        .get_profile(&identifier, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

/// 更新当前用户资料
/// PUT /api/users/profile
pub async fn update_profile(
    State(app_state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let profile = app_state
        .user_service
        .update_profile(&user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile,
        "message": "Profile updated successfully"
    })))
}

/// 关注 / 取消关注
/// POST /api/users/:id/follow
pub async fn toggle_follow(
    State(app_state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let state = app_state
        .follow_service
        .toggle_follow(&user.id, &target_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": state
    })))
}

/// GET /api/users/:id/followers
pub async fn get_followers(
    State(app_state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<Value>> {
    let followers = app_state.user_service.followers(&identifier).await?;

    Ok(Json(json!({
        "success": true,
        "data": followers
    })))
}

/// GET /api/users/:id/following
pub async fn get_following(
    State(app_state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<Value>> {
    let following = app_state.user_service.following(&identifier).await?;

    Ok(Json(json!({
        "success": true,
        "data": following
    })))
}

/// 当前用户点赞过的文章，仅本人可见
/// GET /api/users/:id/liked-posts
pub async fn get_liked_posts(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<LikedPostsQuery>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let request = validation::page_request(
        query.page,
        query.limit,
        app_state.default_page_size("posts"),
        app_state.config.max_page_size,
    )?;
    let page = app_state
        .post_service
        .liked_by(&user_id, &user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}
