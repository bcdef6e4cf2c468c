use crate::{
    error::{AppError, Result},
    models::{like::SubjectKind, post::*},
    state::AppState,
    utils::{
        middleware::{OptionalAuth, RequireAuth, ValidatedQuery},
        validation,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // 公开路由
        .route("/", get(list_posts).post(create_post))
        .route("/trending", get(get_trending_posts))
        .route("/user/:id", get(get_user_posts))
        .route("/:id", get(get_post).put(update_post).delete(delete_post))
        // 需要认证的路由
        .route("/:id/like", post(toggle_like))
}

/// 获取文章列表
/// GET /api/posts
pub async fn list_posts(
    State(app_state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PostQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    debug!("Fetching posts list with query: {:?}", query);

    let request = validation::page_request(
        query.page,
        query.limit,
        app_state.default_page_size("posts"),
        app_state.config.max_page_size,
    )?;
    let sort: PostSort = validation::parse_sort(query.sort.as_deref())?;

    let author_id = query
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    // 非发布状态只对作者本人开放
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => PostStatus::Published,
        Some(raw) => {
            let status: PostStatus = raw.parse()?;
            if status != PostStatus::Published
                && (author_id.is_none() || author_id.as_deref() != auth.user_id())
            {
                return Err(AppError::forbidden(
                    "Only authors can list their unpublished posts",
                ));
            }
            status
        }
    };

    let filter = PostFilter {
        status: Some(status),
        category: query
            .category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty()),
        tags: validation::parse_tag_list(query.tags.as_deref()),
        author_id,
        search_terms: validation::search_terms(query.search.as_deref()),
    };

    let page = app_state
        .query_service
        .list(&filter, sort, request, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

/// 获取热门文章
/// GET /api/posts/trending
pub async fn get_trending_posts(
    State(app_state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<TrendingQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let trending = &app_state.config.trending;
    let days = validation::trending_days(query.days, trending.window_days)?;
    let limit = validation::trending_limit(query.limit, trending.max_results)?;

    let result = app_state
        .query_service
        .sitewide_trending(days, limit, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

/// 按 ID 或 slug 获取文章
/// GET /api/posts/:id
pub async fn get_post(
    State(app_state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let post = app_state
        .post_service
        .get_post(&identifier, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": post
    })))
}

/// 创建文章
/// POST /api/posts
pub async fn create_post(
    State(app_state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let post = app_state.post_service.create_post(&user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": post,
            "message": "Post created successfully"
        })),
    ))
}

/// 更新文章
/// PUT /api/posts/:id
pub async fn update_post(
    State(app_state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpdatePostRequest>,
) -> Result<Json<Value>> {
    let post = app_state
        .post_service
        .update_post(&post_id, &user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": post,
        "message": "Post updated successfully"
    })))
}

/// 删除文章
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(app_state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    app_state.post_service.delete_post(&post_id, &user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Post deleted successfully"
    })))
}

/// 点赞 / 取消点赞
/// POST /api/posts/:id/like
pub async fn toggle_like(
    State(app_state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let result = app_state
        .engagement_service
        .toggle_like(SubjectKind::Post, &post_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

/// 获取用户的文章
/// GET /api/posts/user/:id
pub async fn get_user_posts(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<PostQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let request = validation::page_request(
        query.page,
        query.limit,
        app_state.default_page_size("posts"),
        app_state.config.max_page_size,
    )?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PostStatus>)
        .transpose()?;

    let page = app_state
        .post_service
        .list_for_author(&user_id, auth.user_id(), status, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}
