use crate::{
    error::Result,
    models::comment::*,
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
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/post/:post_id", get(get_post_comments))
        .route("/user/:user_id", get(get_user_comments))
        .route("/", post(create_comment))
        .route("/:id", put(update_comment).delete(delete_comment))
        .route("/:id/like", post(toggle_like))
}

/// 获取文章的评论（顶层分页，附带回复）
/// GET /api/comments/post/:post_id
async fn get_post_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<CommentQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let request = validation::page_request(
        query.page,
        query.limit,
        state.default_page_size("comments"),
        state.config.max_page_size,
    )?;
    let sort: CommentSort = validation::parse_sort(query.sort.as_deref())?;

    let comments = state
        .comment_service
        .list_top_level(&post_id, sort, request, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comments
    })))
}

async fn create_comment(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let comment = state.comment_service.create_comment(&user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": comment
        })),
    ))
}

async fn update_comment(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(comment_id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>> {
    let comment = state
        .comment_service
        .update_comment(&comment_id, &user.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let removed = state
        .comment_service
        .delete_comment(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "deleted": removed },
        "message": "Comment deleted successfully"
    })))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>> {
    let result = state
        .comment_service
        .toggle_like(&comment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

/// 用户发表的评论
/// GET /api/comments/user/:user_id
async fn get_user_comments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    ValidatedQuery(query): ValidatedQuery<CommentQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let request = validation::page_request(
        query.page,
        query.limit,
        state.default_page_size("comments"),
        state.config.max_page_size,
    )?;

    let comments = state
        .comment_service
        .list_by_author(&user_id, request, auth.user_id())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comments
    })))
}
