use crate::{
    error::AppError,
    services::{auth::CurrentUser, AuthService},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{request::Parts, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde::de::DeserializeOwned;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// 认证中间件
///
/// A valid bearer token attaches a `CurrentUser` to the request. Missing or
/// invalid tokens let the request through as anonymous; handlers decide
/// whether that is acceptable.
pub async fn auth_middleware(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(AuthService::bearer_token);

    if let Some(token) = token {
        match app_state.auth_service.verify_jwt(token) {
            Ok(claims) => {
                let user = CurrentUser::from(claims);

                // 确保用户的 profile 存在
                if let Err(e) = app_state
                    .user_service
                    .get_or_create_profile(&user.id, user.username.as_deref())
                    .await
                {
                    warn!("Failed to ensure user profile exists for user {}: {}", user.id, e);
                }

                debug!("Authenticated user: {}", user.id);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                debug!("JWT verification failed: {}", e);
            }
        }
    }

    next.run(request).await
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request);

    match app_state.rate_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件：记录方法、路径、状态码与耗时
pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %uri,
        %client_ip,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

/// 为每个响应附加 `x-request-id`
pub async fn request_id_middleware(mut request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// 客户端 IP：代理头优先，其次是连接地址
fn get_client_ip(request: &Request<Body>) -> String {
    fn header<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    header(request, "x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| header(request, "x-real-ip").map(str::to_string))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// 请求 ID 包装器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// 可选认证提取器
pub struct OptionalAuth(pub Option<CurrentUser>);

impl OptionalAuth {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.id.as_str())
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// 必须认证提取器，未认证时返回 401
pub struct RequireAuth(pub CurrentUser);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// 查询参数提取器，解析失败时按校验错误返回统一的错误体
pub struct ValidatedQuery<T>(pub T);

#[async_trait::async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::Validation(format!("Invalid query parameters: {}", rejection.body_text()))
            })?;
        Ok(ValidatedQuery(value))
    }
}
