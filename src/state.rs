use crate::{
    config::Config,
    services::{
        AuthService, CommentService, DynStore, EngagementService, FollowService, PostService,
        QueryCoordinator, RankingEngine, UserService,
    },
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 文档存储
    pub store: DynStore,

    /// 认证服务
    pub auth_service: AuthService,

    /// 文章服务
    pub post_service: PostService,

    /// 列表与趋势查询
    pub query_service: QueryCoordinator,

    /// 评论服务
    pub comment_service: CommentService,

    /// 点赞服务
    pub engagement_service: EngagementService,

    /// 用户服务
    pub user_service: UserService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 按客户端 IP 限流
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    pub fn new(config: Config, store: DynStore) -> Self {
        let engagement_service = EngagementService::new(store.clone());
        let query_service = QueryCoordinator::new(
            store.clone(),
            engagement_service.clone(),
            RankingEngine::new(config.trending.clone()),
        );
        let post_service = PostService::new(
            store.clone(),
            engagement_service.clone(),
            query_service.clone(),
            config.max_post_length,
        );
        let comment_service = CommentService::new(
            store.clone(),
            engagement_service.clone(),
            config.max_comment_length,
        );

        let per_minute = NonZeroU32::new(config.rate_limit_requests).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::dashmap(Quota::per_minute(per_minute)));

        Self {
            auth_service: AuthService::new(&config.jwt_secret),
            user_service: UserService::new(store.clone()),
            follow_service: FollowService::new(store.clone()),
            post_service,
            query_service,
            comment_service,
            engagement_service,
            rate_limiter,
            store,
            config,
        }
    }

    /// 获取分页默认值
    pub fn default_page_size(&self, resource_type: &str) -> usize {
        match resource_type {
            "comments" => self.config.default_comments_per_page,
            _ => self.config.default_posts_per_page,
        }
    }
}
