use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,

    // Content settings
    pub max_post_length: usize,
    pub max_comment_length: usize,
    pub default_posts_per_page: usize,
    pub default_comments_per_page: usize,
    pub max_page_size: usize,

    // Trending
    pub trending: TrendingConfig,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub request_timeout_secs: u64,

    // CORS configuration
    pub cors_allowed_origins: String,
}

/// 趋势排序参数
///
/// `score = (like_weight * likes + views / view_divisor) / (age_days + 1)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingConfig {
    pub like_weight: f64,
    pub view_divisor: f64,
    pub window_days: i64,
    pub max_results: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            like_weight: 2.0,
            view_divisor: 10.0,
            window_days: 7,
            max_results: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let trending = TrendingConfig {
            like_weight: env::var("TRENDING_LIKE_WEIGHT")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()?,
            view_divisor: env::var("TRENDING_VIEW_DIVISOR")
                .unwrap_or_else(|_| "10.0".to_string())
                .parse()?,
            window_days: env::var("TRENDING_WINDOW_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()?,
            max_results: env::var("TRENDING_MAX_RESULTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        if trending.view_divisor <= 0.0 {
            anyhow::bail!("TRENDING_VIEW_DIVISOR must be positive");
        }
        if trending.window_days < 1 || trending.max_results < 1 {
            anyhow::bail!("TRENDING_WINDOW_DAYS and TRENDING_MAX_RESULTS must be at least 1");
        }

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "inkwell_blog=debug,tower_http=debug".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),

            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "memory".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "inkwell".to_string()),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "blog".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,

            max_post_length: env::var("MAX_POST_LENGTH")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()?,
            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            default_posts_per_page: env::var("DEFAULT_POSTS_PER_PAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            default_comments_per_page: env::var("DEFAULT_COMMENTS_PER_PAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            trending,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        };

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5000,
            environment: "development".to_string(),
            log_level: "inkwell_blog=debug".to_string(),
            log_format: "pretty".to_string(),
            database_url: "memory".to_string(),
            database_namespace: "inkwell".to_string(),
            database_name: "blog".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            jwt_secret: "development-secret".to_string(),
            max_post_length: 100_000,
            max_comment_length: 5000,
            default_posts_per_page: 10,
            default_comments_per_page: 10,
            max_page_size: 50,
            trending: TrendingConfig::default(),
            rate_limit_requests: 100,
            request_timeout_secs: 30,
            cors_allowed_origins: "http://localhost:3000".to_string(),
        }
    }
}
