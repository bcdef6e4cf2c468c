use crate::error::{AppError, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 身份服务签发的令牌声明；本服务只验证，不签发
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,    // 过期时间
    #[serde(default)]
    pub username: Option<String>,
}

/// 当前请求的已认证用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: Option<String>,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::unauthorized("Invalid token"))
            }
        }
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    pub fn bearer_token(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            exp,
            username: Some("ada".to_string()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token() {
        let auth = AuthService::new("secret");
        let claims = auth.verify_jwt(&token("secret", in_one_hour())).unwrap();
        let user = CurrentUser::from(claims);
        assert_eq!(user.id, "user-1");
        assert_eq!(user.username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_wrong_secret_and_expired_tokens_are_rejected() {
        let auth = AuthService::new("secret");
        assert!(matches!(
            auth.verify_jwt(&token("other", in_one_hour())),
            Err(AppError::Authentication(_))
        ));
        assert!(auth.verify_jwt(&token("secret", 1_000)).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(AuthService::bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(AuthService::bearer_token("Basic abc"), None);
        assert_eq!(AuthService::bearer_token("Bearer "), None);
    }
}
