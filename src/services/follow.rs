use crate::{
    error::{AppError, Result},
    models::follow::*,
    services::store::DynStore,
};
use tracing::{debug, info};

#[derive(Clone)]
pub struct FollowService {
    store: DynStore,
}

impl FollowService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// 关注或取消关注，双方的关系集合一起更新
    pub async fn toggle_follow(&self, follower_id: &str, target_id: &str) -> Result<FollowState> {
        let edge = FollowEdge::new(follower_id, target_id);

        // 防止自己关注自己
        if edge.is_self_follow() {
            return Err(AppError::validation("You cannot follow yourself"));
        }

        let follower = self
            .store
            .get_user(follower_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let follow = !follower.is_following(target_id);
        debug!(
            "User {} {} user {}",
            follower_id,
            if follow { "following" } else { "unfollowing" },
            target_id
        );

        let state = self
            .store
            .set_follow(&edge, follow)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        info!(
            "User {} {} user {} ({} followers)",
            follower_id,
            if state.is_following { "followed" } else { "unfollowed" },
            target_id,
            state.follower_count
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserProfile;
    use crate::services::{memory::MemoryStore, store::BlogStore};
    use std::sync::Arc;

    async fn setup() -> (FollowService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for (id, name) in [("a", "alice"), ("b", "bob")] {
            store
                .insert_user(UserProfile::new(id, name.to_string(), name.to_string()))
                .await
                .unwrap();
        }
        (FollowService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_toggle_follow_round_trip() {
        let (follows, store) = setup().await;

        let state = follows.toggle_follow("a", "b").await.unwrap();
        assert_eq!(state, FollowState { is_following: true, follower_count: 1 });
        assert!(store.get_user("a").await.unwrap().unwrap().is_following("b"));

        let state = follows.toggle_follow("a", "b").await.unwrap();
        assert_eq!(state, FollowState { is_following: false, follower_count: 0 });
        assert!(store.get_user("a").await.unwrap().unwrap().following.is_empty());
        assert!(store.get_user("b").await.unwrap().unwrap().followers.is_empty());
    }

    #[tokio::test]
    async fn test_self_follow_is_rejected() {
        let (follows, _) = setup().await;
        let err = follows.toggle_follow("a", "a").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_target_is_not_found() {
        let (follows, store) = setup().await;
        let err = follows.toggle_follow("a", "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.get_user("a").await.unwrap().unwrap().following.is_empty());
    }
}
