use serde::{Deserialize, Serialize};

/// Directed follow edge: `follower_id` follows `followee_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEdge {
    pub follower_id: String,
    pub followee_id: String,
}

impl FollowEdge {
    pub fn new(follower_id: &str, followee_id: &str) -> Self {
        Self {
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
        }
    }

    pub fn is_self_follow(&self) -> bool {
        self.follower_id == self.followee_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub is_following: bool,
    pub follower_count: u64,
}
