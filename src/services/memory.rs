use crate::{
    error::Result,
    models::{
        comment::{Comment, CommentFilter},
        follow::{FollowEdge, FollowState},
        like::{LikeToggle, SubjectKind},
        post::{Post, PostFilter, PostOrder},
        user::UserProfile,
    },
    services::store::BlogStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 进程内存储，用于开发环境与测试
///
/// Posts and comments live in sharded maps so a like toggle holds only its
/// subject's shard lock. Users sit behind one lock so both sides of a follow
/// edge change together.
#[derive(Default)]
pub struct MemoryStore {
    posts: DashMap<String, Post>,
    comments: DashMap<String, Comment>,
    users: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching_posts(&self, filter: &PostFilter) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn user_matches(user: &UserProfile, term: &str) -> bool {
        term.is_empty()
            || user.username.to_lowercase().contains(term)
            || user.display_name.to_lowercase().contains(term)
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_post(&self, post: Post) -> Result<Post> {
        debug!("Inserting post {} into memory store", post.id);
        self.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.posts.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        Ok(self
            .posts
            .iter()
            .find(|entry| entry.slug == slug)
            .map(|entry| entry.value().clone()))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.posts.iter().any(|entry| entry.slug == slug))
    }

    async fn save_post(&self, post: Post) -> Result<Option<Post>> {
        match self.posts.get_mut(&post.id) {
            Some(mut entry) => {
                let likes = std::mem::take(&mut entry.likes);
                let views = entry.views;
                *entry = Post { likes, views, ..post };
                Ok(Some(entry.value().clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        Ok(self.posts.remove(id).is_some())
    }

    async fn increment_views(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.posts.get_mut(id).map(|mut entry| {
            entry.views += 1;
            entry.value().clone()
        }))
    }

    async fn find_posts(
        &self,
        filter: &PostFilter,
        order: PostOrder,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let mut posts = self.matching_posts(filter);
        posts.sort_by(|a, b| order.compare(a, b));
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_all_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        Ok(self.matching_posts(filter))
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        Ok(self
            .posts
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count() as u64)
    }

    async fn posts_liked_by(&self, user_id: &str) -> Result<Vec<(Post, DateTime<Utc>)>> {
        let mut liked: Vec<(Post, DateTime<Utc>)> = self
            .posts
            .iter()
            .filter(|entry| entry.is_published())
            .filter_map(|entry| {
                entry
                    .likes
                    .liked_at(user_id)
                    .map(|at| (entry.value().clone(), at))
            })
            .collect();
        liked.sort_by(|(a, a_at), (b, b_at)| b_at.cmp(a_at).then_with(|| b.id.cmp(&a.id)));
        Ok(liked)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        self.comments.insert(comment.id.clone(), comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        Ok(self.comments.get(id).map(|entry| entry.value().clone()))
    }

    async fn save_comment(&self, comment: Comment) -> Result<Option<Comment>> {
        match self.comments.get_mut(&comment.id) {
            Some(mut entry) => {
                let likes = std::mem::take(&mut entry.likes);
                *entry = Comment { likes, ..comment };
                Ok(Some(entry.value().clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64> {
        Ok(self
            .comments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count() as u64)
    }

    async fn comment_counts(&self, post_ids: &[String]) -> Result<HashMap<String, u64>> {
        let wanted: HashSet<&str> = post_ids.iter().map(String::as_str).collect();
        let mut counts = HashMap::new();
        for entry in self.comments.iter() {
            if wanted.contains(entry.post_id.as_str()) {
                *counts.entry(entry.post_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn delete_comments(&self, ids: &[String]) -> Result<u64> {
        Ok(ids
            .iter()
            .filter(|id| self.comments.remove(id.as_str()).is_some())
            .count() as u64)
    }

    async fn delete_comments_for_post(&self, post_id: &str) -> Result<u64> {
        let before = self.comments.len();
        self.comments.retain(|_, comment| comment.post_id != post_id);
        Ok((before - self.comments.len()) as u64)
    }

    async fn toggle_like(
        &self,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<LikeToggle>> {
        // get_mut 持有分片写锁，成员检查与修改在同一临界区内完成
        let toggle = match kind {
            SubjectKind::Post => self.posts.get_mut(subject_id).map(|mut post| {
                post.likes.toggle(user_id, at);
                LikeToggle::from_set(&post.likes, user_id)
            }),
            SubjectKind::Comment => self.comments.get_mut(subject_id).map(|mut comment| {
                comment.likes.toggle(user_id, at);
                LikeToggle::from_set(&comment.likes, user_id)
            }),
        };
        Ok(toggle)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>> {
        let users = self.users.read();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile> {
        self.users.write().insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn save_user(&self, user: UserProfile) -> Result<Option<UserProfile>> {
        let mut users = self.users.write();
        match users.get_mut(&user.id) {
            Some(stored) => {
                let followers = std::mem::take(&mut stored.followers);
                let following = std::mem::take(&mut stored.following);
                *stored = UserProfile {
                    followers,
                    following,
                    ..user
                };
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }

    async fn search_users(&self, term: &str, offset: usize, limit: usize) -> Result<Vec<UserProfile>> {
        let term = term.to_lowercase();
        let mut matches: Vec<UserProfile> = self
            .users
            .read()
            .values()
            .filter(|user| Self::user_matches(user, &term))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username).then_with(|| a.id.cmp(&b.id)));
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_users(&self, term: &str) -> Result<u64> {
        let term = term.to_lowercase();
        Ok(self
            .users
            .read()
            .values()
            .filter(|user| Self::user_matches(user, &term))
            .count() as u64)
    }

    async fn set_follow(&self, edge: &FollowEdge, follow: bool) -> Result<Option<FollowState>> {
        let mut users = self.users.write();
        if !users.contains_key(&edge.follower_id) || !users.contains_key(&edge.followee_id) {
            return Ok(None);
        }

        if let Some(follower) = users.get_mut(&edge.follower_id) {
            follower.following.retain(|id| id != &edge.followee_id);
            if follow {
                follower.following.push(edge.followee_id.clone());
            }
        }

        let follower_count = match users.get_mut(&edge.followee_id) {
            Some(followee) => {
                followee.followers.retain(|id| id != &edge.follower_id);
                if follow {
                    followee.followers.push(edge.follower_id.clone());
                }
                followee.followers.len() as u64
            }
            None => 0,
        };

        Ok(Some(FollowState {
            is_following: follow,
            follower_count,
        }))
    }
}
