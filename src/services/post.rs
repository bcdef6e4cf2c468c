use crate::{
    error::{AppError, Result},
    models::{
        pagination::{Page, PageRequest},
        post::*,
    },
    services::{engagement::EngagementService, query::QueryCoordinator, store::DynStore},
    utils::{slug, text},
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

const MAX_SLUG_ATTEMPTS: u32 = 100;

/// 文章生命周期：创建、编辑、发布、删除与读取
#[derive(Clone)]
pub struct PostService {
    store: DynStore,
    engagement: EngagementService,
    query: QueryCoordinator,
    max_post_length: usize,
}

impl PostService {
    pub fn new(
        store: DynStore,
        engagement: EngagementService,
        query: QueryCoordinator,
        max_post_length: usize,
    ) -> Self {
        Self {
            store,
            engagement,
            query,
            max_post_length,
        }
    }

    /// 创建新文章
    pub async fn create_post(&self, author_id: &str, request: CreatePostRequest) -> Result<PostView> {
        debug!("Creating post for user: {}", author_id);

        request.validate().map_err(AppError::ValidatorError)?;
        self.check_body_length(&request.body)?;

        let status = request.status.unwrap_or_default();
        if status == PostStatus::Archived {
            return Err(AppError::validation("New posts must be draft or published"));
        }

        let now = Utc::now();
        let body = text::sanitize_html(&request.body);
        let (excerpt, excerpt_is_custom) = match request.excerpt {
            Some(excerpt) if !excerpt.trim().is_empty() => (excerpt.trim().to_string(), true),
            _ => (text::derive_excerpt(&body), false),
        };

        let mut post = Post {
            id: Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            slug: self.generate_unique_slug(&request.title).await?,
            reading_time: text::reading_time(&body),
            body,
            excerpt,
            excerpt_is_custom,
            cover_image: request.cover_image,
            author_id: author_id.to_string(),
            tags: text::normalize_tags(&request.tags.unwrap_or_default()),
            category: request.category.trim().to_string(),
            status: PostStatus::Draft,
            likes: Default::default(),
            views: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
        };
        if status == PostStatus::Published {
            post.publish(now);
        }

        let created = self.store.insert_post(post).await?;
        info!("Created post: {} ({}) by user: {}", created.id, created.slug, author_id);

        self.engagement.annotate_post(created, Some(author_id)).await
    }

    /// 更新文章；slug 一旦生成便不再改变
    pub async fn update_post(
        &self,
        post_id: &str,
        user_id: &str,
        request: UpdatePostRequest,
    ) -> Result<PostView> {
        debug!("Updating post: {} by user: {}", post_id, user_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        if !post.is_authored_by(user_id) {
            return Err(AppError::forbidden("You can only edit your own posts"));
        }

        let now = Utc::now();

        if let Some(title) = request.title {
            post.title = title.trim().to_string();
        }

        if let Some(excerpt) = request.excerpt {
            if excerpt.trim().is_empty() {
                post.excerpt_is_custom = false;
            } else {
                post.excerpt = excerpt.trim().to_string();
                post.excerpt_is_custom = true;
            }
        }

        if let Some(body) = request.body {
            self.check_body_length(&body)?;
            post.body = text::sanitize_html(&body);
            post.reading_time = text::reading_time(&post.body);
        }

        if !post.excerpt_is_custom {
            post.excerpt = text::derive_excerpt(&post.body);
        }

        if let Some(cover_image) = request.cover_image {
            post.cover_image = Some(cover_image).filter(|url| !url.trim().is_empty());
        }

        if let Some(category) = request.category {
            post.category = category.trim().to_string();
        }

        if let Some(tags) = request.tags {
            post.tags = text::normalize_tags(&tags);
        }

        post.updated_at = now;
        if let Some(status) = request.status {
            post.set_status(status, now);
        }

        let saved = self
            .store
            .save_post(post)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        info!("Updated post: {}", saved.id);
        self.engagement.annotate_post(saved, Some(user_id)).await
    }

    /// 删除文章及其全部评论
    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> Result<()> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        if !post.is_authored_by(user_id) {
            return Err(AppError::forbidden("You can only delete your own posts"));
        }

        let removed = self.store.delete_comments_for_post(post_id).await?;
        self.store.delete_post(post_id).await?;

        info!("Deleted post: {} and {} comments", post_id, removed);
        Ok(())
    }

    /// Reads a post by id or slug and counts the view.
    ///
    /// A slug only resolves published posts. An id also resolves the caller's
    /// own drafts and archived posts; anything else is reported as missing.
    pub async fn get_post(&self, identifier: &str, viewer_id: Option<&str>) -> Result<PostView> {
        debug!("Getting post: {}", identifier);

        let post = if Uuid::parse_str(identifier).is_ok() {
            self.store
                .get_post(identifier)
                .await?
                .filter(|post| post.is_visible_to(viewer_id))
        } else if slug::is_valid_slug(identifier) {
            self.store
                .get_post_by_slug(identifier)
                .await?
                .filter(Post::is_published)
        } else {
            None
        }
        .ok_or_else(|| AppError::not_found("Post"))?;

        let viewed = self
            .store
            .increment_views(&post.id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        self.engagement.annotate_post(viewed, viewer_id).await
    }

    /// Posts by one author, newest first. Only the author may see non-published posts.
    pub async fn list_for_author(
        &self,
        author_id: &str,
        viewer_id: Option<&str>,
        status: Option<PostStatus>,
        request: PageRequest,
    ) -> Result<Page<PostView>> {
        let is_owner = viewer_id == Some(author_id);
        let filter = PostFilter {
            status: if is_owner { status } else { Some(PostStatus::Published) },
            author_id: Some(author_id.to_string()),
            ..Default::default()
        };

        self.query.list(&filter, PostSort::Newest, request, viewer_id).await
    }

    /// 用户点赞过的已发布文章，最近点赞的在前
    pub async fn liked_by(
        &self,
        user_id: &str,
        requester_id: &str,
        request: PageRequest,
    ) -> Result<Page<PostView>> {
        if user_id != requester_id {
            return Err(AppError::forbidden("You can only view your own liked posts"));
        }

        let liked = self.store.posts_liked_by(user_id).await?;
        let total = liked.len() as u64;
        let posts = request
            .slice(liked)
            .into_iter()
            .map(|(post, _)| post)
            .collect();

        let items = self.engagement.annotate_posts(posts, Some(user_id)).await?;
        Ok(Page::new(items, request, total))
    }

    fn check_body_length(&self, body: &str) -> Result<()> {
        if body.chars().count() > self.max_post_length {
            return Err(AppError::Validation(format!(
                "Body must be at most {} characters",
                self.max_post_length
            )));
        }
        Ok(())
    }

    async fn generate_unique_slug(&self, title: &str) -> Result<String> {
        let base_slug = slug::generate_slug(title);

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = slug::with_suffix(&base_slug, attempt);
            if !self.store.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        // 数字后缀耗尽时退回随机后缀
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base_slug, &suffix[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrendingConfig;
    use crate::models::comment::fixtures::comment;
    use crate::models::like::SubjectKind;
    use crate::services::{
        memory::MemoryStore, ranking::RankingEngine, store::BlogStore,
    };
    use std::sync::Arc;

    fn service(store: Arc<MemoryStore>) -> PostService {
        let store: DynStore = store;
        let engagement = EngagementService::new(store.clone());
        let query = QueryCoordinator::new(
            store.clone(),
            engagement.clone(),
            RankingEngine::new(TrendingConfig::default()),
        );
        PostService::new(store, engagement, query, 100_000)
    }

    fn request(title: &str, status: Option<PostStatus>) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            body: "<p>Hello <b>readers</b></p><script>alert('x')</script>".to_string(),
            excerpt: None,
            cover_image: None,
            category: "Programming".to_string(),
            tags: Some(vec![" Rust ".to_string(), "rust".to_string(), "Web".to_string()]),
            status,
        }
    }

    #[tokio::test]
    async fn test_create_derives_fields() {
        let posts = service(Arc::new(MemoryStore::new()));
        let created = posts.create_post("u1", request("Hello World", None)).await.unwrap();

        assert_eq!(created.slug, "hello-world");
        assert_eq!(created.status, PostStatus::Draft);
        assert!(created.published_at.is_none());
        assert_eq!(created.tags, vec!["rust", "web"]);
        assert_eq!(created.excerpt, "Hello readers");
        assert!(!created.body.contains("script"));
        assert_eq!(created.reading_time.minutes, 1);
        assert_eq!(created.like_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixed_slugs() {
        let posts = service(Arc::new(MemoryStore::new()));
        let first = posts.create_post("u1", request("Same Title", None)).await.unwrap();
        let second = posts.create_post("u2", request("Same Title", None)).await.unwrap();
        let third = posts.create_post("u2", request("Same Title", None)).await.unwrap();

        assert_eq!(first.slug, "same-title");
        assert_eq!(second.slug, "same-title-1");
        assert_eq!(third.slug, "same-title-2");
    }

    #[tokio::test]
    async fn test_update_keeps_slug_and_publish_time() {
        let posts = service(Arc::new(MemoryStore::new()));
        let created = posts
            .create_post("u1", request("Original", Some(PostStatus::Published)))
            .await
            .unwrap();
        let published_at = created.published_at;
        assert!(published_at.is_some());

        let updated = posts
            .update_post(
                &created.id,
                "u1",
                UpdatePostRequest {
                    title: Some("Renamed".to_string()),
                    body: Some("<p>Completely new body</p>".to_string()),
                    status: Some(PostStatus::Draft),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "original");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.excerpt, "Completely new body");

        let republished = posts
            .update_post(
                &created.id,
                "u1",
                UpdatePostRequest {
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(republished.published_at, published_at);
    }

    #[tokio::test]
    async fn test_custom_excerpt_survives_body_edit() {
        let posts = service(Arc::new(MemoryStore::new()));
        let mut req = request("Excerpted", None);
        req.excerpt = Some("Hand written".to_string());
        let created = posts.create_post("u1", req).await.unwrap();

        let updated = posts
            .update_post(
                &created.id,
                "u1",
                UpdatePostRequest {
                    body: Some("<p>Other</p>".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.excerpt, "Hand written");
    }

    #[tokio::test]
    async fn test_only_author_can_mutate() {
        let posts = service(Arc::new(MemoryStore::new()));
        let created = posts.create_post("u1", request("Mine", None)).await.unwrap();

        let err = posts
            .update_post(&created.id, "u2", UpdatePostRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = posts.delete_post(&created.id, "u2").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_comments() {
        let store = Arc::new(MemoryStore::new());
        let posts = service(store.clone());
        let created = posts
            .create_post("u1", request("Doomed", Some(PostStatus::Published)))
            .await
            .unwrap();
        let now = Utc::now();
        store.insert_comment(comment("c1", &created.id, None, now)).await.unwrap();
        store.insert_comment(comment("c2", &created.id, Some("c1"), now)).await.unwrap();

        posts.delete_post(&created.id, "u1").await.unwrap();

        assert!(store.get_post(&created.id).await.unwrap().is_none());
        assert!(store.get_comment("c1").await.unwrap().is_none());
        assert!(store.get_comment("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_counts_views_and_hides_drafts() {
        let posts = service(Arc::new(MemoryStore::new()));
        let published = posts
            .create_post("u1", request("Public", Some(PostStatus::Published)))
            .await
            .unwrap();
        let draft = posts.create_post("u1", request("Secret", None)).await.unwrap();

        let first = posts.get_post("public", None).await.unwrap();
        let second = posts.get_post(&published.id, Some("u2")).await.unwrap();
        assert_eq!(first.views, 1);
        assert_eq!(second.views, 2);

        assert!(matches!(
            posts.get_post(&draft.id, Some("u2")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            posts.get_post("secret", Some("u1")).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(posts.get_post(&draft.id, Some("u1")).await.unwrap().views, 1);
    }

    #[tokio::test]
    async fn test_author_listing_respects_ownership() {
        let posts = service(Arc::new(MemoryStore::new()));
        posts
            .create_post("u1", request("Out", Some(PostStatus::Published)))
            .await
            .unwrap();
        posts.create_post("u1", request("Draft", None)).await.unwrap();
        let page = PageRequest::new(1, 10, 50).unwrap();

        let public = posts.list_for_author("u1", Some("u2"), None, page).await.unwrap();
        assert_eq!(public.pagination.total_items, 1);

        let own = posts.list_for_author("u1", Some("u1"), None, page).await.unwrap();
        assert_eq!(own.pagination.total_items, 2);

        let drafts = posts
            .list_for_author("u1", Some("u1"), Some(PostStatus::Draft), page)
            .await
            .unwrap();
        assert_eq!(drafts.items[0].title, "Draft");
    }

    #[tokio::test]
    async fn test_liked_posts_are_private_and_marked() {
        let store = Arc::new(MemoryStore::new());
        let posts = service(store.clone());
        let a = posts
            .create_post("u1", request("A", Some(PostStatus::Published)))
            .await
            .unwrap();
        let b = posts
            .create_post("u1", request("B", Some(PostStatus::Published)))
            .await
            .unwrap();
        let now = Utc::now();
        store.toggle_like(SubjectKind::Post, &a.id, "fan", now).await.unwrap();
        store
            .toggle_like(SubjectKind::Post, &b.id, "fan", now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        let page = PageRequest::new(1, 10, 50).unwrap();

        let liked = posts.liked_by("fan", "fan", page).await.unwrap();
        let ids: Vec<_> = liked.items.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![b.id.clone(), a.id.clone()]);
        assert!(liked.items.iter().all(|p| p.is_liked));

        assert!(matches!(
            posts.liked_by("fan", "someone", page).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
