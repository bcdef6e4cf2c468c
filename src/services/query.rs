use crate::{
    error::Result,
    models::{
        pagination::{Page, PageRequest},
        post::{PostFilter, PostSort, PostView},
    },
    services::{
        engagement::EngagementService,
        ranking::{RankScope, RankingEngine},
        store::DynStore,
    },
};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct TrendingPosts {
    pub items: Vec<PostView>,
    pub period: String,
}

/// 文章列表查询：过滤、排序、分页与互动标注
#[derive(Clone)]
pub struct QueryCoordinator {
    store: DynStore,
    engagement: EngagementService,
    ranking: RankingEngine,
}

impl QueryCoordinator {
    pub fn new(store: DynStore, engagement: EngagementService, ranking: RankingEngine) -> Self {
        Self {
            store,
            engagement,
            ranking,
        }
    }

    /// Counts and fetches with the same filter value; a failure in either aborts the listing.
    pub async fn list(
        &self,
        filter: &PostFilter,
        sort: PostSort,
        request: PageRequest,
        viewer_id: Option<&str>,
    ) -> Result<Page<PostView>> {
        debug!("Listing posts: {:?} sorted {:?}, page {}", filter, sort, request.page);

        let total = self.store.count_posts(filter).await?;

        let items = match sort.store_order() {
            Some(order) => {
                let posts = self
                    .store
                    .find_posts(filter, order, request.offset(), request.page_size)
                    .await?;
                self.engagement.annotate_posts(posts, viewer_id).await?
            }
            None => {
                // 趋势排序必须先对整个候选集打分，再分页
                let candidates = self.store.find_all_posts(filter).await?;
                let ranked = self.ranking.rank(candidates, RankScope::Listing, Utc::now());
                let page = request.slice(ranked);
                let scores: Vec<f64> = page.iter().map(|s| s.score).collect();
                let posts = page.into_iter().map(|s| s.post).collect();
                self.engagement
                    .annotate_posts(posts, viewer_id)
                    .await?
                    .into_iter()
                    .zip(scores)
                    .map(|(view, score)| view.with_score(score))
                    .collect()
            }
        };

        Ok(Page::new(items, request, total))
    }

    /// Top published posts of the last `days` days, capped at `limit`.
    pub async fn sitewide_trending(
        &self,
        days: i64,
        limit: usize,
        viewer_id: Option<&str>,
    ) -> Result<TrendingPosts> {
        let candidates = self.store.find_all_posts(&PostFilter::published()).await?;
        let ranked = self.ranking.rank(
            candidates,
            RankScope::Sitewide {
                window_days: days,
                limit,
            },
            Utc::now(),
        );

        let scores: Vec<f64> = ranked.iter().map(|s| s.score).collect();
        let posts = ranked.into_iter().map(|s| s.post).collect();
        let items = self
            .engagement
            .annotate_posts(posts, viewer_id)
            .await?
            .into_iter()
            .zip(scores)
            .map(|(view, score)| view.with_score(score))
            .collect();

        Ok(TrendingPosts {
            items,
            period: format!("{} days", days),
        })
    }
}
