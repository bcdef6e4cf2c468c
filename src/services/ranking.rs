use crate::{config::TrendingConfig, models::post::Post};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// 时间衰减的热度分数
///
/// `(like_weight * likes + views / view_divisor) / (age_days + 1)`
pub fn trending_score(likes: u64, views: u64, age_days: f64, config: &TrendingConfig) -> f64 {
    let engagement = config.like_weight * likes as f64 + views as f64 / config.view_divisor;
    engagement / (age_days.max(0.0) + 1.0)
}

#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post: Post,
    pub score: f64,
}

/// What a ranking run is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankScope {
    /// Every candidate is scored and kept; the caller pages the result.
    Listing,
    /// Only posts published within `window_days` are eligible, capped at `limit`.
    Sitewide { window_days: i64, limit: usize },
}

/// Scores are recomputed on every call since they depend on the wall clock,
/// so results must not be cached for longer than a short TTL.
#[derive(Debug, Clone)]
pub struct RankingEngine {
    config: TrendingConfig,
}

impl RankingEngine {
    pub fn new(config: TrendingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendingConfig {
        &self.config
    }

    pub fn score(&self, post: &Post, now: DateTime<Utc>) -> f64 {
        trending_score(post.like_count(), post.views, post.age_days(now), &self.config)
    }

    /// Window eligibility: published, and published (or created, if no publish
    /// time was recorded) no earlier than `window_days` before `now`.
    pub fn is_eligible(post: &Post, window_days: i64, now: DateTime<Utc>) -> bool {
        let since = now - Duration::days(window_days);
        let published = post.published_at.unwrap_or(post.created_at);
        post.is_published() && published >= since
    }

    pub fn rank(&self, candidates: Vec<Post>, scope: RankScope, now: DateTime<Utc>) -> Vec<ScoredPost> {
        let mut scored: Vec<ScoredPost> = candidates
            .into_iter()
            .filter(|post| match scope {
                RankScope::Listing => true,
                RankScope::Sitewide { window_days, .. } => Self::is_eligible(post, window_days, now),
            })
            .map(|post| {
                let score = self.score(&post, now);
                ScoredPost { post, score }
            })
            .collect();

        scored.sort_by(compare_scored);

        if let RankScope::Sitewide { limit, .. } = scope {
            scored.truncate(limit);
        }
        scored
    }
}

/// Higher score first, then newer creation time, then id.
fn compare_scored(a: &ScoredPost, b: &ScoredPost) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.post.created_at.cmp(&a.post.created_at))
        .then_with(|| b.post.id.cmp(&a.post.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::fixtures::aged_post;
    use crate::models::post::PostStatus;
    use proptest::prelude::*;

    fn engine() -> RankingEngine {
        RankingEngine::new(TrendingConfig::default())
    }

    #[test]
    fn test_recent_post_outranks_older_busier_post() {
        let now = Utc::now();
        // P: 1 天前, 3 赞, 50 次浏览 -> (6 + 5) / 2
        let p = aged_post("p", now, Duration::days(1), 3, 50);
        // Q: 6 天前, 10 赞, 0 次浏览 -> 20 / 7
        let q = aged_post("q", now, Duration::days(6), 10, 0);

        let e = engine();
        assert!((e.score(&p, now) - 5.5).abs() < 1e-9);
        assert!((e.score(&q, now) - 20.0 / 7.0).abs() < 1e-9);

        let ranked = e.rank(vec![q, p], RankScope::Listing, now);
        assert_eq!(ranked[0].post.id, "p");
        assert_eq!(ranked[1].post.id, "q");
    }

    #[test]
    fn test_ties_break_on_newer_creation() {
        let now = Utc::now();
        let older = aged_post("a", now, Duration::hours(5), 0, 0);
        let newer = aged_post("b", now, Duration::hours(1), 0, 0);

        let ranked = engine().rank(vec![older, newer], RankScope::Listing, now);
        assert_eq!(ranked[0].post.id, "b");
    }

    #[test]
    fn test_sitewide_applies_window_and_cap() {
        let now = Utc::now();
        let mut candidates = vec![aged_post("old", now, Duration::days(8), 100, 1000)];
        let mut draft = aged_post("draft", now, Duration::hours(1), 100, 1000);
        draft.status = PostStatus::Draft;
        candidates.push(draft);
        for i in 0..12 {
            candidates.push(aged_post(&format!("p{}", i), now, Duration::hours(i), 1, 0));
        }

        let ranked = engine().rank(
            candidates,
            RankScope::Sitewide { window_days: 7, limit: 10 },
            now,
        );
        assert_eq!(ranked.len(), 10);
        assert!(ranked.iter().all(|s| s.post.id.starts_with('p')));
        assert_eq!(ranked[0].post.id, "p0");
    }

    #[test]
    fn test_window_uses_publish_time() {
        let now = Utc::now();
        let mut post = aged_post("a", now, Duration::days(30), 0, 0);
        post.published_at = Some(now - Duration::days(2));
        assert!(RankingEngine::is_eligible(&post, 7, now));

        post.published_at = None;
        assert!(!RankingEngine::is_eligible(&post, 7, now));
    }

    #[test]
    fn test_future_created_at_is_clamped() {
        let config = TrendingConfig::default();
        assert_eq!(trending_score(1, 0, -3.0, &config), 2.0);
    }

    proptest! {
        #[test]
        fn prop_younger_post_never_scores_lower(
            likes in 0u64..10_000,
            views in 0u64..1_000_000,
            young in 0.0f64..7.0,
            extra in 0.0f64..7.0,
        ) {
            let config = TrendingConfig::default();
            let younger = trending_score(likes, views, young, &config);
            let older = trending_score(likes, views, young + extra, &config);
            prop_assert!(younger >= older);
        }
    }
}
