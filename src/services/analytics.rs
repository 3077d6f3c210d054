//! Derived analytics
//!
//! Tag frequencies are computed exactly from the current post set. Page views,
//! bounce rates and traffic breakdowns are *simulated*: they are shaped from
//! the single site-wide visit counter plus random noise, and every value
//! produced here carries `simulated: true`.
//!
//! The pure functions take their inputs explicitly (and a caller-supplied
//! RNG) so they can be tested deterministically. [`AnalyticsService`] fetches
//! the inputs from the store and degrades to empty results when it cannot.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AnalyticsConfig;
use crate::db::repositories::PostRepository;
use crate::models::{
    AnalyticsSummary, BlogPost, PageStat, TagShare, TagStat, TrafficPeriod, TrafficSample,
};
use crate::services::VisitCounter;

/// Share of total visits credited to the highest-ranked page
const TOP_PAGE_SHARE: f64 = 0.3;
/// Share lost per rank below the top
const RANK_DECAY: f64 = 0.05;
/// Unique visitors estimated as this fraction of total visits
const UNIQUE_VISITOR_RATIO: f64 = 0.72;

/// Count tags across `posts` and keep the `limit` most frequent.
///
/// A tag counts once per post. Ties keep the order in which tags were first
/// seen.
pub fn compute_tag_stats(posts: &[BlogPost], limit: usize) -> Vec<TagStat> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u64> = HashMap::new();

    for post in posts {
        for tag in post.tags.iter() {
            let count = counts.entry(tag).or_insert(0);
            if *count == 0 {
                order.push(tag);
            }
            *count += 1;
        }
    }

    let mut stats: Vec<TagStat> = order
        .into_iter()
        .map(|tag| TagStat::new(tag, counts.get(tag).copied().unwrap_or(0)))
        .collect();
    // stable sort keeps first-seen order among equal counts
    stats.sort_by(|a, b| b.count.cmp(&a.count));
    stats.truncate(limit);
    stats
}

/// Simulated views for the first `limit` posts, in the order given
pub fn compute_top_pages<R: Rng + ?Sized>(
    posts: &[BlogPost],
    total_visits: u64,
    limit: usize,
    rng: &mut R,
) -> Vec<PageStat> {
    posts
        .iter()
        .take(limit)
        .enumerate()
        .map(|(rank, post)| {
            let share = TOP_PAGE_SHARE - RANK_DECAY * rank as f64;
            let views = (total_visits as f64 * share).round().max(0.0) as u64;
            PageStat {
                post_id: post.id,
                title: post.display_title().to_string(),
                views,
                bounce_rate: 30 + rng.gen_range(0..20),
                simulated: true,
            }
        })
        .collect()
}

/// Spread `total_visits` over the buckets of `period` with random variance
pub fn synthesize_traffic<R: Rng + ?Sized>(
    total_visits: u64,
    period: TrafficPeriod,
    rng: &mut R,
) -> Vec<TrafficSample> {
    let labels = period.labels();
    let base = total_visits as f64 / labels.len() as f64;
    let denominator = total_visits.max(1) as f64;

    labels
        .iter()
        .map(|label| {
            let variance = 0.5 + rng.gen::<f64>();
            let visits = (base * variance).round() as u64;
            TrafficSample {
                label: label.to_string(),
                visits,
                percentage: (visits as f64 / denominator * 100.0).round() as u64,
                simulated: true,
            }
        })
        .collect()
}

/// Attach each tag's share of all posts, as a rounded percentage
pub fn tag_shares(stats: Vec<TagStat>, total_posts: u64) -> Vec<TagShare> {
    stats
        .into_iter()
        .map(|stat| {
            let percentage = if total_posts == 0 {
                0
            } else {
                (stat.count as f64 / total_posts as f64 * 100.0).round() as u64
            };
            TagShare { stat, percentage }
        })
        .collect()
}

/// Fetches posts and visit totals, then derives the dashboard figures
pub struct AnalyticsService {
    posts: Arc<dyn PostRepository>,
    visits: Arc<VisitCounter>,
    config: AnalyticsConfig,
}

impl AnalyticsService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        visits: Arc<VisitCounter>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            posts,
            visits,
            config,
        }
    }

    /// All posts, newest first; empty if the store is unreachable
    async fn load_posts(&self) -> Vec<BlogPost> {
        match self.posts.list_all().await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!("Failed to load posts for analytics: {:#}", e);
                Vec::new()
            }
        }
    }

    pub async fn tag_stats(&self) -> Vec<TagStat> {
        let posts = self.load_posts().await;
        compute_tag_stats(&posts, self.config.top_tags)
    }

    pub async fn top_pages(&self) -> Vec<PageStat> {
        let posts = self.load_posts().await;
        let total = self.visits.visit_count().await;
        compute_top_pages(&posts, total, self.config.top_pages, &mut rand::thread_rng())
    }

    pub async fn traffic(&self, period: TrafficPeriod) -> Vec<TrafficSample> {
        let total = self.visits.visit_count().await;
        synthesize_traffic(total, period, &mut rand::thread_rng())
    }

    pub async fn summary(&self) -> AnalyticsSummary {
        let posts = self.load_posts().await;
        let total_visits = self.visits.visit_count().await;
        let total_posts = posts.len() as u64;

        let tags = tag_shares(compute_tag_stats(&posts, self.config.top_tags), total_posts);
        let top_pages = compute_top_pages(
            &posts,
            total_visits,
            self.config.top_pages,
            &mut rand::thread_rng(),
        );

        AnalyticsSummary {
            total_visits,
            total_posts,
            unique_visitors: (total_visits as f64 * UNIQUE_VISITOR_RATIO).round() as u64,
            tags,
            top_pages,
            simulated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TagSet;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn post(id: i64, title: &str, tags: &str) -> BlogPost {
        let now = Utc::now();
        BlogPost {
            id,
            title: title.to_string(),
            content: String::new(),
            tags: TagSet::parse_delimited(tags),
            author_name: None,
            author_email: None,
            image_url: None,
            published_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tag_stats_counts_across_posts() {
        let posts = vec![post(1, "a", "a"), post(2, "b", "a"), post(3, "c", "b")];
        let stats = compute_tag_stats(&posts, 6);
        assert_eq!(stats, vec![TagStat::new("a", 2), TagStat::new("b", 1)]);
    }

    #[test]
    fn test_tag_stats_ties_keep_first_seen_order() {
        let posts = vec![post(1, "", "z, y"), post(2, "", "x, y, z"), post(3, "", "x")];
        let stats = compute_tag_stats(&posts, 6);
        let tags: Vec<&str> = stats.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["z", "y", "x"]);
        assert!(stats.iter().all(|s| s.count == 2));
    }

    #[test]
    fn test_tag_stats_truncates_and_handles_empty() {
        let posts = vec![post(1, "", "a, b, c, d, e, f, g, h")];
        assert_eq!(compute_tag_stats(&posts, 6).len(), 6);
        assert!(compute_tag_stats(&[], 6).is_empty());
        assert!(compute_tag_stats(&[post(1, "", "")], 6).is_empty());
    }

    #[test]
    fn test_top_pages_views_decay_by_rank() {
        let posts: Vec<BlogPost> = (1..=7).map(|i| post(i, "", "")).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let pages = compute_top_pages(&posts, 1000, 5, &mut rng);

        let views: Vec<u64> = pages.iter().map(|p| p.views).collect();
        assert_eq!(views, vec![300, 250, 200, 150, 100]);
        assert!(pages.iter().all(|p| p.simulated));
        assert!(pages.iter().all(|p| (30..50).contains(&p.bounce_rate)));
        assert_eq!(pages[0].title, "Untitled Post");
    }

    #[test]
    fn test_top_pages_views_floor_at_zero() {
        let posts: Vec<BlogPost> = (1..=8).map(|i| post(i, "t", "")).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let pages = compute_top_pages(&posts, 100, 8, &mut rng);
        assert_eq!(pages[6].views, 0);
        assert_eq!(pages[7].views, 0);
    }

    #[test]
    fn test_traffic_labels_per_period() {
        let mut rng = StdRng::seed_from_u64(3);
        let week = synthesize_traffic(700, TrafficPeriod::Week, &mut rng);
        assert_eq!(week.first().map(|s| s.label.as_str()), Some("Mon"));
        assert_eq!(week.len(), 7);

        let year = synthesize_traffic(700, TrafficPeriod::Year, &mut rng);
        assert_eq!(year.last().map(|s| s.label.as_str()), Some("Dec"));
        assert!(year.iter().all(|s| s.simulated));
    }

    #[test]
    fn test_traffic_with_no_visits_is_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let month = synthesize_traffic(0, TrafficPeriod::Month, &mut rng);
        assert_eq!(month.len(), 4);
        assert!(month.iter().all(|s| s.visits == 0 && s.percentage == 0));
    }

    #[test]
    fn test_tag_shares_percentages() {
        let shares = tag_shares(vec![TagStat::new("a", 2), TagStat::new("b", 1)], 3);
        assert_eq!(shares[0].percentage, 67);
        assert_eq!(shares[1].percentage, 33);
        assert_eq!(tag_shares(vec![TagStat::new("a", 1)], 0)[0].percentage, 0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::TagSet;
    use chrono::Utc;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn posts_from(tag_lists: &[Vec<String>]) -> Vec<BlogPost> {
        let now = Utc::now();
        tag_lists
            .iter()
            .enumerate()
            .map(|(i, tags)| BlogPost {
                id: i as i64 + 1,
                title: String::new(),
                content: String::new(),
                tags: TagSet::from_tokens(tags),
                author_name: None,
                author_email: None,
                image_url: None,
                published_at: now,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Stats are sorted descending, bounded by the limit and the post count.
        #[test]
        fn tag_stats_sorted_and_bounded(
            tag_lists in proptest::collection::vec(
                proptest::collection::vec("[a-e]", 0..4), 0..12),
            limit in 1usize..8,
        ) {
            let posts = posts_from(&tag_lists);
            let stats = compute_tag_stats(&posts, limit);

            prop_assert!(stats.len() <= limit);
            for pair in stats.windows(2) {
                prop_assert!(pair[0].count >= pair[1].count);
            }
            for stat in &stats {
                prop_assert!(stat.count >= 1);
                prop_assert!(stat.count <= posts.len() as u64);
            }
        }

        /// Every simulated bucket stays within the variance band.
        #[test]
        fn traffic_within_variance_band(total in 0u64..100_000, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for sample in synthesize_traffic(total, TrafficPeriod::Week, &mut rng) {
                let base = total as f64 / 7.0;
                prop_assert!(sample.visits as f64 >= (base * 0.5).floor());
                prop_assert!(sample.visits as f64 <= (base * 1.5).ceil());
            }
        }
    }
}
