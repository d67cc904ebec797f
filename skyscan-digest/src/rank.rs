//! Admission filter and ranking.
use crate::criteria::SearchCriteria;
use crate::post::{CanonicalPost, normalize};
use skyscan_social::bluesky::PostView;
use std::cmp::Ordering;
use time::OffsetDateTime;

/// Normalize, filter and rank raw posts. Pure given `now`.
///
/// A post is admitted iff it is no older than the cutoff and meets both
/// engagement thresholds. Admitted posts are ordered by score descending,
/// then newest first, then by `id` and `permalink` so that equal-looking
/// posts still land in a fixed order.
pub fn filter_and_rank(
    raw: &[PostView],
    criteria: &SearchCriteria,
    now: OffsetDateTime,
) -> Vec<CanonicalPost> {
    let cutoff_ms = criteria.cutoff_ms(now);

    let mut admitted: Vec<CanonicalPost> = raw
        .iter()
        .map(|p| normalize(p, now))
        .filter(|p| admits(p, criteria, cutoff_ms))
        .collect();
    admitted.sort_by(rank_order);

    tracing::debug!(
        scanned = raw.len(),
        admitted = admitted.len(),
        cutoff_ms,
        min_reposts = criteria.min_reposts,
        min_likes = criteria.min_likes,
        "digest.filter_and_rank"
    );
    admitted
}

fn admits(p: &CanonicalPost, criteria: &SearchCriteria, cutoff_ms: i64) -> bool {
    p.created_at_ms >= cutoff_ms
        && p.repost_count >= criteria.min_reposts
        && p.like_count >= criteria.min_likes
}

fn rank_order(a: &CanonicalPost, b: &CanonicalPost) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| b.created_at_ms.cmp(&a.created_at_ms))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.permalink.cmp(&b.permalink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::epoch_ms;
    use skyscan_social::bluesky::{PostRecord, ProfileView};
    use time::format_description::well_known::Rfc3339;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    const NOW: OffsetDateTime = datetime!(2025-02-01 12:00 UTC);

    fn raw(id: &str, reposts: u64, likes: u64, age: Duration) -> PostView {
        PostView {
            uri: Some(format!("at://did:plc:x/app.bsky.feed.post/{id}")),
            author: Some(ProfileView {
                handle: Some("alice.bsky.social".into()),
                ..Default::default()
            }),
            record: Some(PostRecord {
                text: Some(format!("post {id}")),
                created_at: None,
            }),
            indexed_at: Some((NOW - age).format(&Rfc3339).unwrap()),
            repost_count: Some(reposts),
            like_count: Some(likes),
            ..Default::default()
        }
    }

    fn ids(posts: &[CanonicalPost]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn thresholds_and_window_are_enforced() {
        let criteria = SearchCriteria::new("trade");
        let posts = [
            raw("keep", 15, 2, Duration::hours(1)),
            raw("few-reposts", 5, 50, Duration::hours(1)),
            raw("too-old", 20, 0, Duration::hours(10)),
        ];
        let out = filter_and_rank(&posts, &criteria, NOW);
        assert_eq!(ids(&out), ["keep"]);

        let cutoff = criteria.cutoff_ms(NOW);
        for p in &out {
            assert!(p.created_at_ms >= cutoff);
            assert!(p.repost_count >= criteria.min_reposts);
            assert!(p.like_count >= criteria.min_likes);
        }
    }

    #[test]
    fn cutoff_is_inclusive() {
        let criteria = SearchCriteria::new("x");
        let edge = raw("edge", 10, 0, Duration::hours(6));
        let out = filter_and_rank(&[edge], &criteria, NOW);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at_ms, criteria.cutoff_ms(NOW));
    }

    #[test]
    fn zero_thresholds_admit_everything_in_window() {
        let criteria = SearchCriteria {
            min_reposts: 0,
            min_likes: 0,
            ..SearchCriteria::new("x")
        };
        let posts = [
            raw("a", 0, 0, Duration::minutes(5)),
            raw("b", 1, 0, Duration::hours(2)),
            raw("c", 0, 0, Duration::hours(7)),
        ];
        let out = filter_and_rank(&posts, &criteria, NOW);
        assert_eq!(ids(&out), ["b", "a"]);
    }

    #[test]
    fn sorted_by_score_descending() {
        let criteria = SearchCriteria {
            min_reposts: 0,
            ..SearchCriteria::new("x")
        };
        let posts = [
            raw("low", 1, 1, Duration::hours(1)),
            raw("high", 40, 3, Duration::hours(5)),
            raw("mid", 10, 10, Duration::hours(2)),
        ];
        let out = filter_and_rank(&posts, &criteria, NOW);
        assert_eq!(ids(&out), ["high", "mid", "low"]);
        assert!(out.windows(2).all(|w| w[0].score() >= w[1].score()));
    }

    #[test]
    fn ties_break_newest_first_then_by_id() {
        let criteria = SearchCriteria {
            min_reposts: 0,
            ..SearchCriteria::new("x")
        };
        let posts = [
            raw("older", 5, 5, Duration::hours(3)),
            raw("zz", 6, 4, Duration::hours(1)),
            raw("aa", 4, 6, Duration::hours(1)),
        ];
        let out = filter_and_rank(&posts, &criteria, NOW);
        assert_eq!(ids(&out), ["aa", "zz", "older"]);

        // Input order must not matter.
        let mut reversed = posts.to_vec();
        reversed.reverse();
        assert_eq!(ids(&filter_and_rank(&reversed, &criteria, NOW)), ["aa", "zz", "older"]);
    }

    #[test]
    fn missing_timestamp_counts_as_now() {
        let criteria = SearchCriteria {
            min_reposts: 0,
            ..SearchCriteria::new("x")
        };
        let mut p = raw("undated", 0, 0, Duration::ZERO);
        p.indexed_at = None;
        let out = filter_and_rank(&[p], &criteria, NOW);
        assert_eq!(out[0].created_at_ms, epoch_ms(NOW));
    }
}
