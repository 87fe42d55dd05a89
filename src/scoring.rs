//! Viral score computation and threshold filtering.
//!
//! A candidate is interesting when a small channel pulls far more views than
//! it has subscribers. The ratio of views to subscribers carries most of the
//! score; the log of daily view velocity scales it so that among similar
//! ratios the faster-moving video ranks first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Thresholds;
use crate::youtube::{KeywordOutcome, VideoCandidate};

/// Raw derived numbers for one candidate, before any rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViralMetrics {
    pub views: u64,
    pub subscribers: u64,
    pub days_old: i64,
    pub views_to_subs: f64,
    pub views_per_day: f64,
    pub viral_score: f64,
}

impl ViralMetrics {
    /// Returns `None` when either count is zero; such candidates are never
    /// scored.
    pub fn compute(
        views: u64,
        subscribers: u64,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if views == 0 || subscribers == 0 {
            return None;
        }
        let days_old = days_old(published_at, now);
        let views_to_subs = views as f64 / subscribers as f64;
        let views_per_day = views as f64 / days_old as f64;
        let viral_score = views_to_subs * (views_per_day + 1.0).ln();
        Some(Self {
            views,
            subscribers,
            days_old,
            views_to_subs,
            views_per_day,
            viral_score,
        })
    }

    pub fn passes(&self, thresholds: &Thresholds) -> bool {
        self.subscribers <= thresholds.max_subscribers
            && self.views_to_subs >= thresholds.min_viral_ratio
            && self.days_old <= thresholds.max_video_age_days
    }
}

/// Whole days since publication, truncated, never less than one. A video
/// uploaded a few hours ago (or stamped slightly in the future) counts as one
/// day old.
pub fn days_old(published_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - published_at).num_days().max(1)
}

/// An accepted candidate with the figures shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub keyword: String,
    pub title: String,
    pub url: String,
    pub views: u64,
    pub subscribers: u64,
    pub days_old: i64,
    pub views_to_subs: f64,
    pub views_per_day: u64,
    pub viral_score: f64,
}

impl ScoredResult {
    fn new(keyword: &str, candidate: &VideoCandidate, metrics: &ViralMetrics) -> Self {
        Self {
            keyword: keyword.to_owned(),
            title: candidate.title.clone(),
            url: candidate.watch_url(),
            views: metrics.views,
            subscribers: metrics.subscribers,
            days_old: metrics.days_old,
            views_to_subs: round2(metrics.views_to_subs),
            views_per_day: metrics.views_per_day.trunc() as u64,
            viral_score: round2(metrics.viral_score),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores one candidate and applies the thresholds.
pub fn score_candidate(
    keyword: &str,
    candidate: &VideoCandidate,
    views: u64,
    subscribers: u64,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Option<ScoredResult> {
    let metrics = ViralMetrics::compute(views, subscribers, candidate.published_at, now)?;
    metrics
        .passes(thresholds)
        .then(|| ScoredResult::new(keyword, candidate, &metrics))
}

/// Joins a keyword's candidates with their statistics and keeps the ones
/// that clear every threshold, in search order.
pub fn score_outcome(
    outcome: &KeywordOutcome,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> Vec<ScoredResult> {
    outcome
        .candidates
        .iter()
        .filter_map(|candidate| {
            score_candidate(
                &outcome.keyword,
                candidate,
                outcome.video_stats.views(&candidate.video_id),
                outcome.channel_stats.subscribers(&candidate.channel_id),
                thresholds,
                now,
            )
        })
        .collect()
}
