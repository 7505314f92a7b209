// ============================================
// Engagement Statistics Store
// ============================================
//
// Per-author success/failure counters feeding the bandit posteriors.
//
// UCB1 Formula:
//   UCB(a) = empirical_rate(a) + c * sqrt(ln(max(1, n(a))) / n(a))
//
// Thompson Sampling:
//   draw ~ Beta(1 + successes, 1 + failures)
//
// The store is a sharded concurrent map: increments to the same author are
// atomic, increments to different authors do not contend, and reads take no
// global lock.

use dashmap::DashMap;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Uninformed Beta prior for Thompson sampling.
const PRIOR_ALPHA: f64 = 1.0;
const PRIOR_BETA: f64 = 1.0;

/// Engagement history for a single author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementStats {
    pub successes: u64,
    pub failures: u64,
}

impl EngagementStats {
    pub fn new(successes: u64, failures: u64) -> Self {
        Self {
            successes,
            failures,
        }
    }

    /// Total number of exposures.
    pub fn total_trials(&self) -> u64 {
        self.successes + self.failures
    }

    /// Empirical engagement rate, 0.5 (neutral prior) when untried.
    pub fn empirical_rate(&self) -> f64 {
        let trials = self.total_trials();
        if trials == 0 {
            return 0.5;
        }
        self.successes as f64 / trials as f64
    }

    /// Draw from the Beta posterior over the engagement probability.
    pub fn thompson_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let alpha = PRIOR_ALPHA + self.successes as f64;
        let beta = PRIOR_BETA + self.failures as f64;

        // Posterior parameters are 1 + count, strictly positive; fall back
        // to the posterior mean if the distribution is ever refused.
        match Beta::new(alpha, beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => alpha / (alpha + beta),
        }
    }

    /// Upper Confidence Bound score: empirical rate plus a shrinking
    /// uncertainty bonus. Untried authors get maximal optimism.
    pub fn ucb_score(&self, c: f64) -> f64 {
        let trials = self.total_trials();
        if trials == 0 {
            return 1.0;
        }

        let confidence_bonus = c * ((trials.max(1) as f64).ln() / trials as f64).sqrt();
        (self.empirical_rate() + confidence_bonus).min(1.0)
    }
}

/// Shared per-author statistics map. Sole writer is the feedback recorder;
/// the scorer never reads it.
#[derive(Debug, Default)]
pub struct AuthorStatsStore {
    stats: DashMap<Uuid, EngagementStats>,
}

impl AuthorStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment exactly one of the author's counters. Per-key atomic.
    pub fn record(&self, author_id: Uuid, engaged: bool) {
        let mut entry = self.stats.entry(author_id).or_default();
        if engaged {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
    }

    /// Copy of the author's counters; zeroes when the author is untracked.
    pub fn get(&self, author_id: &Uuid) -> EngagementStats {
        self.stats
            .get(author_id)
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    pub fn tracked_authors(&self) -> usize {
        self.stats.len()
    }

    /// Mean empirical rate across tracked authors, 0 when none are tracked.
    pub fn average_engagement_rate(&self) -> f64 {
        if self.stats.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .stats
            .iter()
            .map(|entry| entry.value().empirical_rate())
            .sum();
        sum / self.stats.len() as f64
    }

    pub fn reset(&self) {
        self.stats.clear();
    }
}
