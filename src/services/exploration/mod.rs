// ============================================
// Exploration Module
// ============================================
//
// Explore-exploit re-ranking for the final feed:
// 1. Head of the pre-ranked list is kept as exploitation slots
// 2. A bandit strategy picks exploration candidates from the remainder
// 3. The combined set is shuffled so presentation order hides which
//    items were exploratory
// 4. Every output item carries an auditable selection decision
//
// Engagement feedback flows back through `record_engagement`, the sole
// mutator of the author statistics.

pub mod stats;

pub use stats::{AuthorStatsStore, EngagementStats};

use crate::config::ExplorationConfig;
use crate::error::{RankingError, Result};
use crate::models::{EngagementKind, RankedPost};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Exploration constant for UCB selection (higher = more exploration).
const UCB_EXPLORATION_CONSTANT: f64 = 1.25;

/// Blend of bandit signal vs. original ranker score per strategy.
const THOMPSON_SAMPLE_WEIGHT: f64 = 0.6;
const THOMPSON_SCORE_WEIGHT: f64 = 0.4;
const UCB_SIGNAL_WEIGHT: f64 = 0.7;
const UCB_SCORE_WEIGHT: f64 = 0.3;

/// Empirical rate above which an explored author is called out as
/// under-represented quality.
const QUALITY_AUTHOR_RATE: f64 = 0.6;

/// Strategy for balancing exploitation vs. exploration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStrategy {
    /// Uniform random exploration, ignoring scores
    #[default]
    EpsilonGreedy,
    /// Bayesian: explore based on posterior uncertainty
    ThompsonSampling,
    /// Upper Confidence Bound: prefer high-uncertainty, high-potential items
    Ucb,
}

impl ExplorationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExplorationStrategy::EpsilonGreedy => "epsilon_greedy",
            ExplorationStrategy::ThompsonSampling => "thompson_sampling",
            ExplorationStrategy::Ucb => "ucb",
        }
    }
}

/// Whether an output slot was filled by exploitation or exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Exploitation,
    Exploration,
}

/// Author counters at decision time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthorStatsSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub engagement_rate: f64,
}

impl From<EngagementStats> for AuthorStatsSnapshot {
    fn from(stats: EngagementStats) -> Self {
        Self {
            successes: stats.successes,
            failures: stats.failures,
            engagement_rate: stats.empirical_rate(),
        }
    }
}

/// Audit record explaining why an item is in the final feed, one per
/// output item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationDecision {
    pub post_id: Uuid,
    pub original_rank: usize,
    pub selected_for: SelectionKind,
    pub reason: String,
    pub author_stats: AuthorStatsSnapshot,
}

/// One feedback event, appended by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub engaged: bool,
    pub kind: EngagementKind,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate view of the exploration state.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorationSummary {
    pub total_authors_tracked: usize,
    pub average_engagement_rate: f64,
    pub strategy_used: ExplorationStrategy,
    pub exploration_rate: f64,
    pub feedback_log_len: usize,
}

/// Exploration-Exploitation layer for feed re-ranking.
///
/// Ranking calls are read-only against the shared statistics; feedback calls
/// mutate per-author counters without contending across authors.
pub struct ExplorationLayer {
    exploration_rate: f64,
    strategy: ExplorationStrategy,
    stats: Arc<AuthorStatsStore>,
    feedback_log: Mutex<Vec<EngagementRecord>>,
}

impl ExplorationLayer {
    pub fn new(config: ExplorationConfig) -> Result<Self> {
        Self::with_stats_store(config, Arc::new(AuthorStatsStore::new()))
    }

    /// Build on an existing statistics store, so several layers (or several
    /// viewers' engines) learn from the same engagement history.
    pub fn with_stats_store(config: ExplorationConfig, stats: Arc<AuthorStatsStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exploration_rate: config.exploration_rate,
            strategy: config.strategy,
            stats,
            feedback_log: Mutex::new(Vec::new()),
        })
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn strategy(&self) -> ExplorationStrategy {
        self.strategy
    }

    pub fn stats_store(&self) -> Arc<AuthorStatsStore> {
        Arc::clone(&self.stats)
    }

    /// Adjust the exploration rate at runtime. Out-of-range values are
    /// rejected and leave the current rate in effect.
    pub fn set_exploration_rate(&mut self, rate: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(RankingError::InvalidConfiguration(format!(
                "exploration_rate must be in [0, 1], got {}",
                rate
            )));
        }
        self.exploration_rate = rate;
        Ok(())
    }

    pub fn set_strategy(&mut self, strategy: ExplorationStrategy) {
        self.strategy = strategy;
    }

    /// Re-rank an already-ranked feed, reserving slots for exploration.
    ///
    /// Output size is `min(num_to_return, ranked.len())` with no duplicates.
    /// When the input already fits the request it passes through unchanged
    /// and no decisions are emitted.
    pub fn rerank_with_exploration<R: Rng + ?Sized>(
        &self,
        ranked: Vec<RankedPost>,
        num_to_return: usize,
        rng: &mut R,
    ) -> (Vec<RankedPost>, Vec<ExplorationDecision>) {
        if num_to_return == 0 || ranked.is_empty() {
            return (Vec::new(), Vec::new());
        }

        if ranked.len() <= num_to_return {
            return (ranked, Vec::new());
        }

        let num_exploration = ((num_to_return as f64 * self.exploration_rate).floor() as usize).max(1);
        let num_exploitation = num_to_return - num_exploration;

        let mut head = ranked;
        let pool = head.split_off(num_exploitation);

        let selected = self.select_candidates(&pool, num_exploration, rng);
        let exploration_ids: HashSet<Uuid> =
            selected.iter().map(|item| item.post.post_id).collect();

        let mut combined = head;
        combined.extend(selected);
        // Hide which slots were exploratory
        combined.shuffle(rng);

        let decisions: Vec<ExplorationDecision> = combined
            .iter()
            .map(|item| self.decision_for(item, exploration_ids.contains(&item.post.post_id)))
            .collect();

        info!(
            strategy = self.strategy.as_str(),
            num_exploitation,
            num_exploration,
            feed_size = combined.len(),
            "Exploration re-ranking complete"
        );

        (combined, decisions)
    }

    fn select_candidates<R: Rng + ?Sized>(
        &self,
        pool: &[RankedPost],
        num_to_select: usize,
        rng: &mut R,
    ) -> Vec<RankedPost> {
        match self.strategy {
            ExplorationStrategy::EpsilonGreedy => {
                self.epsilon_greedy_selection(pool, num_to_select, rng)
            }
            ExplorationStrategy::ThompsonSampling => {
                self.thompson_sampling_selection(pool, num_to_select, rng)
            }
            ExplorationStrategy::Ucb => self.ucb_selection(pool, num_to_select),
        }
    }

    /// Uniform sample without replacement, ignoring scores.
    fn epsilon_greedy_selection<R: Rng + ?Sized>(
        &self,
        pool: &[RankedPost],
        num_to_select: usize,
        rng: &mut R,
    ) -> Vec<RankedPost> {
        pool.choose_multiple(rng, num_to_select.min(pool.len()))
            .cloned()
            .collect()
    }

    /// Score each candidate by a posterior draw blended with its original
    /// ranker score; candidates with more uncertainty surface more often.
    fn thompson_sampling_selection<R: Rng + ?Sized>(
        &self,
        pool: &[RankedPost],
        num_to_select: usize,
        rng: &mut R,
    ) -> Vec<RankedPost> {
        let scored = pool
            .iter()
            .map(|item| {
                let stats = self.stats.get(&item.post.author_id);
                THOMPSON_SAMPLE_WEIGHT * stats.thompson_sample(rng)
                    + THOMPSON_SCORE_WEIGHT * item.explanation.total_score as f64
            })
            .collect();

        take_top_scored(pool, scored, num_to_select)
    }

    /// Prefer high-potential, high-uncertainty items: few exposures with a
    /// decent history get boosted.
    fn ucb_selection(&self, pool: &[RankedPost], num_to_select: usize) -> Vec<RankedPost> {
        let scored = pool
            .iter()
            .map(|item| {
                let stats = self.stats.get(&item.post.author_id);
                UCB_SIGNAL_WEIGHT * stats.ucb_score(UCB_EXPLORATION_CONSTANT)
                    + UCB_SCORE_WEIGHT * item.explanation.total_score as f64
            })
            .collect();

        take_top_scored(pool, scored, num_to_select)
    }

    fn decision_for(&self, item: &RankedPost, is_exploration: bool) -> ExplorationDecision {
        let stats = self.stats.get(&item.post.author_id);
        let reason = if is_exploration {
            self.exploration_reason(&stats)
        } else {
            format!(
                "Highly relevant (score: {:.2})",
                item.explanation.total_score
            )
        };

        ExplorationDecision {
            post_id: item.post.post_id,
            original_rank: item.rank,
            selected_for: if is_exploration {
                SelectionKind::Exploration
            } else {
                SelectionKind::Exploitation
            },
            reason,
            author_stats: stats.into(),
        }
    }

    fn exploration_reason(&self, stats: &EngagementStats) -> String {
        if stats.total_trials() == 0 {
            return "New author - exploring diverse voices".to_string();
        }
        if stats.empirical_rate() > QUALITY_AUTHOR_RATE {
            return format!(
                "Under-represented quality author (engagement rate: {:.1}%)",
                stats.empirical_rate() * 100.0
            );
        }
        match self.strategy {
            ExplorationStrategy::ThompsonSampling => {
                "High-potential content based on Bayesian sampling".to_string()
            }
            ExplorationStrategy::Ucb => {
                "High-uncertainty, high-potential content to discover new interests".to_string()
            }
            ExplorationStrategy::EpsilonGreedy => {
                "Exploratory content to diversify your feed".to_string()
            }
        }
    }

    /// Record engagement feedback for a shown post. Appends one audit entry
    /// and increments exactly one of the author's counters. This is the
    /// sole mutator of the statistics store.
    pub fn record_engagement(&self, post_id: Uuid, author_id: Uuid, kind: EngagementKind) {
        let engaged = kind.is_engagement();
        self.stats.record(author_id, engaged);

        debug!(
            %post_id,
            %author_id,
            engaged,
            kind = kind.as_str(),
            "Engagement feedback recorded"
        );

        self.lock_log().push(EngagementRecord {
            post_id,
            author_id,
            engaged,
            kind,
            recorded_at: Utc::now(),
        });
    }

    /// Clear all statistics and the feedback audit log.
    pub fn reset_stats(&self) {
        self.stats.reset();
        self.lock_log().clear();
    }

    pub fn summary(&self) -> ExplorationSummary {
        ExplorationSummary {
            total_authors_tracked: self.stats.tracked_authors(),
            average_engagement_rate: self.stats.average_engagement_rate(),
            strategy_used: self.strategy,
            exploration_rate: self.exploration_rate,
            feedback_log_len: self.lock_log().len(),
        }
    }

    fn lock_log(&self) -> MutexGuard<'_, Vec<EngagementRecord>> {
        match self.feedback_log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Pair items with bandit scores, sort descending, take the top.
/// NaN scores are treated as less than any valid score.
fn take_top_scored(pool: &[RankedPost], scores: Vec<f64>, num_to_select: usize) -> Vec<RankedPost> {
    let mut scored: Vec<(f64, &RankedPost)> = scores.into_iter().zip(pool).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(num_to_select)
        .map(|(_, item)| item.clone())
        .collect()
}
