// ============================================
// Ranking Engine
// ============================================
//
// Multi-stage pipeline for one viewer's feed:
// 1. Candidate filtering (optional rules)
// 2. Multi-factor scoring
// 3. Sort by total score
// 4. Diversity re-ranking (author/topic caps)
// 5. Rank assignment
// 6. Exploration-exploitation re-ranking (optional)
//
// Feedback flows back through `record_engagement` into the exploration
// statistics, shaping future exploration rounds but never future scoring.

use crate::config::Config;
use crate::error::{RankingError, Result};
use crate::models::{EngagementGraph, EngagementKind, Post, PreferenceWeights, RankedPost, Viewer};
use crate::services::diversity::DiversityLayer;
use crate::services::exploration::{
    AuthorStatsStore, ExplorationDecision, ExplorationLayer, ExplorationStrategy,
    ExplorationSummary,
};
use crate::services::scoring::MultiFactorScorer;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Optional candidate filtering rules, applied before scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub min_quality: Option<f32>,
    pub exclude_topics: Vec<String>,
    /// When non-empty, keep only posts sharing a topic with this list;
    /// posts with no topics at all still pass.
    pub include_topics: Vec<String>,
    pub exclude_authors: Vec<Uuid>,
}

impl CandidateFilter {
    pub fn apply(&self, candidates: Vec<Post>) -> Vec<Post> {
        let exclude_topics: HashSet<&str> =
            self.exclude_topics.iter().map(String::as_str).collect();
        let include_topics: HashSet<&str> =
            self.include_topics.iter().map(String::as_str).collect();
        let exclude_authors: HashSet<Uuid> = self.exclude_authors.iter().copied().collect();

        candidates
            .into_iter()
            .filter(|post| {
                if let Some(min_quality) = self.min_quality {
                    if post.quality_score < min_quality {
                        return false;
                    }
                }
                if post
                    .topics
                    .iter()
                    .any(|topic| exclude_topics.contains(topic.as_str()))
                {
                    return false;
                }
                if !include_topics.is_empty()
                    && !post.topics.is_empty()
                    && !post
                        .topics
                        .iter()
                        .any(|topic| include_topics.contains(topic.as_str()))
                {
                    return false;
                }
                !exclude_authors.contains(&post.author_id)
            })
            .collect()
    }
}

/// Final feed plus its decision trail. Decisions are present iff
/// exploration is enabled.
#[derive(Debug, Clone)]
pub struct RankedFeed {
    pub items: Vec<RankedPost>,
    pub decisions: Option<Vec<ExplorationDecision>>,
}

/// Ranking engine for a single viewer.
///
/// Ranking calls take `&self` and may run in parallel across requests;
/// feedback recording mutates only the sharded statistics store.
pub struct RankingEngine {
    viewer: Viewer,
    scorer: MultiFactorScorer,
    diversity: DiversityLayer,
    exploration: Option<ExplorationLayer>,
}

impl RankingEngine {
    /// Build an engine for one viewer. The viewer's preference weights are
    /// validated and normalized here; invalid weights or config reject
    /// construction.
    pub fn new(viewer: Viewer, config: Config) -> Result<Self> {
        let stats = Arc::new(AuthorStatsStore::new());
        Self::with_stats_store(viewer, config, stats)
    }

    /// Build on a shared statistics store so engines for different viewers
    /// learn from the same engagement history.
    pub fn with_stats_store(
        mut viewer: Viewer,
        config: Config,
        stats: Arc<AuthorStatsStore>,
    ) -> Result<Self> {
        config.validate()?;

        let weights = viewer.preference_weights.into_normalized()?;
        viewer.preference_weights = weights;

        let scorer = MultiFactorScorer::new(weights, config.scoring.popularity_caps)?;
        let diversity = DiversityLayer::from_config(&config.diversity);
        let exploration = if config.exploration.enabled {
            Some(ExplorationLayer::with_stats_store(config.exploration, stats)?)
        } else {
            None
        };

        Ok(Self {
            viewer,
            scorer,
            diversity,
            exploration,
        })
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn weights(&self) -> &PreferenceWeights {
        self.scorer.weights()
    }

    /// Rank candidates for the viewer.
    ///
    /// `rng` drives the three stochastic points (epsilon-greedy sampling,
    /// Thompson draws, presentation shuffle); pass a seeded generator for
    /// reproducible output.
    pub fn rank_posts<R: Rng + ?Sized>(
        &self,
        candidates: Vec<Post>,
        graph: &EngagementGraph,
        filter: Option<&CandidateFilter>,
        num_to_return: usize,
        rng: &mut R,
    ) -> RankedFeed {
        let candidate_count = candidates.len();

        let filtered = match filter {
            Some(rules) => rules.apply(candidates),
            None => candidates,
        };

        let scored = self.scorer.score_batch(filtered, &self.viewer, graph);
        let surviving = self.diversity.filter(scored);

        let ranked: Vec<RankedPost> = surviving
            .into_iter()
            .enumerate()
            .map(|(i, item)| RankedPost {
                post: item.post,
                explanation: item.explanation,
                rank: i + 1,
            })
            .collect();

        debug!(
            viewer_id = %self.viewer.user_id,
            candidate_count,
            ranked_count = ranked.len(),
            num_to_return,
            "Ranking pipeline complete"
        );

        match &self.exploration {
            Some(layer) => {
                let (items, decisions) = layer.rerank_with_exploration(ranked, num_to_return, rng);
                RankedFeed {
                    items,
                    decisions: Some(decisions),
                }
            }
            None => {
                let mut items = ranked;
                items.truncate(num_to_return);
                RankedFeed {
                    items,
                    decisions: None,
                }
            }
        }
    }

    /// Update the viewer's scoring weights. Each value must lie in [0, 1];
    /// on success the four positive factors are re-normalized to sum 1.0.
    /// On error nothing changes.
    pub fn set_weights(&mut self, weights: PreferenceWeights) -> Result<()> {
        self.scorer.set_weights(weights)?;
        self.viewer.preference_weights = *self.scorer.weights();
        Ok(())
    }

    /// Record engagement feedback from the delivered feed. No-op when
    /// exploration is disabled.
    pub fn record_engagement(&self, post_id: Uuid, author_id: Uuid, kind: EngagementKind) {
        if let Some(layer) = &self.exploration {
            layer.record_engagement(post_id, author_id, kind);
        }
    }

    pub fn set_exploration_rate(&mut self, rate: f64) -> Result<()> {
        match &mut self.exploration {
            Some(layer) => layer.set_exploration_rate(rate),
            None => Err(RankingError::InvalidInput(
                "exploration is not enabled for this engine".to_string(),
            )),
        }
    }

    pub fn set_exploration_strategy(&mut self, strategy: ExplorationStrategy) -> Result<()> {
        match &mut self.exploration {
            Some(layer) => {
                layer.set_strategy(strategy);
                Ok(())
            }
            None => Err(RankingError::InvalidInput(
                "exploration is not enabled for this engine".to_string(),
            )),
        }
    }

    /// Clear exploration statistics and the feedback log. No-op when
    /// exploration is disabled.
    pub fn reset_exploration_stats(&self) {
        if let Some(layer) = &self.exploration {
            layer.reset_stats();
        }
    }

    /// Aggregate exploration snapshot, `None` when exploration is disabled.
    pub fn exploration_summary(&self) -> Option<ExplorationSummary> {
        self.exploration.as_ref().map(|layer| layer.summary())
    }
}
