// ============================================
// Multi-Factor Scoring Module
// ============================================
//
// Computes per-candidate component scores (recency, popularity, quality,
// topic relevance, diversity penalty), a weighted total, and a
// human-readable explanation for feed ranking.

use crate::config::PopularityCaps;
use crate::error::Result;
use crate::models::{
    EngagementGraph, Post, PreferenceWeights, ScoredPost, ScoringExplanation, Viewer,
};
use crate::utils;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Recency half-life in hours.
const RECENCY_HALF_LIFE_HOURS: f32 = 24.0;

/// Sub-weights for the popularity factor: likes, reposts, replies, bookmarks.
const POPULARITY_MIX: (f32, f32, f32, f32) = (0.4, 0.35, 0.15, 0.1);

/// Topic relevance blend: Jaccard over interests vs. expertise overlap.
const RELEVANCE_JACCARD_WEIGHT: f32 = 0.6;
const RELEVANCE_EXPERTISE_WEIGHT: f32 = 0.4;

/// Neutral relevance when either topic set is empty.
const NEUTRAL_RELEVANCE: f32 = 0.5;

/// Flat penalty for posts from authors the viewer does not follow.
const UNFOLLOWED_AUTHOR_PENALTY: f32 = 0.05;

/// Multi-Factor Scorer
///
/// Holds validated, normalized preference weights and popularity caps.
/// Scoring is deterministic given identical inputs.
pub struct MultiFactorScorer {
    weights: PreferenceWeights,
    caps: PopularityCaps,
}

impl MultiFactorScorer {
    /// Create a scorer. Weights are validated (each in [0, 1]) and the four
    /// positive factors normalized to sum 1.0; invalid weights or caps are
    /// rejected here rather than clamped.
    pub fn new(weights: PreferenceWeights, caps: PopularityCaps) -> Result<Self> {
        caps.validate()?;
        let weights = weights.into_normalized()?;
        Ok(Self { weights, caps })
    }

    pub fn weights(&self) -> &PreferenceWeights {
        &self.weights
    }

    /// Replace the scoring weights. Validation happens before any state
    /// changes; on error the previous weights stay in effect.
    pub fn set_weights(&mut self, weights: PreferenceWeights) -> Result<()> {
        self.weights = weights.into_normalized()?;
        Ok(())
    }

    /// Score a single candidate against the viewer and their follow graph.
    pub fn score(&self, post: &Post, viewer: &Viewer, graph: &EngagementGraph) -> ScoringExplanation {
        self.score_at(post, viewer, graph, Utc::now())
    }

    /// Score a batch of candidates and sort by total score descending.
    pub fn score_batch(
        &self,
        candidates: Vec<Post>,
        viewer: &Viewer,
        graph: &EngagementGraph,
    ) -> Vec<ScoredPost> {
        let now = Utc::now();

        debug!(
            viewer_id = %viewer.user_id,
            candidate_count = candidates.len(),
            "Scoring candidates"
        );

        let mut scored: Vec<ScoredPost> = candidates
            .into_iter()
            .map(|post| {
                let explanation = self.score_at(&post, viewer, graph, now);
                ScoredPost { post, explanation }
            })
            .collect();

        // Sort by score descending
        // Note: NaN scores are treated as less than any valid score
        scored.sort_by(|a, b| {
            b.explanation
                .total_score
                .partial_cmp(&a.explanation.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            viewer_id = %viewer.user_id,
            scored_count = scored.len(),
            top_score = scored.first().map(|s| s.explanation.total_score),
            "Scoring complete"
        );

        scored
    }

    /// Score at a fixed evaluation instant.
    pub(crate) fn score_at(
        &self,
        post: &Post,
        viewer: &Viewer,
        graph: &EngagementGraph,
        now: DateTime<Utc>,
    ) -> ScoringExplanation {
        let recency_score = self.recency_score(post, now);
        let popularity_score = self.popularity_score(post);
        let quality_score = post.quality_score;
        let topic_relevance_score = self.topic_relevance_score(post, viewer);
        let diversity_penalty = self.diversity_penalty(post, graph);

        let total_score = (self.weights.recency * recency_score
            + self.weights.popularity * popularity_score
            + self.weights.quality * quality_score
            + self.weights.topic_relevance * topic_relevance_score
            - self.weights.diversity * diversity_penalty)
            .clamp(0.0, 1.0);

        let key_factors = self.explanation_factors(
            post,
            viewer,
            graph,
            recency_score,
            popularity_score,
            quality_score,
            topic_relevance_score,
        );

        ScoringExplanation {
            post_id: post.post_id,
            total_score,
            recency_score,
            recency_weight: self.weights.recency,
            popularity_score,
            popularity_weight: self.weights.popularity,
            quality_score,
            quality_weight: self.weights.quality,
            topic_relevance_score,
            topic_relevance_weight: self.weights.topic_relevance,
            diversity_penalty,
            key_factors,
        }
    }

    /// Exponential decay over age with a 24-hour half-life.
    fn recency_score(&self, post: &Post, now: DateTime<Utc>) -> f32 {
        let age_seconds = (now - post.created_at).num_seconds().max(0);
        let age_hours = age_seconds as f32 / 3600.0;
        utils::exponential_decay(age_hours, RECENCY_HALF_LIFE_HOURS).min(1.0)
    }

    /// Weighted sum of engagement counters, each normalized by its cap.
    fn popularity_score(&self, post: &Post) -> f32 {
        let normalized_likes = (post.likes as f32 / self.caps.likes as f32).min(1.0);
        let normalized_reposts = (post.reposts as f32 / self.caps.reposts as f32).min(1.0);
        let normalized_replies = (post.replies as f32 / self.caps.replies as f32).min(1.0);
        let normalized_bookmarks = (post.bookmarks as f32 / self.caps.bookmarks as f32).min(1.0);

        let (w_likes, w_reposts, w_replies, w_bookmarks) = POPULARITY_MIX;

        (w_likes * normalized_likes
            + w_reposts * normalized_reposts
            + w_replies * normalized_replies
            + w_bookmarks * normalized_bookmarks)
            .min(1.0)
    }

    /// Jaccard similarity to viewer interests blended with expertise overlap.
    /// Neutral 0.5 when the post has no topics or the viewer no interests.
    fn topic_relevance_score(&self, post: &Post, viewer: &Viewer) -> f32 {
        let topics: HashSet<&str> = post.topics.iter().map(String::as_str).collect();
        let interests: HashSet<&str> = viewer.interests.iter().map(String::as_str).collect();

        if topics.is_empty() || interests.is_empty() {
            return NEUTRAL_RELEVANCE;
        }

        let jaccard = utils::jaccard(&interests, &topics);

        let expertise: HashSet<&str> = viewer.expertise_areas.iter().map(String::as_str).collect();
        let expertise_match =
            expertise.intersection(&topics).count() as f32 / expertise.len().max(1) as f32;

        (RELEVANCE_JACCARD_WEIGHT * jaccard + RELEVANCE_EXPERTISE_WEIGHT * expertise_match).min(1.0)
    }

    /// Anti-clustering signal: no penalty for followed authors, a flat one
    /// for everyone else. Distinct from the structural diversity caps.
    fn diversity_penalty(&self, post: &Post, graph: &EngagementGraph) -> f32 {
        if graph.following.contains(&post.author_id) {
            0.0
        } else {
            UNFOLLOWED_AUTHOR_PENALTY
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn explanation_factors(
        &self,
        post: &Post,
        viewer: &Viewer,
        graph: &EngagementGraph,
        recency_score: f32,
        popularity_score: f32,
        quality_score: f32,
        topic_relevance_score: f32,
    ) -> Vec<String> {
        let mut factors = Vec::new();

        if recency_score > 0.8 {
            factors.push("Very recent and fresh content".to_string());
        } else if recency_score > 0.5 {
            factors.push("Recent content".to_string());
        }

        if popularity_score > 0.8 {
            factors.push("Highly engaging content (high likes/reposts)".to_string());
        } else if popularity_score > 0.5 {
            factors.push("Well-engaged content".to_string());
        }

        if quality_score > 0.8 {
            factors.push("High content quality signal".to_string());
        } else if quality_score > 0.6 {
            factors.push("Good content quality".to_string());
        }

        if topic_relevance_score > 0.8 {
            factors.push(format!(
                "Strong match to your interests: {}",
                post.topics.join(", ")
            ));
        } else if topic_relevance_score > 0.5 {
            factors.push(format!(
                "Relevant to your interests: {}",
                post.topics.join(", ")
            ));
        }

        if graph.following.contains(&post.author_id) {
            factors.push("From an account you follow".to_string());
        }

        if post.in_reply_to_user_id == Some(viewer.user_id) {
            factors.push("Reply to your post".to_string());
        } else if post.mentions.iter().any(|m| m == &viewer.username) {
            factors.push("Mentions your account".to_string());
        }

        if factors.is_empty() {
            factors.push("Balanced content recommendation".to_string());
        }

        factors
    }
}
