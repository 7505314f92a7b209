use crate::error::{RankingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Tolerance for the positive-factor weight sum after normalization.
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// A candidate post eligible for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,

    // Engagement counters
    pub likes: u32,
    pub reposts: u32,
    pub replies: u32,
    pub bookmarks: u32,

    /// Content quality signal (0-1)
    pub quality_score: f32,
    pub topics: Vec<String>,

    // Conversation context
    pub in_reply_to_user_id: Option<Uuid>,
    pub mentions: Vec<String>,
}

/// The user a feed is personalized for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: Uuid,
    pub username: String,
    pub interests: Vec<String>,
    pub expertise_areas: Vec<String>,
    pub preference_weights: PreferenceWeights,
}

/// Viewer's follow graph, read-only input to scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementGraph {
    pub user_id: Uuid,
    pub following: HashSet<Uuid>,
    pub followers: HashSet<Uuid>,
}

impl EngagementGraph {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

/// Per-factor scoring weights.
///
/// The four positive factors (recency, popularity, quality, topic_relevance)
/// are normalized to sum to 1.0; the diversity weight is a separate
/// subtractive penalty and stays outside that sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferenceWeights {
    pub recency: f32,
    pub popularity: f32,
    pub quality: f32,
    pub topic_relevance: f32,
    pub diversity: f32,
}

impl Default for PreferenceWeights {
    fn default() -> Self {
        Self {
            recency: 0.2,
            popularity: 0.25,
            quality: 0.2,
            topic_relevance: 0.25,
            diversity: 0.1,
        }
    }
}

impl PreferenceWeights {
    /// Sum of the four positive factors (the diversity penalty is excluded).
    pub fn positive_sum(&self) -> f32 {
        self.recency + self.popularity + self.quality + self.topic_relevance
    }

    /// Reject any weight outside [0, 1] and a zero positive-factor mass.
    /// Values are never silently clamped.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("recency", self.recency),
            ("popularity", self.popularity),
            ("quality", self.quality),
            ("topic_relevance", self.topic_relevance),
            ("diversity", self.diversity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RankingError::InvalidConfiguration(format!(
                    "weight '{}' must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.positive_sum() <= 0.0 {
            return Err(RankingError::InvalidConfiguration(
                "positive-factor weights must not all be zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Rescale the four positive factors to sum to 1.0 when the current sum
    /// is off by more than the tolerance.
    pub fn normalize(&mut self) {
        let total = self.positive_sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            self.recency /= total;
            self.popularity /= total;
            self.quality /= total;
            self.topic_relevance /= total;
        }
    }

    pub fn into_normalized(self) -> Result<Self> {
        self.validate()?;
        let mut weights = self;
        weights.normalize();
        Ok(weights)
    }
}

/// Why a post was ranked where it was. Immutable once produced, one per
/// ranked item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringExplanation {
    pub post_id: Uuid,
    pub total_score: f32,

    pub recency_score: f32,
    pub recency_weight: f32,

    pub popularity_score: f32,
    pub popularity_weight: f32,

    pub quality_score: f32,
    pub quality_weight: f32,

    pub topic_relevance_score: f32,
    pub topic_relevance_weight: f32,

    pub diversity_penalty: f32,

    /// Human-readable explanation factors, ordered by component.
    pub key_factors: Vec<String>,
}

/// A scored post before diversity filtering and rank assignment.
#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post: Post,
    pub explanation: ScoringExplanation,
}

/// A post with its explanation and final rank (1-based, assigned after
/// diversity filtering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPost {
    pub post: Post,
    pub explanation: ScoringExplanation,
    pub rank: usize,
}

/// Feedback event kinds. Only the first four count as engagement;
/// a plain view is a negative signal for the bandit layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Like,
    Reply,
    Repost,
    Bookmark,
    View,
}

impl EngagementKind {
    pub fn is_engagement(self) -> bool {
        !matches!(self, EngagementKind::View)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Reply => "reply",
            EngagementKind::Repost => "repost",
            EngagementKind::Bookmark => "bookmark",
            EngagementKind::View => "view",
        }
    }
}
