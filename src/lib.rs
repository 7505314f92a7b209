pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{RankingError, Result};
pub use models::{
    EngagementGraph, EngagementKind, Post, PreferenceWeights, RankedPost, ScoringExplanation,
    Viewer,
};
pub use services::exploration::{
    AuthorStatsSnapshot, EngagementRecord, ExplorationDecision, ExplorationSummary, SelectionKind,
};
pub use services::{
    AuthorStatsStore, CandidateFilter, DiversityLayer, ExplorationLayer, ExplorationStrategy,
    MultiFactorScorer, RankedFeed, RankingEngine,
};
