pub mod diversity;
pub mod engine;
pub mod exploration;
pub mod scoring;

pub use diversity::DiversityLayer;
pub use engine::{CandidateFilter, RankedFeed, RankingEngine};
pub use exploration::{AuthorStatsStore, ExplorationLayer, ExplorationStrategy};
pub use scoring::MultiFactorScorer;
