use crate::error::{RankingError, Result};
use crate::services::exploration::ExplorationStrategy;
use serde::Deserialize;

/// Core ranking configuration.
///
/// Every section validates at assignment time; out-of-range values are
/// rejected with `InvalidConfiguration` before any state changes.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub diversity: DiversityConfig,
    pub exploration: ExplorationConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringConfig {
    pub popularity_caps: PopularityCaps,
}

/// Normalization caps for the popularity factor. A counter at or above its
/// cap contributes its full sub-weight.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PopularityCaps {
    pub likes: u32,
    pub reposts: u32,
    pub replies: u32,
    pub bookmarks: u32,
}

impl Default for PopularityCaps {
    fn default() -> Self {
        Self {
            likes: 10_000,
            reposts: 2_000,
            replies: 500,
            bookmarks: 1_000,
        }
    }
}

impl PopularityCaps {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("likes", self.likes),
            ("reposts", self.reposts),
            ("replies", self.replies),
            ("bookmarks", self.bookmarks),
        ] {
            if value == 0 {
                return Err(RankingError::InvalidConfiguration(format!(
                    "popularity cap '{}' must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Structural diversity caps applied after score-sorting.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DiversityConfig {
    pub max_per_author: usize,
    pub max_per_topic: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            max_per_author: 3,
            max_per_topic: 5,
        }
    }
}

impl DiversityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_per_author == 0 {
            return Err(RankingError::InvalidConfiguration(
                "max_per_author must be positive".to_string(),
            ));
        }
        if self.max_per_topic == 0 {
            return Err(RankingError::InvalidConfiguration(
                "max_per_topic must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExplorationConfig {
    pub enabled: bool,
    /// Fraction of the feed reserved for exploration (0-1).
    pub exploration_rate: f64,
    pub strategy: ExplorationStrategy,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exploration_rate: 0.10,
            strategy: ExplorationStrategy::EpsilonGreedy,
        }
    }
}

impl ExplorationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(RankingError::InvalidConfiguration(format!(
                "exploration_rate must be in [0, 1], got {}",
                self.exploration_rate
            )));
        }
        Ok(())
    }
}

/// Flat environment view of the config, `FEED_RANKING_` prefixed.
#[derive(Debug, Deserialize)]
struct RawConfig {
    max_likes: Option<u32>,
    max_reposts: Option<u32>,
    max_replies: Option<u32>,
    max_bookmarks: Option<u32>,
    max_per_author: Option<usize>,
    max_per_topic: Option<usize>,
    exploration_enabled: Option<bool>,
    exploration_rate: Option<f64>,
    exploration_strategy: Option<ExplorationStrategy>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.scoring.popularity_caps.validate()?;
        self.diversity.validate()?;
        self.exploration.validate()
    }

    /// Load from `FEED_RANKING_*` environment variables, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let raw: RawConfig = envy::prefixed("FEED_RANKING_").from_env()?;
        let defaults = Config::default();

        let config = Config {
            scoring: ScoringConfig {
                popularity_caps: PopularityCaps {
                    likes: raw
                        .max_likes
                        .unwrap_or(defaults.scoring.popularity_caps.likes),
                    reposts: raw
                        .max_reposts
                        .unwrap_or(defaults.scoring.popularity_caps.reposts),
                    replies: raw
                        .max_replies
                        .unwrap_or(defaults.scoring.popularity_caps.replies),
                    bookmarks: raw
                        .max_bookmarks
                        .unwrap_or(defaults.scoring.popularity_caps.bookmarks),
                },
            },
            diversity: DiversityConfig {
                max_per_author: raw
                    .max_per_author
                    .unwrap_or(defaults.diversity.max_per_author),
                max_per_topic: raw
                    .max_per_topic
                    .unwrap_or(defaults.diversity.max_per_topic),
            },
            exploration: ExplorationConfig {
                enabled: raw
                    .exploration_enabled
                    .unwrap_or(defaults.exploration.enabled),
                exploration_rate: raw
                    .exploration_rate
                    .unwrap_or(defaults.exploration.exploration_rate),
                strategy: raw
                    .exploration_strategy
                    .unwrap_or(defaults.exploration.strategy),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scoring.popularity_caps.likes, 10_000);
        assert_eq!(config.diversity.max_per_author, 3);
        assert_eq!(config.diversity.max_per_topic, 5);
        assert!(config.exploration.enabled);
        assert!((config.exploration.exploration_rate - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_exploration_rate_out_of_range_rejected() {
        let config = ExplorationConfig {
            exploration_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RankingError::InvalidConfiguration(_))
        ));

        let config = ExplorationConfig {
            exploration_rate: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides_and_defaults() {
        std::env::set_var("FEED_RANKING_MAX_PER_AUTHOR", "4");
        std::env::set_var("FEED_RANKING_EXPLORATION_STRATEGY", "ucb");

        let config = Config::from_env().unwrap();
        assert_eq!(config.diversity.max_per_author, 4);
        assert_eq!(config.exploration.strategy, ExplorationStrategy::Ucb);
        // Unset sections keep their defaults
        assert_eq!(config.scoring.popularity_caps.likes, 10_000);

        std::env::set_var("FEED_RANKING_EXPLORATION_RATE", "2.0");
        assert!(Config::from_env().is_err());

        std::env::remove_var("FEED_RANKING_MAX_PER_AUTHOR");
        std::env::remove_var("FEED_RANKING_EXPLORATION_STRATEGY");
        std::env::remove_var("FEED_RANKING_EXPLORATION_RATE");
    }

    #[test]
    fn test_zero_caps_rejected() {
        let caps = PopularityCaps {
            likes: 0,
            ..Default::default()
        };
        assert!(caps.validate().is_err());

        let diversity = DiversityConfig {
            max_per_author: 0,
            ..Default::default()
        };
        assert!(diversity.validate().is_err());
    }
}
