use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankingError>;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<envy::Error> for RankingError {
    fn from(err: envy::Error) -> Self {
        RankingError::InvalidConfiguration(err.to_string())
    }
}
