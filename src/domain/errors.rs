// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Unknown(s)
    }
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("No quote available for {0}")]
    NoQuote(String),

    #[error("Stale quote for {0}")]
    Stale(String),

    #[error("Feed error: {0}")]
    Feed(String),
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Rule not found: {0}")]
    RuleNotFound(i64),

    #[error("Conditional order not found: {0}")]
    OrderNotFound(i64),

    #[error("Conflicting update for {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Action rejected: {0}")]
    Rejected(String),

    #[error("Dispatch timed out after {0}s")]
    Timeout(u64),

    #[error("Dispatcher unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Malformed condition expression: {0}")]
    Malformed(String),

    #[error("Condition parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// Result type aliases for convenience
pub type EngineResult<T> = Result<T, EngineError>;
pub type MarketDataResult<T> = Result<T, MarketDataError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
