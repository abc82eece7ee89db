// src/domain/service/mod.rs
// External collaborator interfaces consumed by the evaluation engines.

use async_trait::async_trait;

use crate::domain::errors::{DispatchResult, MarketDataResult};
use crate::domain::models::{ActionType, DispatchOutcome, MarketQuote, MarketType};

/// Market data feed. May fail or go stale; callers treat a missing quote
/// as "condition not satisfied", never as a fatal error.
#[async_trait]
pub trait MarketDataService: Send + Sync {
    async fn current_quote(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> MarketDataResult<MarketQuote>;
}

/// Side-effect sink for fired rules and triggered orders: order placement,
/// alerting, cancellation. Implementations must be safe to retry.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        action: ActionType,
        params: &serde_json::Value,
    ) -> DispatchResult<DispatchOutcome>;
}
