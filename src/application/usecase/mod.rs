// src/application/usecase/mod.rs
pub mod conditional_orders;
pub mod rule_engine;

// Re-export public API
pub use conditional_orders::{ConditionalOrderEngine, ConditionalOrderUseCase, OrderPassSummary};
pub use rule_engine::{RuleEngine, RuleEvaluationUseCase, RulePassSummary};

use crate::domain::errors::{DispatchError, DispatchResult};
use crate::domain::models::{ActionType, DispatchOutcome};
use crate::domain::service::ActionDispatcher;
use tokio::time::Duration;

/// Dispatch with a hard upper bound. A dispatcher that never answers is
/// converted into a failure instead of wedging the evaluation pass.
pub(crate) async fn dispatch_bounded(
    dispatcher: &dyn ActionDispatcher,
    action: ActionType,
    params: &serde_json::Value,
    timeout: Duration,
) -> DispatchResult<DispatchOutcome> {
    match tokio::time::timeout(timeout, dispatcher.dispatch(action, params)).await {
        Ok(result) => result,
        Err(_) => Err(DispatchError::Timeout(timeout.as_secs())),
    }
}
