// src/infrastructure/dispatch/mod.rs
// Simulated action dispatcher. Stands in for the order-placement and
// alerting backends behind the ActionDispatcher port; every call is
// acknowledged and logged.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::errors::DispatchResult;
use crate::domain::models::{ActionType, DispatchOutcome};
use crate::domain::service::ActionDispatcher;

pub struct SimulatedDispatcher {
    sequence: AtomicU64,
}

impl SimulatedDispatcher {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for SimulatedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionDispatcher for SimulatedDispatcher {
    async fn dispatch(
        &self,
        action: ActionType,
        params: &serde_json::Value,
    ) -> DispatchResult<DispatchOutcome> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("dispatching {} #{}: {}", action, sequence, params);

        let order_id = match action {
            ActionType::PlaceOrder => Some(format!("SIM-{:06}", sequence)),
            _ => None,
        };
        Ok(DispatchOutcome {
            success: true,
            order_id,
            payload: Some(json!({"acknowledged": true, "sequence": sequence})),
        })
    }
}
