// src/application/usecase/conditional_orders.rs
// Evaluation pass over pending conditional orders: expiry housekeeping,
// trigger checks, and one-shot placement through the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::application::usecase::dispatch_bounded;
use crate::domain::conditional_order::{ConditionalOrder, TriggerLog};
use crate::domain::errors::EngineResult;
use crate::domain::models::{ActionType, MarketQuote, MarketType, PriceType};
use crate::domain::repository::ConditionalOrderRepository;
use crate::domain::service::{ActionDispatcher, MarketDataService};

/// Counters for one conditional-order pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderPassSummary {
    /// Orders in scope whose trigger condition was checked.
    pub checked: usize,
    pub expired: usize,
    pub triggered: usize,
    pub executed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait ConditionalOrderUseCase {
    /// Evaluate every pending order scoped to one (province, market type)
    /// feed against its current quote.
    async fn evaluate_orders(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> EngineResult<OrderPassSummary>;
}

pub struct ConditionalOrderEngine {
    orders: Arc<dyn ConditionalOrderRepository>,
    market_data: Arc<dyn MarketDataService>,
    dispatcher: Arc<dyn ActionDispatcher>,
    dispatch_timeout: Duration,
    // One pass at a time; a concurrent pass could double-trigger an order.
    pass_lock: Mutex<()>,
}

impl ConditionalOrderEngine {
    pub fn new(
        orders: Arc<dyn ConditionalOrderRepository>,
        market_data: Arc<dyn MarketDataService>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            orders,
            market_data,
            dispatcher,
            dispatch_timeout: Duration::from_secs(5),
            pass_lock: Mutex::new(()),
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub async fn evaluate_orders_at(
        &self,
        province: &str,
        market_type: MarketType,
        now: DateTime<Utc>,
    ) -> EngineResult<OrderPassSummary> {
        let _pass = self.pass_lock.lock().await;
        let mut summary = OrderPassSummary::default();

        // Expiry is pure housekeeping and must proceed even when the feed
        // is down, so the quote is optional for the pass.
        let quote = match self.market_data.current_quote(province, market_type).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                log::warn!("no quote for {} {}: {}", province, market_type, e);
                None
            }
        };

        let orders = self.orders.pending_orders().await?;
        for mut order in orders {
            if order.province != province || order.market_type != market_type {
                continue;
            }

            if order.is_expired(now) {
                if order.mark_expired(now) {
                    // not a trigger attempt: no TriggerLog is written
                    if let Err(e) = self.orders.update_order(&order).await {
                        log::error!("failed to expire order {}: {}", order.id, e);
                    } else {
                        summary.expired += 1;
                        log::info!("conditional order {} expired", order.id);
                    }
                }
                continue;
            }
            if !order.can_trigger(now) {
                continue;
            }

            let Some(quote) = quote.as_ref() else {
                continue;
            };
            summary.checked += 1;
            if !order.condition_satisfied(quote, now) {
                continue;
            }

            self.fire(&mut order, quote, now, &mut summary).await;
        }

        log::debug!(
            "order pass for {} {}: {} checked, {} triggered, {} executed, {} failed, {} expired",
            province,
            market_type,
            summary.checked,
            summary.triggered,
            summary.executed,
            summary.failed,
            summary.expired
        );
        Ok(summary)
    }

    /// Trigger the order and attempt placement. The order leaves Pending
    /// here exactly once, whatever the placement outcome.
    async fn fire(
        &self,
        order: &mut ConditionalOrder,
        quote: &MarketQuote,
        now: DateTime<Utc>,
        summary: &mut OrderPassSummary,
    ) {
        if !order.mark_triggered(now, quote.price) {
            return;
        }
        summary.triggered += 1;
        log::info!(
            "conditional order {} ({}) triggered at {}",
            order.id,
            order.condition_type,
            quote.price
        );
        // Persist the Triggered state before placement so a crash between
        // the two never re-arms the order.
        if let Err(e) = self.orders.update_order(order).await {
            log::error!("failed to persist trigger for order {}: {}", order.id, e);
        }

        let params = placement_params(order);
        let outcome = dispatch_bounded(
            self.dispatcher.as_ref(),
            ActionType::PlaceOrder,
            &params,
            self.dispatch_timeout,
        )
        .await;

        let (success, detail) = match outcome {
            Ok(outcome) if outcome.success => {
                order.mark_executed(outcome.order_id.clone(), outcome.payload.clone(), now);
                summary.executed += 1;
                (true, None)
            }
            Ok(_) => {
                let message = "dispatcher reported failure".to_string();
                order.mark_failed(message.clone(), now);
                summary.failed += 1;
                (false, Some(message))
            }
            Err(e) => {
                let message = e.to_string();
                order.mark_failed(message.clone(), now);
                summary.failed += 1;
                (false, Some(message))
            }
        };

        if let Err(e) = self.orders.update_order(order).await {
            log::error!("failed to persist outcome for order {}: {}", order.id, e);
        }
        let log_entry = TriggerLog {
            id: 0,
            order_id: order.id,
            triggered_at: now,
            condition_type: order.condition_type,
            snapshot: quote.clone(),
            order_placed: true,
            success,
            detail,
        };
        if let Err(e) = self.orders.record_trigger(log_entry).await {
            log::error!("failed to record trigger for order {}: {}", order.id, e);
        }
    }
}

/// Placement payload handed to the external dispatcher.
fn placement_params(order: &ConditionalOrder) -> serde_json::Value {
    json!({
        "conditional_order_id": order.id,
        "owner": order.owner,
        "province": order.province,
        "market_type": order.market_type.as_str(),
        "side": order.side.as_str(),
        "quantity": order.quantity,
        "price_type": match order.price_type {
            PriceType::Market => json!("MARKET"),
            PriceType::Limit(price) => json!({"limit": price}),
        },
    })
}

#[async_trait]
impl ConditionalOrderUseCase for ConditionalOrderEngine {
    async fn evaluate_orders(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> EngineResult<OrderPassSummary> {
        self.evaluate_orders_at(province, market_type, Utc::now()).await
    }
}
