// src/domain/conditional_order.rs
// One-shot orders whose placement is deferred until a market condition
// fires. An order leaves Pending exactly once and is never re-armed.

use crate::domain::condition::{Condition, EvalContext};
use crate::domain::models::{MarketQuote, MarketType, OrderSide, PriceType};
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionalOrderStatus {
    Pending,
    Triggered,
    Executed,
    Cancelled,
    Expired,
    Failed,
}

impl ConditionalOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionalOrderStatus::Pending => "PENDING",
            ConditionalOrderStatus::Triggered => "TRIGGERED",
            ConditionalOrderStatus::Executed => "EXECUTED",
            ConditionalOrderStatus::Cancelled => "CANCELLED",
            ConditionalOrderStatus::Expired => "EXPIRED",
            ConditionalOrderStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConditionalOrderStatus::Executed
                | ConditionalOrderStatus::Cancelled
                | ConditionalOrderStatus::Expired
                | ConditionalOrderStatus::Failed
        )
    }
}

impl fmt::Display for ConditionalOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerConditionType {
    PriceAbove,
    PriceBelow,
    PriceChangePct,
    TimeTrigger,
    VolumeAbove,
    Indicator,
}

impl TriggerConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerConditionType::PriceAbove => "PRICE_ABOVE",
            TriggerConditionType::PriceBelow => "PRICE_BELOW",
            TriggerConditionType::PriceChangePct => "PRICE_CHANGE_PCT",
            TriggerConditionType::TimeTrigger => "TIME_TRIGGER",
            TriggerConditionType::VolumeAbove => "VOLUME_ABOVE",
            TriggerConditionType::Indicator => "INDICATOR",
        }
    }
}

impl fmt::Display for TriggerConditionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOrder {
    pub id: i64,
    pub owner: String,
    pub condition_type: TriggerConditionType,
    pub province: String,
    pub market_type: MarketType,

    pub trigger_price: Option<Decimal>,
    pub trigger_change_pct: Option<Decimal>,
    /// Baseline for PriceChangePct, snapshotted at order creation. The
    /// condition cannot fire while this is unset.
    pub reference_price: Option<Decimal>,
    pub trigger_time: Option<DateTime<Utc>>,
    pub trigger_volume: Option<Decimal>,
    /// Indicator-style trigger expression, evaluated against the quote.
    pub indicator_condition: Option<Condition>,

    pub side: OrderSide,
    pub quantity: Decimal,
    pub price_type: PriceType,

    pub status: ConditionalOrderStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub enabled: bool,

    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_price: Option<Decimal>,
    pub executed_order_id: Option<String>,
    pub execution_result: Option<serde_json::Value>,
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConditionalOrder {
    pub fn new(
        owner: impl Into<String>,
        condition_type: TriggerConditionType,
        province: impl Into<String>,
        market_type: MarketType,
        side: OrderSide,
        quantity: Decimal,
        price_type: PriceType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            owner: owner.into(),
            condition_type,
            province: province.into(),
            market_type,
            trigger_price: None,
            trigger_change_pct: None,
            reference_price: None,
            trigger_time: None,
            trigger_volume: None,
            indicator_condition: None,
            side,
            quantity,
            price_type,
            status: ConditionalOrderStatus::Pending,
            valid_from: None,
            valid_until: None,
            enabled: true,
            triggered_at: None,
            triggered_price: None,
            executed_order_id: None,
            execution_result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_trigger(&self, now: DateTime<Utc>) -> bool {
        self.status == ConditionalOrderStatus::Pending
            && self.enabled
            && self.valid_until.map_or(true, |until| now <= until)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(false, |until| now > until)
    }

    /// Pure trigger check against the current quote. Missing trigger
    /// parameters make the condition unsatisfiable rather than an error.
    pub fn condition_satisfied(&self, quote: &MarketQuote, now: DateTime<Utc>) -> bool {
        match self.condition_type {
            TriggerConditionType::PriceAbove => self
                .trigger_price
                .map_or(false, |threshold| quote.price > threshold),
            TriggerConditionType::PriceBelow => self
                .trigger_price
                .map_or(false, |threshold| quote.price < threshold),
            TriggerConditionType::PriceChangePct => {
                let (reference, threshold) = match (self.reference_price, self.trigger_change_pct)
                {
                    (Some(reference), Some(threshold)) if reference > Decimal::ZERO => {
                        (reference, threshold)
                    }
                    _ => return false,
                };
                let change = ((quote.price - reference).abs() / reference) * dec!(100);
                change >= threshold
            }
            TriggerConditionType::TimeTrigger => {
                self.trigger_time.map_or(false, |at| now >= at)
            }
            TriggerConditionType::VolumeAbove => self
                .trigger_volume
                .map_or(false, |threshold| quote.volume > threshold),
            TriggerConditionType::Indicator => match &self.indicator_condition {
                Some(condition) => {
                    let ctx = EvalContext::new()
                        .with("price", quote.price)
                        .with("volume", quote.volume)
                        .with("hour", Decimal::from(quote.timestamp.hour()));
                    condition.evaluate(&ctx)
                }
                None => false,
            },
        }
    }

    /// Pending -> Triggered. Returns false when the order already left
    /// Pending; the caller must then skip it.
    pub fn mark_triggered(&mut self, now: DateTime<Utc>, price: Decimal) -> bool {
        if self.status != ConditionalOrderStatus::Pending {
            return false;
        }
        self.status = ConditionalOrderStatus::Triggered;
        self.triggered_at = Some(now);
        self.triggered_price = Some(price);
        self.updated_at = now;
        true
    }

    /// Triggered -> Executed after a successful placement.
    pub fn mark_executed(
        &mut self,
        order_id: Option<String>,
        result: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status != ConditionalOrderStatus::Triggered {
            return false;
        }
        self.status = ConditionalOrderStatus::Executed;
        self.executed_order_id = order_id;
        self.execution_result = result;
        self.updated_at = now;
        true
    }

    /// Triggered -> Failed after a rejected or timed-out placement.
    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.status != ConditionalOrderStatus::Triggered {
            return false;
        }
        self.status = ConditionalOrderStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = now;
        true
    }

    /// Pending -> Expired housekeeping transition.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ConditionalOrderStatus::Pending {
            return false;
        }
        self.status = ConditionalOrderStatus::Expired;
        self.updated_at = now;
        true
    }

    /// Owner-initiated cancel, only meaningful while still Pending.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ConditionalOrderStatus::Pending {
            return false;
        }
        self.status = ConditionalOrderStatus::Cancelled;
        self.updated_at = now;
        true
    }
}

/// Append-only record of one trigger attempt, written once the placement
/// outcome is known and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerLog {
    pub id: i64,
    pub order_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub condition_type: TriggerConditionType,
    pub snapshot: MarketQuote,
    pub order_placed: bool,
    pub success: bool,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quote(price: Decimal, volume: Decimal) -> MarketQuote {
        MarketQuote {
            province: "Guangdong".to_string(),
            market_type: MarketType::Spot,
            price,
            volume,
            timestamp: Utc::now(),
        }
    }

    fn order(condition_type: TriggerConditionType) -> ConditionalOrder {
        ConditionalOrder::new(
            "trader-1",
            condition_type,
            "Guangdong",
            MarketType::Spot,
            OrderSide::Buy,
            dec!(10),
            PriceType::Limit(dec!(500)),
        )
    }

    #[test]
    fn price_above_fires_strictly() {
        let mut o = order(TriggerConditionType::PriceAbove);
        o.trigger_price = Some(dec!(500));
        let now = Utc::now();

        assert!(!o.condition_satisfied(&quote(dec!(500), dec!(100)), now));
        assert!(o.condition_satisfied(&quote(dec!(500.01), dec!(100)), now));
    }

    #[test]
    fn price_below_fires_strictly() {
        let mut o = order(TriggerConditionType::PriceBelow);
        o.trigger_price = Some(dec!(400));
        let now = Utc::now();

        assert!(!o.condition_satisfied(&quote(dec!(400), dec!(100)), now));
        assert!(o.condition_satisfied(&quote(dec!(399.99), dec!(100)), now));
    }

    #[test]
    fn price_change_pct_needs_a_reference() {
        let mut o = order(TriggerConditionType::PriceChangePct);
        o.trigger_change_pct = Some(dec!(10));
        let now = Utc::now();

        // no reference snapshot, never fires
        assert!(!o.condition_satisfied(&quote(dec!(900), dec!(100)), now));

        o.reference_price = Some(dec!(500));
        assert!(!o.condition_satisfied(&quote(dec!(540), dec!(100)), now));
        // 10% move, inclusive threshold
        assert!(o.condition_satisfied(&quote(dec!(550), dec!(100)), now));
        assert!(o.condition_satisfied(&quote(dec!(450), dec!(100)), now));
    }

    #[test]
    fn time_trigger_fires_at_or_after_the_instant() {
        let mut o = order(TriggerConditionType::TimeTrigger);
        let at = Utc::now();
        o.trigger_time = Some(at);

        assert!(!o.condition_satisfied(&quote(dec!(500), dec!(100)), at - Duration::seconds(1)));
        assert!(o.condition_satisfied(&quote(dec!(500), dec!(100)), at));
    }

    #[test]
    fn volume_above_fires_strictly() {
        let mut o = order(TriggerConditionType::VolumeAbove);
        o.trigger_volume = Some(dec!(1000));
        let now = Utc::now();

        assert!(!o.condition_satisfied(&quote(dec!(500), dec!(1000)), now));
        assert!(o.condition_satisfied(&quote(dec!(500), dec!(1001)), now));
    }

    #[test]
    fn indicator_without_expression_never_fires() {
        let o = order(TriggerConditionType::Indicator);
        assert!(!o.condition_satisfied(&quote(dec!(500), dec!(100)), Utc::now()));
    }

    #[test]
    fn indicator_expression_evaluates_against_quote() {
        use crate::domain::condition::CompareOp;

        let mut o = order(TriggerConditionType::Indicator);
        o.indicator_condition = Some(Condition::all(vec![
            Condition::compare("price", CompareOp::Gt, dec!(450)),
            Condition::compare("volume", CompareOp::Ge, dec!(1000)),
        ]));
        let now = Utc::now();

        assert!(o.condition_satisfied(&quote(dec!(500), dec!(1000)), now));
        assert!(!o.condition_satisfied(&quote(dec!(400), dec!(1000)), now));
    }

    #[test]
    fn can_trigger_requires_pending_enabled_and_validity() {
        let now = Utc::now();
        let mut o = order(TriggerConditionType::PriceAbove);
        assert!(o.can_trigger(now));

        o.enabled = false;
        assert!(!o.can_trigger(now));
        o.enabled = true;

        o.valid_until = Some(now - Duration::seconds(1));
        assert!(!o.can_trigger(now));
        assert!(o.is_expired(now));

        o.valid_until = Some(now + Duration::hours(1));
        assert!(o.can_trigger(now));
        assert!(!o.is_expired(now));
    }

    #[test]
    fn one_shot_transitions_are_monotonic() {
        let now = Utc::now();
        let mut o = order(TriggerConditionType::PriceAbove);

        assert!(o.mark_triggered(now, dec!(510)));
        assert_eq!(o.status, ConditionalOrderStatus::Triggered);
        assert!(!o.can_trigger(now));

        // a second trigger attempt must not re-arm it
        assert!(!o.mark_triggered(now, dec!(520)));

        assert!(o.mark_executed(Some("ord-9".to_string()), None, now));
        assert_eq!(o.status, ConditionalOrderStatus::Executed);
        assert!(o.status.is_terminal());

        // terminal states reject every further transition
        assert!(!o.mark_failed("late failure", now));
        assert!(!o.cancel(now));
        assert!(!o.mark_expired(now));
    }

    #[test]
    fn failed_placement_is_terminal() {
        let now = Utc::now();
        let mut o = order(TriggerConditionType::PriceBelow);
        assert!(o.mark_triggered(now, dec!(390)));
        assert!(o.mark_failed("dispatch rejected", now));
        assert_eq!(o.status, ConditionalOrderStatus::Failed);
        assert!(!o.can_trigger(now));
        assert_eq!(o.error_message.as_deref(), Some("dispatch rejected"));
    }

    #[test]
    fn cancel_only_applies_while_pending() {
        let now = Utc::now();
        let mut o = order(TriggerConditionType::PriceAbove);
        assert!(o.cancel(now));
        assert_eq!(o.status, ConditionalOrderStatus::Cancelled);

        let mut o = order(TriggerConditionType::PriceAbove);
        o.mark_triggered(now, dec!(510));
        assert!(!o.cancel(now));
    }
}
