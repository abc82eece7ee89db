// src/application/usecase/rule_engine.rs
// Evaluation pass over the persisted automation rules. Invoked by the
// external scheduler on every market-data tick.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::application::usecase::dispatch_bounded;
use crate::domain::condition::EvalContext;
use crate::domain::errors::EngineResult;
use crate::domain::models::{MarketQuote, MarketType};
use crate::domain::price_limits::PriceLimitRegistry;
use crate::domain::repository::RuleRepository;
use crate::domain::rule::{RuleExecution, TradingRule};
use crate::domain::service::{ActionDispatcher, MarketDataService};

/// Counters for one rule pass, surfaced to the caller and the dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RulePassSummary {
    /// Rules whose condition tree was evaluated.
    pub evaluated: usize,
    /// Rules gated by rate limits/status or out of scope.
    pub skipped: usize,
    /// Rules whose condition held and reached dispatch.
    pub fired: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[async_trait]
pub trait RuleEvaluationUseCase {
    /// Evaluate every active rule against the current quote for one
    /// (province, market type) feed.
    async fn evaluate_rules(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> EngineResult<RulePassSummary>;
}

pub struct RuleEngine {
    rules: Arc<dyn RuleRepository>,
    market_data: Arc<dyn MarketDataService>,
    dispatcher: Arc<dyn ActionDispatcher>,
    price_limits: Arc<PriceLimitRegistry>,
    dispatch_timeout: Duration,
    // Serializes passes: two concurrent passes could double-fire a rule
    // inside one min-interval window.
    pass_lock: Mutex<()>,
}

impl RuleEngine {
    pub fn new(
        rules: Arc<dyn RuleRepository>,
        market_data: Arc<dyn MarketDataService>,
        dispatcher: Arc<dyn ActionDispatcher>,
        price_limits: Arc<PriceLimitRegistry>,
    ) -> Self {
        Self {
            rules,
            market_data,
            dispatcher,
            price_limits,
            dispatch_timeout: Duration::from_secs(5),
            pass_lock: Mutex::new(()),
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Pass entry point with an explicit clock, used by the scheduler
    /// wrapper below and directly by tests.
    pub async fn evaluate_rules_at(
        &self,
        province: &str,
        market_type: MarketType,
        now: DateTime<Utc>,
    ) -> EngineResult<RulePassSummary> {
        let _pass = self.pass_lock.lock().await;
        let mut summary = RulePassSummary::default();

        let quote = match self.market_data.current_quote(province, market_type).await {
            Ok(quote) => quote,
            Err(e) => {
                // A missing feed satisfies no condition; the pass simply
                // yields nothing instead of failing.
                log::warn!("no quote for {} {}: {}", province, market_type, e);
                return Ok(summary);
            }
        };

        let mut rules = self.rules.active_rules().await?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        let base_context = self.build_context(&quote);

        for rule in rules {
            if !rule.can_execute(now) || !rule.matches_scope(province, market_type) {
                summary.skipped += 1;
                continue;
            }
            self.evaluate_one(&rule, &quote, &base_context, now, &mut summary)
                .await;
        }

        log::debug!(
            "rule pass for {} {}: {} evaluated, {} fired, {} failed",
            province,
            market_type,
            summary.evaluated,
            summary.fired,
            summary.failed
        );
        Ok(summary)
    }

    /// Evaluate and, when the condition holds, dispatch and record. All
    /// failures are contained here so one rule cannot abort the pass.
    async fn evaluate_one(
        &self,
        rule: &TradingRule,
        quote: &MarketQuote,
        base_context: &EvalContext,
        now: DateTime<Utc>,
        summary: &mut RulePassSummary,
    ) {
        let mut ctx = base_context.clone();
        for (field, value) in &rule.condition_params {
            ctx.set(field.clone(), value.clone());
        }

        let (satisfied, condition_results) = rule.condition.evaluate_with_trace(&ctx);
        summary.evaluated += 1;
        if !satisfied {
            return;
        }
        summary.fired += 1;

        let outcome = dispatch_bounded(
            self.dispatcher.as_ref(),
            rule.action,
            &rule.action_params,
            self.dispatch_timeout,
        )
        .await;

        let (success, action_result, error_message) = match outcome {
            Ok(outcome) if outcome.success => (true, outcome.payload, None),
            Ok(_) => (
                false,
                None,
                Some("dispatcher reported failure".to_string()),
            ),
            Err(e) => (false, None, Some(e.to_string())),
        };

        let execution = RuleExecution {
            id: 0,
            rule_id: rule.id,
            executed_at: now,
            success,
            action_result,
            error_message: error_message.clone(),
            condition_results,
            trigger_data: quote.clone(),
        };
        if let Err(e) = self.rules.record_execution(execution).await {
            log::error!("failed to record execution for rule {}: {}", rule.id, e);
        }

        if success {
            if let Err(e) = self.rules.record_success(rule.id, now).await {
                log::error!("failed to bump counters for rule {}: {}", rule.id, e);
            }
            summary.succeeded += 1;
            log::info!("rule {} ({}) dispatched {}", rule.id, rule.name, rule.action);
        } else {
            // No in-pass retry; the rule stays eligible for the next tick.
            summary.failed += 1;
            log::warn!(
                "rule {} ({}) dispatch failed: {}",
                rule.id,
                rule.name,
                error_message.unwrap_or_default()
            );
        }
    }

    fn build_context(&self, quote: &MarketQuote) -> EvalContext {
        let mut ctx = EvalContext::new()
            .with("province", quote.province.as_str())
            .with("market_type", quote.market_type.as_str())
            .with("price", quote.price)
            .with("volume", quote.volume)
            .with("hour", Decimal::from(quote.timestamp.hour()));

        let base = self.price_limits.base_price(&quote.province);
        if base > Decimal::ZERO {
            ctx.set("change_pct", ((quote.price - base) / base) * dec!(100));
        }
        ctx
    }
}

#[async_trait]
impl RuleEvaluationUseCase for RuleEngine {
    async fn evaluate_rules(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> EngineResult<RulePassSummary> {
        self.evaluate_rules_at(province, market_type, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{CompareOp, Condition};
    use crate::domain::errors::{DispatchError, DispatchResult};
    use crate::domain::models::{ActionType, DispatchOutcome};
    use crate::domain::rule::RuleStatus;
    use crate::infrastructure::market::InMemoryQuoteStore;
    use crate::infrastructure::persistence::InMemoryRuleStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    /// Dispatcher that records every call and fails when the params carry
    /// a "boom" key.
    struct RecordingDispatcher {
        calls: Mutex<Vec<(ActionType, serde_json::Value)>>,
    }

    impl RecordingDispatcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        async fn calls(&self) -> Vec<(ActionType, serde_json::Value)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ActionDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            action: ActionType,
            params: &serde_json::Value,
        ) -> DispatchResult<DispatchOutcome> {
            self.calls.lock().await.push((action, params.clone()));
            if params.get("boom").is_some() {
                return Err(DispatchError::Rejected("boom".to_string()));
            }
            Ok(DispatchOutcome {
                success: true,
                order_id: Some("ord-1".to_string()),
                payload: None,
            })
        }
    }

    struct Harness {
        engine: RuleEngine,
        rules: Arc<InMemoryRuleStore>,
        quotes: Arc<InMemoryQuoteStore>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    async fn harness() -> Harness {
        let rules = Arc::new(InMemoryRuleStore::new());
        let quotes = Arc::new(InMemoryQuoteStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        quotes
            .publish(MarketQuote {
                province: "Guangdong".to_string(),
                market_type: MarketType::Spot,
                price: dec!(700),
                volume: dec!(5000),
                timestamp: Utc::now(),
            })
            .await;
        let engine = RuleEngine::new(
            rules.clone(),
            quotes.clone(),
            dispatcher.clone(),
            Arc::new(PriceLimitRegistry::with_builtin()),
        );
        Harness {
            engine,
            rules,
            quotes,
            dispatcher,
        }
    }

    fn price_alert(name: &str, threshold: Decimal) -> TradingRule {
        let mut rule = TradingRule::new(
            "trader-1",
            name,
            Condition::compare("price", CompareOp::Gt, threshold),
            ActionType::SendAlert,
        );
        rule.status = RuleStatus::Active;
        rule.min_interval_secs = 0;
        rule
    }

    #[tokio::test]
    async fn firing_rule_dispatches_and_records() {
        let h = harness().await;
        let id = h.rules.insert_rule(price_alert("alert", dec!(600))).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.fired, 1);
        assert_eq!(summary.succeeded, 1);

        let executions = h.rules.executions_for_rule(id).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert!(executions[0].success);
        assert_eq!(executions[0].trigger_data.price, dec!(700));
        assert!(!executions[0].condition_results.is_empty());

        let rule = h.rules.rule(id).await.unwrap().unwrap();
        assert_eq!(rule.execution_count, 1);
        assert_eq!(rule.today_execution_count, 1);
        assert!(rule.last_executed_at.is_some());
    }

    #[tokio::test]
    async fn daily_cap_prevents_second_execution_same_day() {
        let h = harness().await;
        let mut rule = price_alert("one shot per day", dec!(600));
        rule.max_executions_per_day = 1;
        let id = h.rules.insert_rule(rule).await.unwrap();

        let now = Utc::now();
        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, now)
            .await
            .unwrap();
        // condition still true one second later, same day
        let second = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, now + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(second.skipped, 1);
        assert_eq!(second.fired, 0);
        assert_eq!(h.rules.executions_for_rule(id).await.unwrap().len(), 1);
        assert_eq!(h.dispatcher.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn min_interval_gates_until_elapsed() {
        let h = harness().await;
        let mut rule = price_alert("rate limited", dec!(600));
        rule.min_interval_secs = 60;
        let id = h.rules.insert_rule(rule).await.unwrap();

        let now = Utc::now();
        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, now)
            .await
            .unwrap();
        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, now + chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(h.rules.executions_for_rule(id).await.unwrap().len(), 1);

        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, now + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(h.rules.executions_for_rule(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rules_run_in_priority_order_with_id_tiebreak() {
        let h = harness().await;
        let mut low = price_alert("low", dec!(600));
        low.priority = 1;
        low.action_params = json!({"tag": "low"});
        let mut high = price_alert("high", dec!(600));
        high.priority = 5;
        high.action_params = json!({"tag": "high"});
        let mut tie = price_alert("tie", dec!(600));
        tie.priority = 5;
        tie.action_params = json!({"tag": "tie"});

        // insertion order: low, high, tie -> ids ascending
        h.rules.insert_rule(low).await.unwrap();
        h.rules.insert_rule(high).await.unwrap();
        h.rules.insert_rule(tie).await.unwrap();

        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        let tags: Vec<String> = h
            .dispatcher
            .calls()
            .await
            .iter()
            .map(|(_, params)| params["tag"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(tags, vec!["high", "tie", "low"]);
    }

    #[tokio::test]
    async fn scope_filter_skips_other_markets() {
        let h = harness().await;
        let mut rule = price_alert("shandong only", dec!(0));
        rule.provinces = vec!["Shandong".to_string()];
        let id = h.rules.insert_rule(rule).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.evaluated, 0);
        assert!(h.rules.executions_for_rule(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn false_condition_leaves_no_record() {
        let h = harness().await;
        let id = h.rules.insert_rule(price_alert("far away", dec!(10000))).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.fired, 0);
        assert!(h.rules.executions_for_rule(id).await.unwrap().is_empty());
        assert!(h.dispatcher.calls().await.is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_is_recorded_and_keeps_rule_eligible() {
        let h = harness().await;
        let mut rule = price_alert("failing", dec!(600));
        rule.action_params = json!({"boom": true});
        let id = h.rules.insert_rule(rule).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.fired, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 0);

        let executions = h.rules.executions_for_rule(id).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert!(!executions[0].success);
        assert!(executions[0].error_message.is_some());

        // counters untouched, so the next tick may retry
        let rule = h.rules.rule(id).await.unwrap().unwrap();
        assert_eq!(rule.execution_count, 0);
        assert!(rule.last_executed_at.is_none());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_pass() {
        let h = harness().await;
        let mut failing = price_alert("failing", dec!(600));
        failing.priority = 10;
        failing.action_params = json!({"boom": true});
        h.rules.insert_rule(failing).await.unwrap();
        let ok_id = h.rules.insert_rule(price_alert("fine", dec!(600))).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.fired, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(h.rules.executions_for_rule(ok_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_quote_satisfies_nothing() {
        let h = harness().await;
        h.rules.insert_rule(price_alert("alert", dec!(0))).await.unwrap();

        let summary = h
            .engine
            .evaluate_rules_at("Shanxi", MarketType::Spot, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary, RulePassSummary::default());
        assert!(h.dispatcher.calls().await.is_empty());
    }

    #[tokio::test]
    async fn pass_reads_the_latest_quote() {
        let h = harness().await;
        let id = h.rules.insert_rule(price_alert("alert", dec!(800))).await.unwrap();

        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();
        assert!(h.rules.executions_for_rule(id).await.unwrap().is_empty());

        h.quotes
            .publish(MarketQuote {
                province: "Guangdong".to_string(),
                market_type: MarketType::Spot,
                price: dec!(900),
                volume: dec!(5000),
                timestamp: Utc::now(),
            })
            .await;
        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();
        assert_eq!(h.rules.executions_for_rule(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn condition_params_overlay_the_context() {
        let h = harness().await;
        let mut rule = price_alert("threshold from params", dec!(600));
        rule.condition = Condition::compare("price", CompareOp::Gt, dec!(600));
        rule.condition_params
            .insert("price".to_string(), dec!(100).into());
        let id = h.rules.insert_rule(rule).await.unwrap();

        // overlay pins price to 100, so the condition is false despite the
        // 700 quote
        let summary = h
            .engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();
        assert_eq!(summary.evaluated, 1);
        assert!(h.rules.executions_for_rule(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn change_pct_context_uses_province_base_price() {
        let h = harness().await;
        // quote 700 vs Guangdong base 463 -> +51.2%
        let mut rule = price_alert("big move", dec!(0));
        rule.condition = Condition::compare("change_pct", CompareOp::Gt, dec!(50));
        let id = h.rules.insert_rule(rule).await.unwrap();

        h.engine
            .evaluate_rules_at("Guangdong", MarketType::Spot, Utc::now())
            .await
            .unwrap();
        assert_eq!(h.rules.executions_for_rule(id).await.unwrap().len(), 1);
    }
}
