// src/infrastructure/persistence/mod.rs
// In-memory repositories backing the engines in the demo binary and the
// tests. A database-backed store slots in behind the same traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::conditional_order::{ConditionalOrder, ConditionalOrderStatus, TriggerLog};
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::repository::{ConditionalOrderRepository, RuleRepository};
use crate::domain::rule::{RuleExecution, RuleStatus, TradingRule};

#[derive(Default)]
struct RuleTables {
    rules: HashMap<i64, TradingRule>,
    executions: Vec<RuleExecution>,
    next_rule_id: i64,
    next_execution_id: i64,
}

pub struct InMemoryRuleStore {
    inner: RwLock<RuleTables>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RuleTables::default()),
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleStore {
    async fn insert_rule(&self, mut rule: TradingRule) -> RepositoryResult<i64> {
        let mut tables = self.inner.write().await;
        tables.next_rule_id += 1;
        rule.id = tables.next_rule_id;
        tables.rules.insert(rule.id, rule);
        Ok(tables.next_rule_id)
    }

    async fn rule(&self, id: i64) -> RepositoryResult<Option<TradingRule>> {
        Ok(self.inner.read().await.rules.get(&id).cloned())
    }

    async fn update_rule(&self, rule: &TradingRule) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        match tables.rules.get_mut(&rule.id) {
            Some(stored) => {
                *stored = rule.clone();
                Ok(())
            }
            None => Err(RepositoryError::RuleNotFound(rule.id)),
        }
    }

    async fn delete_rule(&self, id: i64) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        if tables.rules.remove(&id).is_none() {
            return Err(RepositoryError::RuleNotFound(id));
        }
        // execution history is owned by the rule
        tables.executions.retain(|e| e.rule_id != id);
        Ok(())
    }

    async fn active_rules(&self) -> RepositoryResult<Vec<TradingRule>> {
        let tables = self.inner.read().await;
        Ok(tables
            .rules
            .values()
            .filter(|rule| rule.status == RuleStatus::Active)
            .cloned()
            .collect())
    }

    async fn rules_for_owner(&self, owner: &str) -> RepositoryResult<Vec<TradingRule>> {
        let tables = self.inner.read().await;
        let mut rules: Vec<TradingRule> = tables
            .rules
            .values()
            .filter(|rule| rule.owner == owner)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.id);
        Ok(rules)
    }

    async fn record_execution(&self, mut execution: RuleExecution) -> RepositoryResult<i64> {
        let mut tables = self.inner.write().await;
        if !tables.rules.contains_key(&execution.rule_id) {
            return Err(RepositoryError::RuleNotFound(execution.rule_id));
        }
        tables.next_execution_id += 1;
        execution.id = tables.next_execution_id;
        tables.executions.push(execution);
        Ok(tables.next_execution_id)
    }

    async fn executions_for_rule(&self, rule_id: i64) -> RepositoryResult<Vec<RuleExecution>> {
        let tables = self.inner.read().await;
        Ok(tables
            .executions
            .iter()
            .filter(|execution| execution.rule_id == rule_id)
            .cloned()
            .collect())
    }

    async fn record_success(&self, rule_id: i64, at: DateTime<Utc>) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        match tables.rules.get_mut(&rule_id) {
            Some(rule) => {
                rule.record_success(at);
                Ok(())
            }
            None => Err(RepositoryError::RuleNotFound(rule_id)),
        }
    }

    async fn reset_daily_counters(&self, at: DateTime<Utc>) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        for rule in tables.rules.values_mut() {
            rule.reset_daily_counter(at);
        }
        Ok(())
    }
}

#[derive(Default)]
struct OrderTables {
    orders: HashMap<i64, ConditionalOrder>,
    triggers: Vec<TriggerLog>,
    next_order_id: i64,
    next_trigger_id: i64,
}

pub struct InMemoryConditionalOrderStore {
    inner: RwLock<OrderTables>,
}

impl InMemoryConditionalOrderStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(OrderTables::default()),
        }
    }
}

impl Default for InMemoryConditionalOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConditionalOrderRepository for InMemoryConditionalOrderStore {
    async fn insert_order(&self, mut order: ConditionalOrder) -> RepositoryResult<i64> {
        let mut tables = self.inner.write().await;
        tables.next_order_id += 1;
        order.id = tables.next_order_id;
        tables.orders.insert(order.id, order);
        Ok(tables.next_order_id)
    }

    async fn order(&self, id: i64) -> RepositoryResult<Option<ConditionalOrder>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, order: &ConditionalOrder) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        match tables.orders.get_mut(&order.id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(RepositoryError::OrderNotFound(order.id)),
        }
    }

    async fn delete_order(&self, id: i64) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        if tables.orders.remove(&id).is_none() {
            return Err(RepositoryError::OrderNotFound(id));
        }
        // trigger history is owned by the order
        tables.triggers.retain(|log| log.order_id != id);
        Ok(())
    }

    async fn pending_orders(&self) -> RepositoryResult<Vec<ConditionalOrder>> {
        let tables = self.inner.read().await;
        let mut orders: Vec<ConditionalOrder> = tables
            .orders
            .values()
            .filter(|order| order.status == ConditionalOrderStatus::Pending)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }

    async fn orders_for_owner(&self, owner: &str) -> RepositoryResult<Vec<ConditionalOrder>> {
        let tables = self.inner.read().await;
        let mut orders: Vec<ConditionalOrder> = tables
            .orders
            .values()
            .filter(|order| order.owner == owner)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }

    async fn record_trigger(&self, mut log: TriggerLog) -> RepositoryResult<i64> {
        let mut tables = self.inner.write().await;
        if !tables.orders.contains_key(&log.order_id) {
            return Err(RepositoryError::OrderNotFound(log.order_id));
        }
        tables.next_trigger_id += 1;
        log.id = tables.next_trigger_id;
        tables.triggers.push(log);
        Ok(tables.next_trigger_id)
    }

    async fn triggers_for_order(&self, order_id: i64) -> RepositoryResult<Vec<TriggerLog>> {
        let tables = self.inner.read().await;
        Ok(tables
            .triggers
            .iter()
            .filter(|log| log.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::Condition;
    use crate::domain::models::{ActionType, MarketQuote, MarketType, OrderSide, PriceType};
    use crate::domain::TriggerConditionType;
    use rust_decimal_macros::dec;

    fn rule(owner: &str) -> TradingRule {
        TradingRule::new(owner, "r", Condition::all(vec![]), ActionType::SendAlert)
    }

    fn execution(rule_id: i64) -> RuleExecution {
        RuleExecution {
            id: 0,
            rule_id,
            executed_at: Utc::now(),
            success: true,
            action_result: None,
            error_message: None,
            condition_results: Vec::new(),
            trigger_data: MarketQuote {
                province: "Guangdong".to_string(),
                market_type: MarketType::Spot,
                price: dec!(463),
                volume: dec!(1000),
                timestamp: Utc::now(),
            },
        }
    }

    fn order(owner: &str) -> ConditionalOrder {
        ConditionalOrder::new(
            owner,
            TriggerConditionType::PriceAbove,
            "Guangdong",
            MarketType::Spot,
            OrderSide::Buy,
            dec!(10),
            PriceType::Market,
        )
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = InMemoryRuleStore::new();
        let a = store.insert_rule(rule("x")).await.unwrap();
        let b = store.insert_rule(rule("x")).await.unwrap();
        assert!(b > a);
        assert_eq!(store.rule(a).await.unwrap().unwrap().id, a);
    }

    #[tokio::test]
    async fn active_rules_filters_by_status() {
        let store = InMemoryRuleStore::new();
        let mut active = rule("x");
        active.status = RuleStatus::Active;
        store.insert_rule(active).await.unwrap();
        store.insert_rule(rule("x")).await.unwrap(); // inactive

        assert_eq!(store.active_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_rule_cascades_to_its_executions() {
        let store = InMemoryRuleStore::new();
        let id = store.insert_rule(rule("x")).await.unwrap();
        let other = store.insert_rule(rule("x")).await.unwrap();
        store.record_execution(execution(id)).await.unwrap();
        store.record_execution(execution(id)).await.unwrap();
        store.record_execution(execution(other)).await.unwrap();

        store.delete_rule(id).await.unwrap();

        assert!(store.rule(id).await.unwrap().is_none());
        assert!(store.executions_for_rule(id).await.unwrap().is_empty());
        assert_eq!(store.executions_for_rule(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn execution_for_unknown_rule_is_rejected() {
        let store = InMemoryRuleStore::new();
        assert!(matches!(
            store.record_execution(execution(99)).await,
            Err(RepositoryError::RuleNotFound(99))
        ));
    }

    #[tokio::test]
    async fn record_success_and_daily_reset_round_trip() {
        let store = InMemoryRuleStore::new();
        let id = store.insert_rule(rule("x")).await.unwrap();
        let now = Utc::now();

        store.record_success(id, now).await.unwrap();
        store.record_success(id, now).await.unwrap();
        let stored = store.rule(id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 2);
        assert_eq!(stored.today_execution_count, 2);

        store.reset_daily_counters(now).await.unwrap();
        let stored = store.rule(id).await.unwrap().unwrap();
        assert_eq!(stored.today_execution_count, 0);
        assert_eq!(stored.execution_count, 2);
    }

    #[tokio::test]
    async fn rules_for_owner_filters_and_orders_by_id() {
        let store = InMemoryRuleStore::new();
        store.insert_rule(rule("alice")).await.unwrap();
        store.insert_rule(rule("bob")).await.unwrap();
        store.insert_rule(rule("alice")).await.unwrap();

        let rules = store.rules_for_owner("alice").await.unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].id < rules[1].id);
    }

    #[tokio::test]
    async fn deleting_an_order_cascades_to_its_triggers() {
        let store = InMemoryConditionalOrderStore::new();
        let id = store.insert_order(order("x")).await.unwrap();
        let log = TriggerLog {
            id: 0,
            order_id: id,
            triggered_at: Utc::now(),
            condition_type: TriggerConditionType::PriceAbove,
            snapshot: MarketQuote {
                province: "Guangdong".to_string(),
                market_type: MarketType::Spot,
                price: dec!(500),
                volume: dec!(1000),
                timestamp: Utc::now(),
            },
            order_placed: true,
            success: true,
            detail: None,
        };
        store.record_trigger(log).await.unwrap();

        store.delete_order(id).await.unwrap();
        assert!(store.order(id).await.unwrap().is_none());
        assert!(store.triggers_for_order(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_orders_excludes_settled_ones() {
        let store = InMemoryConditionalOrderStore::new();
        let keep = store.insert_order(order("x")).await.unwrap();
        let done_id = store.insert_order(order("x")).await.unwrap();

        let mut done = store.order(done_id).await.unwrap().unwrap();
        done.cancel(Utc::now());
        store.update_order(&done).await.unwrap();

        let pending = store.pending_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, keep);
    }

    #[tokio::test]
    async fn update_of_unknown_order_is_rejected() {
        let store = InMemoryConditionalOrderStore::new();
        let mut ghost = order("x");
        ghost.id = 1234;
        assert!(matches!(
            store.update_order(&ghost).await,
            Err(RepositoryError::OrderNotFound(1234))
        ));
    }
}
