// src/domain/repository/mod.rs
// Persistence interfaces for rules, conditional orders and their logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::conditional_order::{ConditionalOrder, TriggerLog};
use crate::domain::errors::RepositoryResult;
use crate::domain::rule::{RuleExecution, TradingRule};

/// Storage for automation rules and their execution history. Deleting a
/// rule cascades to its executions.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn insert_rule(&self, rule: TradingRule) -> RepositoryResult<i64>;
    async fn rule(&self, id: i64) -> RepositoryResult<Option<TradingRule>>;
    async fn update_rule(&self, rule: &TradingRule) -> RepositoryResult<()>;
    async fn delete_rule(&self, id: i64) -> RepositoryResult<()>;

    async fn active_rules(&self) -> RepositoryResult<Vec<TradingRule>>;
    async fn rules_for_owner(&self, owner: &str) -> RepositoryResult<Vec<TradingRule>>;

    async fn record_execution(&self, execution: RuleExecution) -> RepositoryResult<i64>;
    async fn executions_for_rule(&self, rule_id: i64) -> RepositoryResult<Vec<RuleExecution>>;

    /// Atomic counter bump after a successful dispatch.
    async fn record_success(&self, rule_id: i64, at: DateTime<Utc>) -> RepositoryResult<()>;
    /// Day-boundary reset of `today_execution_count`, driven externally.
    async fn reset_daily_counters(&self, at: DateTime<Utc>) -> RepositoryResult<()>;
}

/// Storage for conditional orders and their trigger history. Deleting an
/// order cascades to its trigger logs.
#[async_trait]
pub trait ConditionalOrderRepository: Send + Sync {
    async fn insert_order(&self, order: ConditionalOrder) -> RepositoryResult<i64>;
    async fn order(&self, id: i64) -> RepositoryResult<Option<ConditionalOrder>>;
    async fn update_order(&self, order: &ConditionalOrder) -> RepositoryResult<()>;
    async fn delete_order(&self, id: i64) -> RepositoryResult<()>;

    async fn pending_orders(&self) -> RepositoryResult<Vec<ConditionalOrder>>;
    async fn orders_for_owner(&self, owner: &str) -> RepositoryResult<Vec<ConditionalOrder>>;

    async fn record_trigger(&self, log: TriggerLog) -> RepositoryResult<i64>;
    async fn triggers_for_order(&self, order_id: i64) -> RepositoryResult<Vec<TriggerLog>>;
}
