// src/domain/rule.rs
// Persisted automation rules: a boolean condition over market data that
// dispatches a bounded, rate-limited action when it fires.

use crate::domain::condition::{Condition, ConditionTrace, FieldValue};
use crate::domain::models::{ActionType, MarketQuote, MarketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    Active,
    Inactive,
    Paused,
    Deleted,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Active => "ACTIVE",
            RuleStatus::Inactive => "INACTIVE",
            RuleStatus::Paused => "PAUSED",
            RuleStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingRule {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub priority: i32,
    pub status: RuleStatus,
    pub condition: Condition,
    /// Extra named values overlaid on the evaluation context.
    pub condition_params: HashMap<String, FieldValue>,
    /// Empty means "all provinces".
    pub provinces: Vec<String>,
    /// Empty means "all market types".
    pub market_types: Vec<MarketType>,
    pub action: ActionType,
    pub action_params: serde_json::Value,
    pub execution_count: u64,
    pub today_execution_count: u32,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub max_executions_per_day: u32,
    pub min_interval_secs: i64,
    pub max_total_executions: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradingRule {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        condition: Condition,
        action: ActionType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            owner: owner.into(),
            name: name.into(),
            priority: 0,
            status: RuleStatus::Inactive,
            condition,
            condition_params: HashMap::new(),
            provinces: Vec::new(),
            market_types: Vec::new(),
            action,
            action_params: serde_json::Value::Null,
            execution_count: 0,
            today_execution_count: 0,
            last_executed_at: None,
            max_executions_per_day: 10,
            min_interval_secs: 60,
            max_total_executions: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rate-limit and lifecycle gate. A false here is a normal skip, not
    /// an evaluation attempt, so no execution record is written for it.
    pub fn can_execute(&self, now: DateTime<Utc>) -> bool {
        if self.status != RuleStatus::Active {
            return false;
        }
        if self.today_execution_count >= self.max_executions_per_day {
            return false;
        }
        if let Some(max_total) = self.max_total_executions {
            if self.execution_count >= max_total {
                return false;
            }
        }
        if let Some(last) = self.last_executed_at {
            if (now - last).num_seconds() < self.min_interval_secs {
                return false;
            }
        }
        true
    }

    /// Scope filter: an empty province/market-type list matches anything.
    pub fn matches_scope(&self, province: &str, market_type: MarketType) -> bool {
        if !self.provinces.is_empty() && !self.provinces.iter().any(|p| p == province) {
            return false;
        }
        if !self.market_types.is_empty() && !self.market_types.contains(&market_type) {
            return false;
        }
        true
    }

    /// Bump counters after a successful dispatch.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.execution_count += 1;
        self.today_execution_count += 1;
        self.last_executed_at = Some(now);
        self.updated_at = now;
    }

    /// Day-boundary reset, driven by the external scheduler.
    pub fn reset_daily_counter(&mut self, now: DateTime<Utc>) {
        self.today_execution_count = 0;
        self.updated_at = now;
    }
}

/// Append-only record of one evaluation attempt that reached dispatch.
/// Owned by exactly one rule and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecution {
    pub id: i64,
    pub rule_id: i64,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub action_result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub condition_results: Vec<ConditionTrace>,
    pub trigger_data: MarketQuote,
}
