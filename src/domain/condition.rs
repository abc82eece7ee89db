// src/domain/condition.rs
// Boolean condition trees evaluated against a market snapshot.
//
// Evaluation semantics:
// - `All` short-circuits on the first false child (list order), `Any` on
//   the first true child.
// - `All` over an empty list is vacuously true; `Any` over an empty list
//   is false.
// - An unknown field or a type-incompatible comparison makes the leaf
//   false; evaluation is total and never returns an error.

use crate::domain::errors::ConditionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A scalar a condition leaf can compare against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(Decimal),
    Text(String),
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Condition tree. The serde shape matches the JSON the platform stores:
/// a leaf is `{"field": ..., "operator": ">", "value": ...}` and a
/// combinator is `{"operator": "AND"|"OR", "conditions": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Group {
        operator: LogicOp,
        conditions: Vec<Condition>,
    },
    Compare {
        field: String,
        operator: CompareOp,
        value: FieldValue,
    },
}

/// Record of one evaluated leaf, kept for observability on executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTrace {
    pub field: String,
    pub operator: CompareOp,
    pub expected: FieldValue,
    pub actual: Option<FieldValue>,
    pub passed: bool,
}

/// Named values a condition tree is resolved against.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    values: HashMap<String, FieldValue>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}

impl Condition {
    /// Shorthand for an AND group.
    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::Group {
            operator: LogicOp::And,
            conditions,
        }
    }

    /// Shorthand for an OR group.
    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Group {
            operator: LogicOp::Or,
            conditions,
        }
    }

    pub fn compare(
        field: impl Into<String>,
        operator: CompareOp,
        value: impl Into<FieldValue>,
    ) -> Self {
        Condition::Compare {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parse a stored JSON condition blob.
    pub fn from_json(raw: &str) -> Result<Self, ConditionError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        let mut trace = Vec::new();
        self.eval_inner(ctx, &mut trace)
    }

    /// Evaluate and return the per-leaf trace. Short-circuited leaves are
    /// not evaluated and therefore do not appear in the trace.
    pub fn evaluate_with_trace(&self, ctx: &EvalContext) -> (bool, Vec<ConditionTrace>) {
        let mut trace = Vec::new();
        let satisfied = self.eval_inner(ctx, &mut trace);
        (satisfied, trace)
    }

    fn eval_inner(&self, ctx: &EvalContext, trace: &mut Vec<ConditionTrace>) -> bool {
        match self {
            Condition::Group {
                operator: LogicOp::And,
                conditions,
            } => {
                for condition in conditions {
                    if !condition.eval_inner(ctx, trace) {
                        return false;
                    }
                }
                true
            }
            Condition::Group {
                operator: LogicOp::Or,
                conditions,
            } => {
                for condition in conditions {
                    if condition.eval_inner(ctx, trace) {
                        return true;
                    }
                }
                false
            }
            Condition::Compare {
                field,
                operator,
                value,
            } => {
                let actual = ctx.get(field);
                let passed = match actual {
                    Some(actual) => compare(actual, *operator, value),
                    None => false,
                };
                trace.push(ConditionTrace {
                    field: field.clone(),
                    operator: *operator,
                    expected: value.clone(),
                    actual: actual.cloned(),
                    passed,
                });
                passed
            }
        }
    }
}

fn compare(actual: &FieldValue, operator: CompareOp, expected: &FieldValue) -> bool {
    match (actual, expected) {
        (FieldValue::Number(a), FieldValue::Number(b)) => match operator {
            CompareOp::Gt => a > b,
            CompareOp::Lt => a < b,
            CompareOp::Ge => a >= b,
            CompareOp::Le => a <= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        },
        (FieldValue::Text(a), FieldValue::Text(b)) => match operator {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            // Ordering over text is not meaningful for market fields
            _ => false,
        },
        (FieldValue::Flag(a), FieldValue::Flag(b)) => match operator {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            _ => false,
        },
        // Mixed types never satisfy a comparison
        _ => false,
    }
}
