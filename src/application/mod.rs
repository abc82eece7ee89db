// src/application/mod.rs
pub mod usecase;

pub use usecase::{
    ConditionalOrderEngine, ConditionalOrderUseCase, OrderPassSummary, RuleEngine,
    RuleEvaluationUseCase, RulePassSummary,
};
