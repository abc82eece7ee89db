// src/infrastructure/mod.rs
pub mod dispatch;
pub mod market;
pub mod persistence;

pub use dispatch::SimulatedDispatcher;
pub use market::{InMemoryQuoteStore, SimulatedFeed};
pub use persistence::{InMemoryConditionalOrderStore, InMemoryRuleStore};
