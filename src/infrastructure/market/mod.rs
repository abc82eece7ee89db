// src/infrastructure/market/mod.rs
// In-memory quote store plus a simulated feed that drifts the published
// quotes. The engines only ever see the MarketDataService port, so a real
// exchange feed can replace this module without touching them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::errors::{MarketDataError, MarketDataResult};
use crate::domain::models::{MarketQuote, MarketType};
use crate::domain::service::MarketDataService;

/// Latest quote per (province, market type) feed.
pub struct InMemoryQuoteStore {
    quotes: RwLock<HashMap<(String, MarketType), MarketQuote>>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn publish(&self, quote: MarketQuote) {
        let key = (quote.province.clone(), quote.market_type);
        self.quotes.write().await.insert(key, quote);
    }
}

impl Default for InMemoryQuoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataService for InMemoryQuoteStore {
    async fn current_quote(
        &self,
        province: &str,
        market_type: MarketType,
    ) -> MarketDataResult<MarketQuote> {
        let quotes = self.quotes.read().await;
        quotes
            .get(&(province.to_string(), market_type))
            .cloned()
            .ok_or_else(|| MarketDataError::NoQuote(format!("{} {}", province, market_type)))
    }
}

/// Random-walk driver for the quote store, used by the demo binary in
/// place of a real exchange feed.
pub struct SimulatedFeed {
    store: Arc<InMemoryQuoteStore>,
    max_step_percent: f64,
}

impl SimulatedFeed {
    pub fn new(store: Arc<InMemoryQuoteStore>) -> Self {
        Self {
            store,
            max_step_percent: 0.5,
        }
    }

    /// Nudge every published quote by up to ±max_step_percent and stamp
    /// it with the current time.
    pub async fn tick(&self) {
        let mut quotes = self.store.quotes.write().await;
        let mut rng = rand::thread_rng();
        for quote in quotes.values_mut() {
            let step = rng.gen_range(-self.max_step_percent..=self.max_step_percent) / 100.0;
            let factor = Decimal::from_f64(1.0 + step).unwrap_or(Decimal::ONE);
            quote.price = (quote.price * factor).round_dp(2);
            let volume_step = rng.gen_range(-2.0..=2.0) / 100.0;
            let volume_factor = Decimal::from_f64(1.0 + volume_step).unwrap_or(Decimal::ONE);
            quote.volume = (quote.volume * volume_factor).round_dp(0);
            quote.timestamp = Utc::now();
        }
    }
}
