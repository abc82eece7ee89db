// src/domain/trading_rules.rs
// Per-province declaration rules (quantity bounds, step sizes, deadlines)
// and the order admission validator built on top of them.

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{MarketType, OrderRequest, PriceType, ValidationVerdict};
use crate::domain::price_limits::PriceLimitRegistry;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

/// Absolute tolerance when checking step quantization, in the unit of the
/// checked value (MWh for quantity, yuan/MWh for price).
const STEP_TOLERANCE: Decimal = dec!(0.001);

/// Deviation from base price beyond which a declaration draws a warning.
const DEVIATION_WARNING_PERCENT: Decimal = dec!(50);

/// Immutable declaration rules for one province.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingRuleConfig {
    pub min_quantity: Decimal,
    pub max_quantity: Decimal,
    pub quantity_step: Decimal,
    pub price_step: Decimal,
    pub declaration_deadline: String,
    pub trading_hours: String,
}

impl TradingRuleConfig {
    pub fn new(
        min_quantity: Decimal,
        max_quantity: Decimal,
        quantity_step: Decimal,
        price_step: Decimal,
        declaration_deadline: impl Into<String>,
        trading_hours: impl Into<String>,
    ) -> EngineResult<Self> {
        if min_quantity <= Decimal::ZERO || min_quantity > max_quantity {
            return Err(EngineError::Config(format!(
                "quantity bounds must satisfy 0 < min <= max, got {} / {}",
                min_quantity, max_quantity
            )));
        }
        Ok(Self {
            min_quantity,
            max_quantity,
            quantity_step,
            price_step,
            declaration_deadline: declaration_deadline.into(),
            trading_hours: trading_hours.into(),
        })
    }
}

/// Registry of per-province declaration rules.
#[derive(Debug, Clone, Default)]
pub struct TradingRuleRegistry {
    configs: HashMap<String, TradingRuleConfig>,
}

impl TradingRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin = [
            ("Guangdong", dec!(0.1), dec!(10000), dec!(0.1), dec!(0.1), "10:00", "09:00-11:30,13:00-17:00"),
            ("Shandong", dec!(1), dec!(50000), dec!(1), dec!(0.1), "09:30", "09:00-11:30,13:00-17:00"),
            ("Shanxi", dec!(0.1), dec!(20000), dec!(0.1), dec!(0.5), "10:30", "08:30-11:30,13:30-17:30"),
            ("Zhejiang", dec!(0.1), dec!(10000), dec!(0.1), dec!(0.1), "10:00", "09:00-11:30,13:00-16:00"),
            ("Jiangsu", dec!(1), dec!(20000), dec!(1), dec!(0.1), "09:00", "09:00-11:30,13:00-17:00"),
            ("Sichuan", dec!(0.1), dec!(5000), dec!(0.1), dec!(0.1), "11:00", "09:30-11:30,14:00-17:00"),
        ];
        for (province, min, max, qty_step, price_step, deadline, hours) in builtin {
            if let Ok(config) = TradingRuleConfig::new(min, max, qty_step, price_step, deadline, hours)
            {
                registry.register(province, config);
            }
        }
        registry
    }

    pub fn register(&mut self, province: impl Into<String>, config: TradingRuleConfig) {
        self.configs.insert(province.into(), config);
    }

    pub fn config(&self, province: &str) -> Option<&TradingRuleConfig> {
        self.configs.get(province)
    }
}

/// Validates declared orders against the province rule registries.
/// Errors block the order; warnings are informational only.
pub struct OrderValidator {
    price_limits: Arc<PriceLimitRegistry>,
    trading_rules: Arc<TradingRuleRegistry>,
}

impl OrderValidator {
    pub fn new(
        price_limits: Arc<PriceLimitRegistry>,
        trading_rules: Arc<TradingRuleRegistry>,
    ) -> Self {
        Self {
            price_limits,
            trading_rules,
        }
    }

    /// Validate a declaration. Every check runs independently; no check
    /// short-circuits another.
    pub fn validate_order(
        &self,
        province: &str,
        market_type: MarketType,
        price: Decimal,
        quantity: Decimal,
        base_price: Decimal,
    ) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::new();

        let config = match self.trading_rules.config(province) {
            Some(config) => config,
            None => {
                log::debug!(
                    "no trading rules for {} {}, falling back to defaults",
                    province,
                    market_type
                );
                verdict.warn(format!(
                    "province {} has no configured trading rules, default rules applied",
                    province
                ));
                return verdict;
            }
        };

        if quantity < config.min_quantity {
            verdict.error(format!(
                "quantity {} MWh is below minimum declared quantity {} MWh",
                quantity, config.min_quantity
            ));
        }
        if quantity > config.max_quantity {
            verdict.error(format!(
                "quantity {} MWh exceeds maximum declared quantity {} MWh",
                quantity, config.max_quantity
            ));
        }

        if !on_step_grid(quantity, config.quantity_step) {
            verdict.warn(format!(
                "quantity {} MWh is not a multiple of the {} MWh step",
                quantity, config.quantity_step
            ));
        }
        // Prices are quantized in integer hundredths of a yuan so that a
        // declared 463.10 with step 0.1 never trips on representation.
        if !on_step_grid(to_cents(price), to_cents(config.price_step)) {
            verdict.warn(format!(
                "price {} is not a multiple of the {} price step",
                price, config.price_step
            ));
        }

        if base_price > Decimal::ZERO {
            let deviation = ((price - base_price).abs() / base_price) * dec!(100);
            if deviation > DEVIATION_WARNING_PERCENT {
                verdict.warn(format!(
                    "price {} deviates {}% from base price {}",
                    price,
                    deviation.round_dp(1),
                    base_price
                ));
            }
        }

        verdict
    }

    /// Full admission check for a declared order: price caps plus
    /// declaration rules, folded into a single verdict.
    pub fn admit(&self, order: &OrderRequest) -> ValidationVerdict {
        let price = match order.price_type {
            PriceType::Limit(price) => price,
            // market orders carry no declared price to cap-check
            PriceType::Market => {
                let base = self.price_limits.base_price(&order.province);
                return self.validate_order(
                    &order.province,
                    order.market_type,
                    base,
                    order.quantity,
                    Decimal::ZERO,
                );
            }
        };

        let mut verdict = self
            .price_limits
            .validate_price(&order.province, price);
        verdict.merge(self.validate_order(
            &order.province,
            order.market_type,
            price,
            order.quantity,
            self.price_limits.base_price(&order.province),
        ));
        verdict
    }
}

/// True when `value` sits on the `step` grid within the fixed tolerance.
fn on_step_grid(value: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return true;
    }
    let remainder = (value % step).abs();
    let off_grid = remainder.min((step - remainder).abs());
    off_grid <= STEP_TOLERANCE
}

fn to_cents(value: Decimal) -> Decimal {
    (value * dec!(100)).round()
}
