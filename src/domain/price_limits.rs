// src/domain/price_limits.rs
// Per-province price caps for declared energy prices (yuan/MWh).

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::ValidationVerdict;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Fallback limits for provinces without an explicit cap table.
pub const DEFAULT_MIN_PRICE: Decimal = dec!(0);
pub const DEFAULT_MAX_PRICE: Decimal = dec!(1500);
pub const DEFAULT_BASE_PRICE: Decimal = dec!(450);

/// Immutable price-cap configuration for one province.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCapRule {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub base_price: Decimal,
    pub allows_negative: bool,
    pub max_deviation_percent: Decimal,
}

impl PriceCapRule {
    pub fn new(
        min_price: Decimal,
        max_price: Decimal,
        base_price: Decimal,
        allows_negative: bool,
        max_deviation_percent: Decimal,
    ) -> EngineResult<Self> {
        if min_price > base_price || base_price > max_price {
            return Err(EngineError::Config(format!(
                "price caps must satisfy min <= base <= max, got {} / {} / {}",
                min_price, base_price, max_price
            )));
        }
        if !allows_negative && min_price < Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "negative floor {} on a province that disallows negative prices",
                min_price
            )));
        }
        Ok(Self {
            min_price,
            max_price,
            base_price,
            allows_negative,
            max_deviation_percent,
        })
    }
}

/// Registry of province price caps. Unknown provinces degrade to the
/// defaults above instead of blocking the order flow.
#[derive(Debug, Clone, Default)]
pub struct PriceLimitRegistry {
    rules: HashMap<String, PriceCapRule>,
}

impl PriceLimitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the provinces the platform trades in.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin = [
            ("Guangdong", dec!(0), dec!(1500), dec!(463), false),
            ("Shandong", dec!(-100), dec!(1300), dec!(395), true),
            ("Shanxi", dec!(-150), dec!(1500), dec!(332), true),
            ("Zhejiang", dec!(0), dec!(1500), dec!(420), false),
            ("Jiangsu", dec!(0), dec!(1300), dec!(410), false),
            ("Sichuan", dec!(0), dec!(1200), dec!(380), false),
        ];
        for (province, min, max, base, allows_negative) in builtin {
            // the builtin table is known-consistent
            if let Ok(rule) = PriceCapRule::new(min, max, base, allows_negative, dec!(50)) {
                registry.register(province, rule);
            }
        }
        registry
    }

    pub fn register(&mut self, province: impl Into<String>, rule: PriceCapRule) {
        self.rules.insert(province.into(), rule);
    }

    pub fn rule(&self, province: &str) -> Option<&PriceCapRule> {
        self.rules.get(province)
    }

    pub fn price_limits(&self, province: &str) -> (Decimal, Decimal) {
        match self.rules.get(province) {
            Some(rule) => (rule.min_price, rule.max_price),
            None => (DEFAULT_MIN_PRICE, DEFAULT_MAX_PRICE),
        }
    }

    pub fn base_price(&self, province: &str) -> Decimal {
        self.rules
            .get(province)
            .map(|rule| rule.base_price)
            .unwrap_or(DEFAULT_BASE_PRICE)
    }

    pub fn allows_negative(&self, province: &str) -> bool {
        self.rules
            .get(province)
            .map(|rule| rule.allows_negative)
            .unwrap_or(false)
    }

    /// Allowed band around a base price, clamped to the absolute caps.
    pub fn deviation_band(&self, province: &str, base_price: Decimal) -> (Decimal, Decimal) {
        let (min, max) = self.price_limits(province);
        let deviation = self
            .rules
            .get(province)
            .map(|rule| rule.max_deviation_percent)
            .unwrap_or(dec!(50));
        let spread = base_price * deviation / dec!(100);
        ((base_price - spread).max(min), (base_price + spread).min(max))
    }

    /// Check a declared price against the province caps. Every check is
    /// evaluated; failures are concatenated in check order. Unconfigured
    /// provinces always pass with a fallback warning.
    pub fn validate_price(&self, province: &str, price: Decimal) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::new();

        let rule = match self.rules.get(province) {
            Some(rule) => rule,
            None => {
                log::debug!("no price caps configured for {}, using defaults", province);
                verdict.warn(format!(
                    "province {} has no configured price caps, default rules applied",
                    province
                ));
                return verdict;
            }
        };

        if price < Decimal::ZERO && !rule.allows_negative {
            verdict.error(format!(
                "price {} is negative but {} does not allow negative prices",
                price, province
            ));
        }
        if price < rule.min_price {
            verdict.error(format!(
                "price {} is below lower limit {} for {}",
                price, rule.min_price, province
            ));
        }
        if price > rule.max_price {
            verdict.error(format!(
                "price {} exceeds upper limit {} for {}",
                price, rule.max_price, province
            ));
        }

        verdict
    }
}
