// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Electricity market segments supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketType {
    DayAhead,
    Spot,
    MediumLongTerm,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::DayAhead => "DAY_AHEAD",
            MarketType::Spot => "SPOT",
            MarketType::MediumLongTerm => "MEDIUM_LONG_TERM",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriceType {
    Market,
    Limit(Decimal),
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PriceType::Market => write!(f, "MARKET"),
            PriceType::Limit(price) => write!(f, "LIMIT {}", price),
        }
    }
}

/// A declared order as submitted for validation and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub province: String,
    pub market_type: MarketType,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price_type: PriceType,
    pub timestamp: DateTime<Utc>,
}

/// Current market snapshot for one (province, market type) feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub province: String,
    pub market_type: MarketType,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Action kinds an automation rule may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    PlaceOrder,
    SendAlert,
    CancelOrder,
    AdjustPosition,
    ExecuteStrategy,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PlaceOrder => "PLACE_ORDER",
            ActionType::SendAlert => "SEND_ALERT",
            ActionType::CancelOrder => "CANCEL_ORDER",
            ActionType::AdjustPosition => "ADJUST_POSITION",
            ActionType::ExecuteStrategy => "EXECUTE_STRATEGY",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result payload returned by the external action dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub order_id: Option<String>,
    pub payload: Option<serde_json::Value>,
}

/// Outcome of a validation call. Errors block the order, warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationVerdict {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another verdict into this one, preserving message order.
    pub fn merge(&mut self, other: ValidationVerdict) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }
}
