// src/main.rs
use std::sync::Arc;

use chrono::Utc;
use power_trade::application::{
    ConditionalOrderEngine, ConditionalOrderUseCase, RuleEngine, RuleEvaluationUseCase,
};
use power_trade::config::Config;
use power_trade::domain::condition::{CompareOp, Condition};
use power_trade::domain::conditional_order::{ConditionalOrder, TriggerConditionType};
use power_trade::domain::errors::EngineResult;
use power_trade::domain::models::{
    ActionType, MarketQuote, MarketType, OrderRequest, OrderSide, PriceType,
};
use power_trade::domain::price_limits::PriceLimitRegistry;
use power_trade::domain::repository::{ConditionalOrderRepository, RuleRepository};
use power_trade::domain::rule::{RuleStatus, TradingRule};
use power_trade::domain::trading_rules::{OrderValidator, TradingRuleRegistry};
use power_trade::infrastructure::{
    InMemoryConditionalOrderStore, InMemoryQuoteStore, InMemoryRuleStore, SimulatedDispatcher,
    SimulatedFeed,
};
use rust_decimal_macros::dec;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> EngineResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting power_trade v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Watching {} market feed(s), {}s tick",
        config.markets.len(),
        config.engine.tick_interval_secs
    );

    // Province rule registries and the order validator
    let price_limits = Arc::new(PriceLimitRegistry::with_builtin());
    let trading_rules = Arc::new(TradingRuleRegistry::with_builtin());
    let validator = OrderValidator::new(price_limits.clone(), trading_rules.clone());

    // In-memory stores and the simulated collaborators
    let quotes = Arc::new(InMemoryQuoteStore::new());
    let rules = Arc::new(InMemoryRuleStore::new());
    let orders = Arc::new(InMemoryConditionalOrderStore::new());
    let dispatcher = Arc::new(SimulatedDispatcher::new());

    // Seed each configured feed at its province base price
    for market in &config.markets {
        quotes
            .publish(MarketQuote {
                province: market.province.clone(),
                market_type: market.market_type,
                price: price_limits.base_price(&market.province),
                volume: dec!(1000),
                timestamp: Utc::now(),
            })
            .await;
        log::info!("Seeded {} {} feed", market.province, market.market_type);
    }

    seed_demo_entities(&validator, rules.as_ref(), orders.as_ref(), &price_limits).await?;

    let dispatch_timeout = Duration::from_secs(config.engine.dispatch_timeout_secs);
    let rule_engine = Arc::new(
        RuleEngine::new(
            rules.clone(),
            quotes.clone(),
            dispatcher.clone(),
            price_limits.clone(),
        )
        .with_dispatch_timeout(dispatch_timeout),
    );
    let order_engine = Arc::new(
        ConditionalOrderEngine::new(orders.clone(), quotes.clone(), dispatcher.clone())
            .with_dispatch_timeout(dispatch_timeout),
    );

    // Evaluation loop: drift the simulated feed, then run both passes for
    // every configured market
    let feed = SimulatedFeed::new(quotes.clone());
    let markets = config.markets.clone();
    let tick_interval = config.engine.tick_interval_secs;
    let eval_rule_engine = rule_engine.clone();
    let eval_order_engine = order_engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_interval));
        loop {
            interval.tick().await;
            feed.tick().await;

            for market in &markets {
                match eval_rule_engine
                    .evaluate_rules(&market.province, market.market_type)
                    .await
                {
                    Ok(summary) if summary.fired > 0 => {
                        log::info!(
                            "{} {}: {} rule(s) fired, {} failed",
                            market.province,
                            market.market_type,
                            summary.fired,
                            summary.failed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log::error!(
                        "rule pass failed for {} {}: {}",
                        market.province,
                        market.market_type,
                        e
                    ),
                }

                match eval_order_engine
                    .evaluate_orders(&market.province, market.market_type)
                    .await
                {
                    Ok(summary) if summary.triggered > 0 || summary.expired > 0 => {
                        log::info!(
                            "{} {}: {} order(s) triggered, {} executed, {} expired",
                            market.province,
                            market.market_type,
                            summary.triggered,
                            summary.executed,
                            summary.expired
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log::error!(
                        "order pass failed for {} {}: {}",
                        market.province,
                        market.market_type,
                        e
                    ),
                }
            }
        }
    });

    // Day-boundary maintenance: reset per-day execution counters
    let reset_rules = rules.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        let mut last_day = Utc::now().date_naive();
        loop {
            interval.tick().await;
            let today = Utc::now().date_naive();
            if today != last_day {
                last_day = today;
                match reset_rules.reset_daily_counters(Utc::now()).await {
                    Ok(()) => log::info!("Daily execution counters reset"),
                    Err(e) => log::error!("Failed to reset daily counters: {}", e),
                }
            }
        }
    });

    log::info!("Engine running. Press Ctrl+C to stop.");
    ctrl_c()
        .await
        .map_err(|e| power_trade::domain::errors::EngineError::Unknown(e.to_string()))?;
    log::info!("Shutting down");

    Ok(())
}

/// Insert a demo rule and conditional order so the simulated feed has
/// something to trip, and show the admission validator on a sample order.
async fn seed_demo_entities(
    validator: &OrderValidator,
    rules: &InMemoryRuleStore,
    orders: &InMemoryConditionalOrderStore,
    price_limits: &PriceLimitRegistry,
) -> EngineResult<()> {
    let sample = OrderRequest {
        province: "Guangdong".to_string(),
        market_type: MarketType::Spot,
        side: OrderSide::Buy,
        quantity: dec!(50),
        price_type: PriceType::Limit(dec!(480)),
        timestamp: Utc::now(),
    };
    let verdict = validator.admit(&sample);
    log::info!(
        "Sample declaration admitted: {} ({} warning(s))",
        verdict.valid,
        verdict.warnings.len()
    );
    for warning in &verdict.warnings {
        log::warn!("admission warning: {}", warning);
    }

    let mut alert = TradingRule::new(
        "demo",
        "price moves 1% off base",
        Condition::any(vec![
            Condition::compare("change_pct", CompareOp::Gt, dec!(1)),
            Condition::compare("change_pct", CompareOp::Lt, dec!(-1)),
        ]),
        ActionType::SendAlert,
    );
    alert.status = RuleStatus::Active;
    alert.min_interval_secs = 30;
    alert.max_executions_per_day = 20;
    alert.action_params = serde_json::json!({"channel": "ops", "reason": "price drift"});
    let rule_id = rules.insert_rule(alert).await?;
    log::info!("Seeded demo rule {}", rule_id);

    let base = price_limits.base_price("Guangdong");
    let mut buy_the_dip = ConditionalOrder::new(
        "demo",
        TriggerConditionType::PriceBelow,
        "Guangdong",
        MarketType::Spot,
        OrderSide::Buy,
        dec!(10),
        PriceType::Limit(base),
    );
    buy_the_dip.trigger_price = Some((base * dec!(0.99)).round_dp(2));
    buy_the_dip.valid_until = Some(Utc::now() + chrono::Duration::hours(24));
    let order_id = orders.insert_order(buy_the_dip).await?;
    log::info!("Seeded demo conditional order {}", order_id);

    Ok(())
}
