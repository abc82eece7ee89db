// src/config.rs
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::MarketType;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Trading engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Evaluation scheduling and dispatch bounds
    pub engine: EngineConfig,

    /// Market feeds to watch
    pub markets: Vec<MarketConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Evaluation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between evaluation passes
    pub tick_interval_secs: u64,

    /// Upper bound on one action dispatch
    pub dispatch_timeout_secs: u64,
}

/// One (province, market type) feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub province: String,
    pub market_type: MarketType,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> EngineResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let engine = EngineConfig {
            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            dispatch_timeout_secs: env::var("DISPATCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        };

        let market_type = parse_market_type(
            &env::var("MARKET_TYPE").unwrap_or_else(|_| "SPOT".to_string()),
        )?;
        let markets = env::var("MARKET_PROVINCES")
            .unwrap_or_else(|_| "Guangdong,Shandong".to_string())
            .split(',')
            .map(|province| MarketConfig {
                province: province.trim().to_string(),
                market_type,
            })
            .collect();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            engine,
            markets,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| EngineError::Config(format!("Failed to open config file: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> EngineResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path)
                    .map_err(|e| EngineError::Config(format!("Failed to create log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                tick_interval_secs: 5,
                dispatch_timeout_secs: 5,
            },
            markets: vec![
                MarketConfig {
                    province: "Guangdong".to_string(),
                    market_type: MarketType::Spot,
                },
                MarketConfig {
                    province: "Shandong".to_string(),
                    market_type: MarketType::Spot,
                },
            ],
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

fn parse_market_type(raw: &str) -> EngineResult<MarketType> {
    match raw.to_uppercase().as_str() {
        "DAY_AHEAD" => Ok(MarketType::DayAhead),
        "SPOT" => Ok(MarketType::Spot),
        "MEDIUM_LONG_TERM" => Ok(MarketType::MediumLongTerm),
        other => Err(EngineError::Config(format!(
            "Unknown market type: {}",
            other
        ))),
    }
}
