//! Command-line interface definition.

use clap::Parser;
use energy_broker::BrokerConfig;
use std::path::PathBuf;

/// Payment reconciliation and energy delegation engine for the TRON network.
#[derive(Parser, Debug)]
#[command(name = "energy-broker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "ENERGY_BROKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Telegram bot token used for user notifications.
    #[arg(long, env = "ENERGY_BROKER_BOT_TOKEN")]
    pub bot_token: Option<String>,

    /// Commission percentage applied on top of market prices.
    #[arg(long, env = "ENERGY_BROKER_COMMISSION_PERCENT")]
    pub commission_percent: Option<f64>,

    /// Path of the invoice database.
    #[arg(long, env = "ENERGY_BROKER_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Keep invoices in memory only (no database on disk).
    #[arg(long)]
    pub ephemeral: bool,

    /// Receiving address invoices are paid to.
    #[arg(long, env = "ENERGY_BROKER_RECEIVING_ADDRESS")]
    pub receiving_address: Option<String>,

    /// Block-explorer API base URL.
    #[arg(long, env = "ENERGY_BROKER_CHAIN_API_BASE")]
    pub chain_api_base: Option<String>,

    /// Block-explorer API key.
    #[arg(long, env = "ENERGY_BROKER_CHAIN_API_KEY")]
    pub chain_api_key: Option<String>,

    /// Report pending invoices as paid after a fixed delay (no chain access).
    #[arg(long, env = "ENERGY_BROKER_SIMULATE_PAYMENTS")]
    pub simulate_payments: bool,

    /// Resource-market API base URL.
    #[arg(long, env = "ENERGY_BROKER_MARKET_API_BASE")]
    pub market_api_base: Option<String>,

    /// Resource-market API key.
    #[arg(long, env = "ENERGY_BROKER_MARKET_API_KEY")]
    pub market_api_key: Option<String>,

    /// Seconds between reconciliation ticks.
    #[arg(long, env = "ENERGY_BROKER_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

impl Cli {
    /// Convert CLI arguments into a `BrokerConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<BrokerConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            BrokerConfig::from_file(path)?
        } else {
            BrokerConfig::default()
        };

        // Override with CLI arguments
        if let Some(bot_token) = self.bot_token {
            config.notify.bot_token = Some(bot_token);
        }
        if let Some(commission_percent) = self.commission_percent {
            config.commission_percent = commission_percent;
        }
        if let Some(store_path) = self.store_path {
            config.store_path = store_path;
        }
        if self.ephemeral {
            config.ephemeral = true;
        }
        if let Some(receiving_address) = self.receiving_address {
            config.chain.receiving_address = receiving_address;
        }
        if let Some(chain_api_base) = self.chain_api_base {
            config.chain.api_base = chain_api_base;
        }
        if let Some(chain_api_key) = self.chain_api_key {
            config.chain.api_key = Some(chain_api_key);
        }
        if self.simulate_payments {
            config.chain.simulate_payments = true;
        }
        if let Some(market_api_base) = self.market_api_base {
            config.market.api_base = market_api_base;
        }
        if let Some(market_api_key) = self.market_api_key {
            config.market.api_key = Some(market_api_key);
        }
        if let Some(interval_secs) = self.interval_secs {
            config.reconciler.interval_secs = interval_secs;
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}
