//! Configuration for energy-broker.
//!
//! One [`BrokerConfig`] is constructed at startup (TOML file, CLI flags,
//! environment) and passed by reference into every component constructor.
//! Nothing in the crate reads configuration from process globals.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Unit price strategy for market estimates and orders.
///
/// The market accepts either a named pricing tier or an absolute price in
/// SUN per unit of energy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitPrice {
    /// Absolute price in SUN.
    Sun(u64),
    /// Named tier, e.g. `"MEDIUM"` or `"FAST"`.
    Tier(String),
}

impl Default for UnitPrice {
    fn default() -> Self {
        Self::Tier("MEDIUM".to_string())
    }
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Percentage markup applied to market base prices.
    #[serde(default = "default_commission_percent")]
    pub commission_percent: f64,

    /// Path of the sled invoice database.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Keep invoices in memory only (no database on disk).
    #[serde(default)]
    pub ephemeral: bool,

    /// User notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Block-explorer (TronGrid) settings.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Resource-market (tronsave.io) settings.
    #[serde(default)]
    pub market: MarketConfig,

    /// Reconciliation loop settings.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// User notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Telegram bot token. Required unless payment simulation is enabled.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Telegram Bot API base URL.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

/// Block-explorer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// TronGrid-compatible API base URL.
    #[serde(default = "default_chain_api_base")]
    pub api_base: String,

    /// Optional `TRON-PRO-API-KEY` value.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Receiving address invoices are paid to (base58check form).
    #[serde(default)]
    pub receiving_address: String,

    /// Report every pending invoice as paid after a fixed delay instead of
    /// checking the chain. Non-production operation only.
    #[serde(default)]
    pub simulate_payments: bool,

    /// Delay before a simulated payment is reported, in seconds.
    #[serde(default = "default_simulated_delay_secs")]
    pub simulated_delay_secs: u64,
}

/// Resource-market settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Market API base URL.
    #[serde(default = "default_market_api_base")]
    pub api_base: String,

    /// API key. Without one, package prices fall back to shipped defaults
    /// and no orders can be placed.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Delegation duration in seconds.
    #[serde(default = "default_duration_sec")]
    pub duration_sec: u64,

    /// Unit price strategy for estimates and orders.
    #[serde(default)]
    pub unit_price: UnitPrice,

    /// Whether orders may be partially filled.
    #[serde(default = "default_allow_partial_fill")]
    pub allow_partial_fill: bool,

    /// Minimum delegation amount per fill. Zero omits the option.
    #[serde(default)]
    pub min_delegate_amount: u64,
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between reconciliation ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            commission_percent: default_commission_percent(),
            store_path: default_store_path(),
            ephemeral: false,
            notify: NotifyConfig::default(),
            chain: ChainConfig::default(),
            market: MarketConfig::default(),
            reconciler: ReconcilerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            api_base: default_chain_api_base(),
            api_key: None,
            receiving_address: String::new(),
            simulate_payments: false,
            simulated_delay_secs: default_simulated_delay_secs(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_base: default_market_api_base(),
            api_key: None,
            duration_sec: default_duration_sec(),
            unit_price: UnitPrice::default(),
            allow_partial_fill: default_allow_partial_fill(),
            min_delegate_amount: 0,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReconcilerConfig {
    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "energy-broker")
        .map(|dirs| dirs.data_dir().join("invoices"))
        .unwrap_or_else(|| PathBuf::from(".energy-broker/invoices"))
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_commission_percent() -> f64 {
    10.0
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_chain_api_base() -> String {
    "https://api.trongrid.io".to_string()
}

fn default_market_api_base() -> String {
    "https://api.tronsave.io".to_string()
}

const fn default_simulated_delay_secs() -> u64 {
    60
}

const fn default_duration_sec() -> u64 {
    3600
}

const fn default_allow_partial_fill() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    30
}

impl BrokerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
