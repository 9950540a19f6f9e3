//! Configuration management for the price feeder
//!
//! Loads from TOML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::oracle::ProviderOptions;
use crate::types::{CurrencyPair, Endpoint, ProviderName};

/// Main feeder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    /// Pairs to price, each with the providers that stream it
    pub currency_pairs: Vec<CurrencyPairConfig>,
    /// Overrides of the built-in provider endpoints
    #[serde(default)]
    pub provider_endpoints: Vec<EndpointConfig>,
    pub connection: ConnectionConfig,
    /// Candle and trade retention in seconds
    pub candle_period_secs: u64,
    /// How often the binary logs the latest prices
    pub price_log_interval_secs: u64,
}

impl FeederConfig {
    /// Load configuration from `config/default`, `config/local` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file in place of the default locations
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Self::defaults()?;
        builder = match path {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false)),
        };

        // Override with environment variables (PRICE_FEEDER__*)
        let config = builder
            .add_source(Environment::with_prefix("PRICE_FEEDER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Parse a TOML document on top of the defaults. Ignores the environment.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("connection.ping_interval_secs", 15)?
            .set_default("connection.stall_timeout_secs", 0)?
            .set_default("connection.reconnect.mode", "backoff")?
            .set_default("connection.reconnect.base_delay_ms", 1000)?
            .set_default("connection.reconnect.max_delay_ms", 60_000)?
            .set_default("candle_period_secs", 900)?
            .set_default("price_log_interval_secs", 30)?)
    }

    fn finish(config: Config) -> Result<Self> {
        let feeder_config: FeederConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        feeder_config.validate()?;
        Ok(feeder_config)
    }

    /// Reject configurations the feeder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.currency_pairs.is_empty() {
            bail!("At least one currency pair must be configured");
        }

        for pair in &self.currency_pairs {
            if pair.base.trim().is_empty() || pair.quote.trim().is_empty() {
                bail!("Currency pair {:?}/{:?} needs both base and quote", pair.base, pair.quote);
            }
            if pair.providers.is_empty() {
                bail!("Currency pair {}{} has no providers", pair.base, pair.quote);
            }
            for provider in &pair.providers {
                if ProviderName::from_str(provider).is_none() {
                    bail!(
                        "Unsupported provider {:?} for pair {}{}",
                        provider,
                        pair.base,
                        pair.quote
                    );
                }
            }
        }

        for endpoint in &self.provider_endpoints {
            if ProviderName::from_str(&endpoint.name).is_none() {
                bail!("Unsupported provider {:?} in provider_endpoints", endpoint.name);
            }
            if endpoint.rest.trim().is_empty() || endpoint.websocket.trim().is_empty() {
                bail!("Endpoint for {} needs both rest and websocket", endpoint.name);
            }
        }

        if self.connection.ping_interval_secs == 0 {
            bail!("connection.ping_interval_secs must be positive");
        }
        if self.connection.reconnect.to_policy().is_none() {
            bail!(
                "Unknown reconnect mode {:?} (expected immediate, fixed or backoff)",
                self.connection.reconnect.mode
            );
        }
        if self.candle_period_secs == 0 {
            bail!("candle_period_secs must be positive");
        }

        Ok(())
    }

    /// Pairs grouped by the provider that streams them, in configuration order
    pub fn provider_pairs(&self) -> HashMap<ProviderName, Vec<CurrencyPair>> {
        let mut grouped: HashMap<ProviderName, Vec<CurrencyPair>> = HashMap::new();
        for pair_config in &self.currency_pairs {
            let pair = CurrencyPair::new(&pair_config.base, &pair_config.quote);
            for provider in &pair_config.providers {
                let Some(name) = ProviderName::from_str(provider) else {
                    continue;
                };
                let pairs = grouped.entry(name).or_default();
                if !pairs.contains(&pair) {
                    pairs.push(pair.clone());
                }
            }
        }
        grouped
    }

    /// Endpoint overrides keyed by provider; unknown names are skipped
    pub fn provider_endpoints_map(&self) -> HashMap<ProviderName, Endpoint> {
        self.provider_endpoints
            .iter()
            .filter_map(|e| {
                let name = ProviderName::from_str(&e.name)?;
                Some((
                    name,
                    Endpoint {
                        name,
                        rest: e.rest.clone(),
                        websocket: e.websocket.clone(),
                        api_key: e.api_key.clone(),
                    },
                ))
            })
            .collect()
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            connection: self.connection.to_settings(),
            candle_period: Duration::from_secs(self.candle_period_secs),
            ..ProviderOptions::default()
        }
    }

    pub fn price_log_interval(&self) -> Duration {
        Duration::from_secs(self.price_log_interval_secs.max(1))
    }

    /// Short summary for logging
    pub fn digest(&self) -> String {
        let mut providers: Vec<String> = self
            .provider_pairs()
            .into_iter()
            .map(|(name, pairs)| format!("{}={}", name, pairs.len()))
            .collect();
        providers.sort();
        format!(
            "pairs={} providers=[{}] ping={}s candle_period={}s reconnect={}",
            self.currency_pairs.len(),
            providers.join(", "),
            self.connection.ping_interval_secs,
            self.candle_period_secs,
            self.connection.reconnect.mode
        )
    }
}

impl std::fmt::Display for FeederConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
