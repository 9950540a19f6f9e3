//! Configuration sections

use serde::Deserialize;
use std::time::Duration;

use crate::oracle::{ConnectionSettings, ReconnectPolicy};

/// One pair to price and the providers that should stream it
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyPairConfig {
    pub base: String,
    pub quote: String,
    /// Provider names, e.g. ["coinbase", "osmosisv2"]
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Endpoint override for one provider
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    /// REST base url, including scheme
    pub rest: String,
    /// Websocket host, without scheme
    pub websocket: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Keepalive interval in seconds
    pub ping_interval_secs: u64,
    /// Reconnect after this many silent seconds (0 = twice the ping interval)
    pub stall_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// "immediate", "fixed" or "backoff"
    pub mode: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl ReconnectConfig {
    pub fn to_policy(&self) -> Option<ReconnectPolicy> {
        let base = Duration::from_millis(self.base_delay_ms);
        match self.mode.to_lowercase().as_str() {
            "immediate" => Some(ReconnectPolicy::Immediate),
            "fixed" => Some(ReconnectPolicy::Fixed(base)),
            "backoff" => Some(ReconnectPolicy::Backoff {
                base,
                max: Duration::from_millis(self.max_delay_ms),
            }),
            _ => None,
        }
    }
}

impl ConnectionConfig {
    /// Worker settings; falls back to the default reconnect policy on an unknown mode.
    pub fn to_settings(&self) -> ConnectionSettings {
        let ping_interval = Duration::from_secs(self.ping_interval_secs);
        let stall_timeout = if self.stall_timeout_secs == 0 {
            ping_interval * 2
        } else {
            Duration::from_secs(self.stall_timeout_secs)
        };
        ConnectionSettings {
            ping_interval,
            stall_timeout,
            reconnect: self.reconnect.to_policy().unwrap_or_default(),
        }
    }
}
