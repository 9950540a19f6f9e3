//! Core types shared by every price provider
//!
//! Currency pairs, normalized ticker/candle/trade records, provider
//! identities and endpoint configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProviderError;

/// Supported exchange integrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Coinbase,
    #[serde(rename = "osmosisv2")]
    OsmosisV2,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::Coinbase, ProviderName::OsmosisV2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Coinbase => "coinbase",
            ProviderName::OsmosisV2 => "osmosisv2",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coinbase" => Some(ProviderName::Coinbase),
            "osmosisv2" => Some(ProviderName::OsmosisV2),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A base/quote pair, e.g. ATOM/USDT
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Canonical lookup key: uppercase, no separator ("ATOMUSDT")
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote).to_uppercase()
    }

    /// Split a separated wire symbol ("ATOM-USDT", "atom/usdt") into a pair.
    pub fn from_separated(symbol: &str, separator: char) -> Option<Self> {
        let (base, quote) = symbol.split_once(separator)?;
        if base.is_empty() || quote.is_empty() || quote.contains(separator) {
            return None;
        }
        Some(Self::new(base, quote))
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

/// Latest price and 24h volume for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub price: Decimal,
    pub volume: Decimal,
}

impl TickerPrice {
    /// Build a ticker from the decimal strings an exchange sends.
    pub fn from_strs(price: &str, volume: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            price: parse_decimal(price)?,
            volume: parse_decimal(volume)?,
        })
    }
}

/// Close price and volume of one candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlePrice {
    pub price: Decimal,
    pub volume: Decimal,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// A single executed trade, kept by providers that build candles themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Canonical symbol
    pub symbol: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub size: Decimal,
    pub price: Decimal,
}

/// Static REST + websocket location of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: ProviderName,
    pub rest: String,
    pub websocket: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Parse an exchange decimal string without going through binary floats.
///
/// Accepts plain ("10.5", "-0.0001") and scientific ("1.5e-7") notation.
/// Values that do not fit without rounding are rejected.
pub fn parse_decimal(value: &str) -> Result<Decimal, ProviderError> {
    let invalid = |reason: String| ProviderError::Decimal {
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim();
    if trimmed.contains('_') {
        return Err(invalid("digit separators are not allowed".to_string()));
    }
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str_exact(trimmed)
    };
    parsed.map_err(|e| invalid(e.to_string()))
}

/// Current unix time in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
