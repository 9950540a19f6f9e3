//! Provider error taxonomy

use thiserror::Error;

use crate::types::{CurrencyPair, ProviderName};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} failed to get ticker price for {symbol}")]
    TickerNotFound {
        provider: ProviderName,
        symbol: String,
    },

    #[error("{provider} failed to get candle prices for {symbol}")]
    CandleNotFound {
        provider: ProviderName,
        symbol: String,
    },

    #[error("{provider} has no ticker data for requested pairs: {}", format_pairs(.pairs))]
    NoTickers {
        provider: ProviderName,
        pairs: Vec<CurrencyPair>,
    },

    #[error("{provider} has no candle data for requested pairs: {}", format_pairs(.pairs))]
    NoCandles {
        provider: ProviderName,
        pairs: Vec<CurrencyPair>,
    },

    #[error("{provider} failed to fetch available pairs: {reason}")]
    AvailablePairs {
        provider: ProviderName,
        reason: String,
    },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid decimal {value:?}: {reason}")]
    Decimal { value: String, reason: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

fn format_pairs(pairs: &[CurrencyPair]) -> String {
    let symbols: Vec<String> = pairs.iter().map(CurrencyPair::symbol).collect();
    format!("[{}]", symbols.join(", "))
}

/// Why a raw frame could not be turned into updates
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected frame schema: {0}")]
    Schema(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tickers_names_provider_and_pairs() {
        let err = ProviderError::NoTickers {
            provider: ProviderName::Coinbase,
            pairs: vec![CurrencyPair::new("ATOM", "USDT"), CurrencyPair::new("BTC", "USD")],
        };
        assert_eq!(
            err.to_string(),
            "coinbase has no ticker data for requested pairs: [ATOMUSDT, BTCUSD]"
        );
    }
}
