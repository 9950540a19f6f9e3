//! Coinbase Exchange websocket feed
//!
//! Subscribes to the `matches` and `ticker` channels. Frames are dispatched
//! on their `type` field; candles are built from stored trades on read.
//!
//! REF: https://docs.cloud.coinbase.com/exchange/docs/websocket-overview

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CandleSource, Exchange, WebsocketProvider};
use crate::error::{NormalizeError, ProviderError};
use crate::oracle::message::{ParsedFrame, Update};
use crate::types::{parse_decimal, CurrencyPair, Endpoint, ProviderName, TickerPrice, Trade};

const COINBASE_WS_HOST: &str = "ws-feed.exchange.coinbase.com";
const COINBASE_REST_HOST: &str = "https://api.exchange.coinbase.com";

pub type CoinbaseProvider = WebsocketProvider<Coinbase>;

pub struct Coinbase;

#[derive(Debug, Clone, Serialize)]
struct SubscribeMsg {
    #[serde(rename = "type")]
    msg_type: String,
    product_ids: Vec<String>,
    channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CoinbaseEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
}

/// `match` / `last_match`
#[derive(Debug, Clone, Deserialize)]
struct CoinbaseTradeResponse {
    product_id: String,
    /// RFC3339 with microseconds, e.g. 2022-03-15T08:01:27.000000Z
    time: String,
    size: String,
    price: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CoinbaseTicker {
    product_id: String,
    price: String,
    #[serde(rename = "volume_24h")]
    volume: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CoinbaseErrResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CoinbasePairSummary {
    base_currency: String,
    quote_currency: String,
}

impl Exchange for Coinbase {
    const NAME: ProviderName = ProviderName::Coinbase;
    const WEBSOCKET_PATH: &'static str = "";
    const PAIRS_PATH: &'static str = "/products";
    const CANDLE_SOURCE: CandleSource = CandleSource::Trades;
    const SUBSCRIBE_BY_REQUEST: bool = true;

    fn default_endpoint() -> Endpoint {
        Endpoint {
            name: ProviderName::Coinbase,
            rest: COINBASE_REST_HOST.to_string(),
            websocket: COINBASE_WS_HOST.to_string(),
            api_key: None,
        }
    }

    /// "ATOM-USDT"
    fn currency_pair_to_wire(pair: &CurrencyPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    fn wire_to_currency_pair(symbol: &str) -> Option<CurrencyPair> {
        CurrencyPair::from_separated(symbol, '-')
    }

    fn subscription_msgs(pairs: &[CurrencyPair]) -> Vec<String> {
        let msg = SubscribeMsg {
            msg_type: "subscribe".to_string(),
            product_ids: pairs.iter().map(Self::currency_pair_to_wire).collect(),
            channels: vec!["matches".to_string(), "ticker".to_string()],
        };
        match serde_json::to_string(&msg) {
            Ok(text) => vec![text],
            Err(e) => {
                warn!(provider = %Self::NAME, error = %e, "Failed to encode subscription");
                Vec::new()
            }
        }
    }

    fn normalize(frame: &[u8]) -> Result<ParsedFrame, NormalizeError> {
        let envelope: CoinbaseEnvelope = serde_json::from_slice(frame)?;

        match envelope.msg_type.as_str() {
            "error" => {
                let err: CoinbaseErrResponse = serde_json::from_slice(frame).unwrap_or_default();
                let reason = format!("{} {}", err.message, err.reason);
                Ok(ParsedFrame::Error(reason.trim().to_string()))
            }
            "subscriptions" | "heartbeat" => Ok(ParsedFrame::Control(envelope.msg_type)),
            "ticker" => {
                let ticker: CoinbaseTicker = serde_json::from_slice(frame)?;
                Ok(ParsedFrame::Updates(keep_valid(ticker.into_update())))
            }
            "match" | "last_match" => {
                let trade: CoinbaseTradeResponse = serde_json::from_slice(frame)?;
                Ok(ParsedFrame::Updates(keep_valid(trade.into_update())))
            }
            _ => Ok(ParsedFrame::Unrecognized(envelope.msg_type)),
        }
    }

    fn parse_available_pairs(body: &[u8]) -> Result<Vec<CurrencyPair>, serde_json::Error> {
        let summaries: Vec<CoinbasePairSummary> = serde_json::from_slice(body)?;
        Ok(summaries
            .into_iter()
            .map(|s| CurrencyPair::new(s.base_currency, s.quote_currency))
            .collect())
    }
}

fn keep_valid(update: Result<Update, ProviderError>) -> Vec<Update> {
    match update {
        Ok(update) => vec![update],
        Err(e) => {
            warn!(provider = %Coinbase::NAME, error = %e, "Dropping invalid update");
            Vec::new()
        }
    }
}

fn canonical_symbol(product_id: &str) -> Result<String, ProviderError> {
    Coinbase::wire_to_currency_pair(product_id)
        .map(|pair| pair.symbol())
        .ok_or_else(|| ProviderError::InvalidField {
            field: "product_id",
            value: product_id.to_string(),
            reason: "not a BASE-QUOTE product id".to_string(),
        })
}

impl CoinbaseTicker {
    fn into_update(self) -> Result<Update, ProviderError> {
        Ok(Update::Ticker {
            symbol: canonical_symbol(&self.product_id)?,
            ticker: TickerPrice::from_strs(&self.price, &self.volume)?,
        })
    }
}

impl CoinbaseTradeResponse {
    fn into_update(self) -> Result<Update, ProviderError> {
        let timestamp = chrono::DateTime::parse_from_rfc3339(&self.time)
            .map_err(|e| ProviderError::InvalidField {
                field: "time",
                value: self.time.clone(),
                reason: e.to_string(),
            })?
            .timestamp_millis();

        Ok(Update::Trade(Trade {
            symbol: canonical_symbol(&self.product_id)?,
            timestamp,
            size: parse_decimal(&self.size)?,
            price: parse_decimal(&self.price)?,
        }))
    }
}
