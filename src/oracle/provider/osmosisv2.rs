//! Osmosis v2 price feed
//!
//! The server pushes every pair it tracks; frames are JSON objects keyed by
//! `BASE/QUOTE`. An object value is a ticker, an array value is a list of
//! candles. A bare `ack` frame confirms the connection.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{CandleSource, Exchange, WebsocketProvider};
use crate::error::{NormalizeError, ProviderError};
use crate::oracle::message::{ParsedFrame, Update};
use crate::types::{parse_decimal, CandlePrice, CurrencyPair, Endpoint, ProviderName, TickerPrice};

const OSMOSISV2_HOST: &str = "api.osmo-api.prod.network.umee.cc";
const OSMOSISV2_REST_HOST: &str = "https://api.osmo-api.prod.network.umee.cc";

pub type OsmosisV2Provider = WebsocketProvider<OsmosisV2>;

pub struct OsmosisV2;

#[derive(Debug, Clone, Deserialize)]
struct OsmosisV2Ticker {
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Volume")]
    volume: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OsmosisV2Candle {
    #[serde(rename = "Close")]
    close: String,
    #[serde(rename = "Volume")]
    volume: String,
    #[serde(rename = "EndTime")]
    end_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct OsmosisV2PairData {
    base: String,
    quote: String,
}

impl Exchange for OsmosisV2 {
    const NAME: ProviderName = ProviderName::OsmosisV2;
    const WEBSOCKET_PATH: &'static str = "/ws";
    const PAIRS_PATH: &'static str = "/assetpairs";
    const CANDLE_SOURCE: CandleSource = CandleSource::Candles;
    const SUBSCRIBE_BY_REQUEST: bool = false;

    fn default_endpoint() -> Endpoint {
        Endpoint {
            name: ProviderName::OsmosisV2,
            rest: OSMOSISV2_REST_HOST.to_string(),
            websocket: OSMOSISV2_HOST.to_string(),
            api_key: None,
        }
    }

    /// "ATOM/USDT"
    fn currency_pair_to_wire(pair: &CurrencyPair) -> String {
        format!("{}/{}", pair.base, pair.quote)
    }

    fn wire_to_currency_pair(symbol: &str) -> Option<CurrencyPair> {
        CurrencyPair::from_separated(symbol, '/')
    }

    /// The feed is push-only; an empty frame opens the stream.
    fn subscription_msgs(_pairs: &[CurrencyPair]) -> Vec<String> {
        vec![String::new()]
    }

    fn normalize(frame: &[u8]) -> Result<ParsedFrame, NormalizeError> {
        if frame == b"ack" {
            return Ok(ParsedFrame::Control("ack".to_string()));
        }

        let message: Value = serde_json::from_slice(frame)?;
        let Value::Object(entries) = message else {
            return Err(NormalizeError::Schema(
                "expected an object keyed by BASE/QUOTE".to_string(),
            ));
        };

        let mut updates = Vec::new();
        for (key, value) in entries {
            let Some(pair) = Self::wire_to_currency_pair(&key) else {
                continue;
            };
            let symbol = pair.symbol();

            match value {
                Value::Object(_) => match parse_ticker(value) {
                    Ok(ticker) => updates.push(Update::Ticker { symbol, ticker }),
                    Err(e) => warn!(
                        provider = %Self::NAME,
                        pair = %key,
                        error = %e,
                        "Dropping invalid ticker"
                    ),
                },
                Value::Array(candles) => {
                    for candle in candles {
                        match parse_candle(candle) {
                            Ok(candle) => updates.push(Update::Candle {
                                symbol: symbol.clone(),
                                candle,
                            }),
                            Err(e) => warn!(
                                provider = %Self::NAME,
                                pair = %key,
                                error = %e,
                                "Dropping invalid candle"
                            ),
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(ParsedFrame::Updates(updates))
    }

    fn parse_available_pairs(body: &[u8]) -> Result<Vec<CurrencyPair>, serde_json::Error> {
        let pairs: Vec<OsmosisV2PairData> = serde_json::from_slice(body)?;
        Ok(pairs
            .into_iter()
            .map(|p| CurrencyPair::new(p.base, p.quote))
            .collect())
    }
}

fn parse_ticker(value: Value) -> Result<TickerPrice, ProviderError> {
    let ticker: OsmosisV2Ticker = serde_json::from_value(value)?;
    TickerPrice::from_strs(&ticker.price, &ticker.volume)
}

fn parse_candle(value: Value) -> Result<CandlePrice, ProviderError> {
    let candle: OsmosisV2Candle = serde_json::from_value(value)?;
    Ok(CandlePrice {
        price: parse_decimal(&candle.close)?,
        volume: parse_decimal(&candle.volume)?,
        timestamp: candle.end_time,
    })
}
