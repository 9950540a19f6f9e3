//! Normalized form of one websocket frame

use crate::oracle::telemetry::MessageType;
use crate::types::{CandlePrice, TickerPrice, Trade};

/// One price update extracted from a frame, keyed by canonical symbol
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Ticker { symbol: String, ticker: TickerPrice },
    Trade(Trade),
    Candle { symbol: String, candle: CandlePrice },
}

impl Update {
    pub fn symbol(&self) -> &str {
        match self {
            Update::Ticker { symbol, .. } | Update::Candle { symbol, .. } => symbol,
            Update::Trade(trade) => &trade.symbol,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Update::Ticker { .. } => MessageType::Ticker,
            Update::Trade(_) => MessageType::Trade,
            Update::Candle { .. } => MessageType::Candle,
        }
    }
}

/// What a frame turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFrame {
    /// Valid updates; fields that failed to parse have already been dropped.
    Updates(Vec<Update>),
    /// Subscription confirmations, acks, heartbeats.
    Control(String),
    /// Error reported by the exchange.
    Error(String),
    /// Well-formed but of a kind this provider does not consume.
    Unrecognized(String),
}
