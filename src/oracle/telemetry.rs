//! Per-provider feed health counters

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ProviderName;

/// Kind of update a frame carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ticker,
    Trade,
    Candle,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ticker => "ticker",
            MessageType::Trade => "trade",
            MessageType::Candle => "candle",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounts {
    pub ticker: u64,
    pub trade: u64,
    pub candle: u64,
}

#[derive(Debug)]
pub struct MessageCounters {
    provider: ProviderName,
    ticker: AtomicU64,
    trade: AtomicU64,
    candle: AtomicU64,
}

impl MessageCounters {
    pub fn new(provider: ProviderName) -> Self {
        Self {
            provider,
            ticker: AtomicU64::new(0),
            trade: AtomicU64::new(0),
            candle: AtomicU64::new(0),
        }
    }

    pub fn record(&self, message_type: MessageType) {
        let counter = match message_type {
            MessageType::Ticker => &self.ticker,
            MessageType::Trade => &self.trade,
            MessageType::Candle => &self.candle,
        };
        let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(
            provider = %self.provider,
            message_type = message_type.as_str(),
            total,
            "websocket message received"
        );
    }

    pub fn snapshot(&self) -> MessageCounts {
        MessageCounts {
            ticker: self.ticker.load(Ordering::Relaxed),
            trade: self.trade.load(Ordering::Relaxed),
            candle: self.candle.load(Ordering::Relaxed),
        }
    }
}
