//! Candle bucketing for providers that only stream raw trades
//!
//! Trades are cut into one-minute windows at query time. A window opens at
//! the first trade after the previous window has run for more than a minute,
//! accumulates size as volume and keeps the price/timestamp of its latest
//! trade.

use rust_decimal::Decimal;

use crate::types::{CandlePrice, Trade};

/// Length of one bucket in milliseconds
pub const CANDLE_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone)]
struct BuildingCandle {
    start_ts: i64,
    close: Decimal,
    volume: Decimal,
    end_ts: i64,
}

impl BuildingCandle {
    fn new(trade: &Trade) -> Self {
        Self {
            start_ts: trade.timestamp,
            close: trade.price,
            volume: trade.size,
            end_ts: trade.timestamp,
        }
    }

    fn update(&mut self, trade: &Trade) {
        self.close = trade.price;
        self.volume += trade.size;
        self.end_ts = trade.timestamp;
    }

    fn finalize(&self) -> CandlePrice {
        CandlePrice {
            price: self.close,
            volume: self.volume,
            timestamp: self.end_ts,
        }
    }
}

/// Bucket trades (any order) into candles, oldest first.
pub fn candles_from_trades(trades: &[Trade]) -> Vec<CandlePrice> {
    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    let mut candles = Vec::new();
    let mut current: Option<BuildingCandle> = None;

    for trade in sorted {
        match current.as_mut() {
            Some(building) if trade.timestamp - building.start_ts <= CANDLE_WINDOW_MS => {
                building.update(trade);
            }
            _ => {
                if let Some(done) = current.take() {
                    candles.push(done.finalize());
                }
                current = Some(BuildingCandle::new(trade));
            }
        }
    }

    if let Some(done) = current {
        candles.push(done.finalize());
    }
    candles
}
