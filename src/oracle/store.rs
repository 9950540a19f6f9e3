//! Price Store - per-provider latest tickers and time-windowed candles/trades
//!
//! One store per provider instance. The provider's frame callback is the
//! only writer; facade queries read concurrently. Staleness is enforced
//! lazily: a list is filtered only when its own symbol is written.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::error::ProviderError;
use crate::types::{now_millis, CandlePrice, ProviderName, TickerPrice, Trade};

/// Default lookback for candles and trades
pub const DEFAULT_CANDLE_PERIOD: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Default)]
struct StoreInner {
    tickers: HashMap<String, TickerPrice>,
    candles: HashMap<String, Vec<CandlePrice>>,
    trades: HashMap<String, Vec<Trade>>,
}

#[derive(Debug)]
pub struct PriceStore {
    provider: ProviderName,
    candle_period_ms: i64,
    inner: RwLock<StoreInner>,
}

impl PriceStore {
    pub fn new(provider: ProviderName, candle_period: Duration) -> Self {
        Self {
            provider,
            candle_period_ms: candle_period.as_millis() as i64,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn candle_period(&self) -> Duration {
        Duration::from_millis(self.candle_period_ms as u64)
    }

    /// Upsert, last write wins.
    pub fn set_ticker(&self, symbol: &str, ticker: TickerPrice) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.tickers.insert(symbol.to_string(), ticker);
    }

    pub fn set_candle(&self, symbol: &str, candle: CandlePrice) {
        self.set_candle_at(symbol, candle, now_millis());
    }

    /// Prepend `candle` and drop every entry at or before `now_ms - candle_period`.
    pub fn set_candle_at(&self, symbol: &str, candle: CandlePrice, now_ms: i64) {
        let stale_before = now_ms - self.candle_period_ms;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let list = inner.candles.entry(symbol.to_string()).or_default();
        prepend_fresh(list, candle, |c| c.timestamp > stale_before);
    }

    pub fn set_trade(&self, trade: Trade) {
        self.set_trade_at(trade, now_millis());
    }

    /// Same eviction policy as candles.
    pub fn set_trade_at(&self, trade: Trade, now_ms: i64) {
        let stale_before = now_ms - self.candle_period_ms;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let list = inner.trades.entry(trade.symbol.clone()).or_default();
        prepend_fresh(list, trade, |t| t.timestamp > stale_before);
    }

    pub fn ticker(&self, symbol: &str) -> Result<TickerPrice, ProviderError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .tickers
            .get(symbol)
            .copied()
            .ok_or_else(|| ProviderError::TickerNotFound {
                provider: self.provider,
                symbol: symbol.to_string(),
            })
    }

    /// Newest first.
    pub fn candles(&self, symbol: &str) -> Result<Vec<CandlePrice>, ProviderError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .candles
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::CandleNotFound {
                provider: self.provider,
                symbol: symbol.to_string(),
            })
    }

    /// Newest first.
    pub fn trades(&self, symbol: &str) -> Result<Vec<Trade>, ProviderError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .trades
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::CandleNotFound {
                provider: self.provider,
                symbol: symbol.to_string(),
            })
    }
}

fn prepend_fresh<T>(list: &mut Vec<T>, item: T, keep: impl Fn(&T) -> bool) {
    list.retain(|existing| keep(existing));
    list.insert(0, item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const MINUTE: i64 = 60_000;

    fn candle(price: rust_decimal::Decimal, timestamp: i64) -> CandlePrice {
        CandlePrice {
            price,
            volume: dec!(1),
            timestamp,
        }
    }

    fn store() -> PriceStore {
        PriceStore::new(ProviderName::OsmosisV2, DEFAULT_CANDLE_PERIOD)
    }

    #[test]
    fn test_ticker_last_write_wins() {
        let store = store();
        assert!(matches!(
            store.ticker("ATOMUSDT"),
            Err(ProviderError::TickerNotFound { .. })
        ));

        store.set_ticker("ATOMUSDT", TickerPrice { price: dec!(10), volume: dec!(1) });
        store.set_ticker("ATOMUSDT", TickerPrice { price: dec!(10.5), volume: dec!(1000) });

        let ticker = store.ticker("ATOMUSDT").unwrap();
        assert_eq!(ticker.price, dec!(10.5));
        assert_eq!(ticker.volume, dec!(1000));
    }

    #[test]
    fn test_candles_are_newest_first() {
        let store = store();
        let now = 100 * MINUTE;
        store.set_candle_at("ATOMUSDT", candle(dec!(1), now - 2 * MINUTE), now);
        store.set_candle_at("ATOMUSDT", candle(dec!(2), now - MINUTE), now);
        store.set_candle_at("ATOMUSDT", candle(dec!(3), now), now);

        let prices: Vec<_> = store
            .candles("ATOMUSDT")
            .unwrap()
            .iter()
            .map(|c| c.price)
            .collect();
        assert_eq!(prices, vec![dec!(3), dec!(2), dec!(1)]);
    }

    #[test]
    fn test_stale_candles_are_dropped_on_write() {
        let store = store();
        let start = 100 * MINUTE;
        store.set_candle_at("ATOMUSDT", candle(dec!(1), start), start);
        store.set_candle_at("ATOMUSDT", candle(dec!(2), start + 5 * MINUTE), start + 5 * MINUTE);

        let later = start + 16 * MINUTE;
        store.set_candle_at("ATOMUSDT", candle(dec!(3), later), later);

        let candles = store.candles("ATOMUSDT").unwrap();
        assert_eq!(candles.len(), 2);
        let cutoff = later - DEFAULT_CANDLE_PERIOD.as_millis() as i64;
        assert!(candles[1..].iter().all(|c| c.timestamp > cutoff));
    }

    #[test]
    fn test_staleness_is_lazy_per_symbol() {
        let store = store();
        let start = 100 * MINUTE;
        store.set_candle_at("ATOMUSDT", candle(dec!(1), start), start);
        store.set_candle_at("OSMOUSDT", candle(dec!(1), start + 60 * MINUTE), start + 60 * MINUTE);

        // Untouched symbol keeps its old data
        assert_eq!(store.candles("ATOMUSDT").unwrap().len(), 1);
    }

    #[test]
    fn test_trades_follow_candle_eviction() {
        let store = store();
        let start = 100 * MINUTE;
        let trade = |ts| Trade {
            symbol: "ATOMUSDT".to_string(),
            timestamp: ts,
            size: dec!(1),
            price: dec!(14.02),
        };

        store.set_trade_at(trade(start), start);
        store.set_trade_at(trade(start + 20 * MINUTE), start + 20 * MINUTE);

        let trades = store.trades("ATOMUSDT").unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].timestamp, start + 20 * MINUTE);
        assert!(store.trades("OSMOUSDT").is_err());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = Arc::new(store());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let ticker = TickerPrice {
                        price: dec!(1) + rust_decimal::Decimal::from(i),
                        volume: dec!(1),
                    };
                    store.set_ticker("ATOMUSDT", ticker);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let _ = store.ticker("ATOMUSDT");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.ticker("ATOMUSDT").unwrap().price, dec!(500));
    }
}
