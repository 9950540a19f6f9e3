//! Oracle module - exchange price providers
//!
//! Each provider keeps long-lived websocket connections to one exchange,
//! normalizes what it receives into tickers, trades and candles, and serves
//! the latest values to callers from an in-memory store.

mod candles;
mod controller;
mod message;
pub mod provider;
mod store;
mod telemetry;
mod websocket;

pub use candles::{candles_from_trades, CANDLE_WINDOW_MS};
pub use controller::WebsocketController;
pub use message::{ParsedFrame, Update};
pub use provider::{
    new_provider, Coinbase, CoinbaseProvider, Exchange, OsmosisV2, OsmosisV2Provider, PairsFetcher,
    Provider, ProviderOptions,
};
pub use store::{PriceStore, DEFAULT_CANDLE_PERIOD};
pub use telemetry::{MessageCounters, MessageCounts, MessageType};
pub use websocket::{ConnectionSettings, KeepAlive, ReconnectPolicy, WebsocketConnection};
