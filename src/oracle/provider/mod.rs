//! Provider facade and the per-exchange contract
//!
//! Every exchange integration is a [`WebsocketProvider`] parameterised by an
//! [`Exchange`]: the shared controller, store and subscription bookkeeping
//! live here, the exchange only supplies its wire format.

mod coinbase;
mod osmosisv2;

pub use coinbase::{Coinbase, CoinbaseProvider};
pub use osmosisv2::{OsmosisV2, OsmosisV2Provider};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{NormalizeError, ProviderError};
use crate::oracle::candles::candles_from_trades;
use crate::oracle::controller::WebsocketController;
use crate::oracle::message::{ParsedFrame, Update};
use crate::oracle::store::{PriceStore, DEFAULT_CANDLE_PERIOD};
use crate::oracle::telemetry::{MessageCounters, MessageCounts};
use crate::oracle::websocket::{ConnectionSettings, FrameHandler, KeepAlive};
use crate::types::{CandlePrice, CurrencyPair, Endpoint, ProviderName, TickerPrice};

/// What the aggregation layer sees of a provider
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Spawn the websocket workers. Must run inside a tokio runtime.
    fn start_connections(&self);

    /// Subscribe to pairs not yet streamed. Pairs the exchange does not list
    /// are skipped; returns the pairs actually added.
    async fn subscribe_currency_pairs(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<Vec<CurrencyPair>, ProviderError>;

    /// Latest ticker per canonical symbol. Missing pairs are omitted; errors
    /// only when none of `pairs` has data.
    fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<String, TickerPrice>, ProviderError>;

    /// Recent candles per canonical symbol, same partial-failure policy.
    fn get_candle_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<String, Vec<CandlePrice>>, ProviderError>;

    /// Every pair the exchange lists, as canonical symbols. Not cached.
    async fn get_available_pairs(&self) -> Result<HashSet<String>, ProviderError>;

    /// Stop all workers of this provider.
    async fn shutdown(&self);
}

/// Where an exchange's candles come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleSource {
    /// The exchange streams candles.
    Candles,
    /// Candles are bucketed from stored trades at query time.
    Trades,
}

/// Wire format and endpoints of one exchange
pub trait Exchange: Send + Sync + 'static {
    const NAME: ProviderName;
    const WEBSOCKET_PATH: &'static str;
    const PAIRS_PATH: &'static str;
    const CANDLE_SOURCE: CandleSource;
    /// False for push-only feeds where new pairs need no new subscription frame.
    const SUBSCRIBE_BY_REQUEST: bool;
    /// Cap on pairs per websocket; larger requests fan out over several workers.
    const MAX_PAIRS_PER_CONNECTION: Option<usize> = None;

    fn default_endpoint() -> Endpoint;

    fn keepalive() -> KeepAlive {
        KeepAlive::Ping
    }

    fn currency_pair_to_wire(pair: &CurrencyPair) -> String;

    fn wire_to_currency_pair(symbol: &str) -> Option<CurrencyPair>;

    fn subscription_msgs(pairs: &[CurrencyPair]) -> Vec<String>;

    fn normalize(frame: &[u8]) -> Result<ParsedFrame, NormalizeError>;

    fn parse_available_pairs(body: &[u8]) -> Result<Vec<CurrencyPair>, serde_json::Error>;
}

/// Fetches the REST listing of tradable pairs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairsFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

pub struct HttpPairsFetcher {
    client: reqwest::Client,
}

impl HttpPairsFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PairsFetcher for HttpPairsFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Construction options shared by all providers
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub connection: ConnectionSettings,
    pub candle_period: Duration,
    pub websocket_scheme: String,
    pub rest_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            candle_period: DEFAULT_CANDLE_PERIOD,
            websocket_scheme: "wss".to_string(),
            rest_timeout: Duration::from_secs(30),
        }
    }
}

/// State reachable from the frame callback
struct ProviderShared {
    name: ProviderName,
    store: PriceStore,
    subscribed: RwLock<HashMap<String, CurrencyPair>>,
    counters: MessageCounters,
}

impl ProviderShared {
    fn is_subscribed(&self, symbol: &str) -> bool {
        self.subscribed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(symbol)
    }

    fn handle_frame<E: Exchange>(&self, frame: &[u8]) {
        match E::normalize(frame) {
            Ok(ParsedFrame::Updates(updates)) => {
                for update in updates {
                    self.apply(update);
                }
            }
            Ok(ParsedFrame::Control(kind)) => {
                debug!(provider = %self.name, kind = %kind, "Control message");
            }
            Ok(ParsedFrame::Error(reason)) => {
                error!(provider = %self.name, reason = %reason, "Exchange reported error");
            }
            Ok(ParsedFrame::Unrecognized(kind)) => {
                debug!(provider = %self.name, kind = %kind, "Skipping unrecognized message");
            }
            Err(e) => {
                warn!(
                    provider = %self.name,
                    length = frame.len(),
                    error = %e,
                    "Failed to parse websocket message"
                );
            }
        }
    }

    fn apply(&self, update: Update) {
        if !self.is_subscribed(update.symbol()) {
            debug!(provider = %self.name, symbol = update.symbol(), "Update for unsubscribed pair");
            return;
        }
        self.counters.record(update.message_type());
        match update {
            Update::Ticker { symbol, ticker } => self.store.set_ticker(&symbol, ticker),
            Update::Trade(trade) => self.store.set_trade(trade),
            Update::Candle { symbol, candle } => self.store.set_candle(&symbol, candle),
        }
    }
}

pub struct WebsocketProvider<E: Exchange> {
    endpoint: Endpoint,
    shared: Arc<ProviderShared>,
    controller: WebsocketController,
    fetcher: Arc<dyn PairsFetcher>,
    _exchange: PhantomData<E>,
}

impl<E: Exchange> WebsocketProvider<E> {
    /// Confirm `pairs` against the exchange listing and register the initial
    /// websocket connection(s). Nothing connects until `start_connections`.
    pub async fn new(
        cancel: CancellationToken,
        endpoint: Option<Endpoint>,
        pairs: &[CurrencyPair],
        options: ProviderOptions,
    ) -> Result<Self, ProviderError> {
        let fetcher = Arc::new(HttpPairsFetcher::new(options.rest_timeout)?);
        Self::with_fetcher(cancel, endpoint, pairs, options, fetcher).await
    }

    pub async fn with_fetcher(
        cancel: CancellationToken,
        endpoint: Option<Endpoint>,
        pairs: &[CurrencyPair],
        options: ProviderOptions,
        fetcher: Arc<dyn PairsFetcher>,
    ) -> Result<Self, ProviderError> {
        let endpoint = resolve_endpoint::<E>(endpoint);
        let url = format!(
            "{}://{}{}",
            options.websocket_scheme,
            endpoint.websocket,
            E::WEBSOCKET_PATH
        );

        let provider = Self {
            shared: Arc::new(ProviderShared {
                name: E::NAME,
                store: PriceStore::new(E::NAME, options.candle_period),
                subscribed: RwLock::new(HashMap::new()),
                counters: MessageCounters::new(E::NAME),
            }),
            controller: WebsocketController::new(E::NAME, url, options.connection, cancel),
            endpoint,
            fetcher,
            _exchange: PhantomData,
        };

        let confirmed = provider.confirm_pair_availability(pairs).await?;
        provider.set_subscribed_pairs(&confirmed);

        if E::SUBSCRIBE_BY_REQUEST {
            provider.add_connections(&confirmed);
        } else {
            provider.controller.add_connection(
                E::subscription_msgs(&confirmed),
                provider.frame_handler(),
                E::keepalive(),
            );
        }

        info!(
            provider = %E::NAME,
            pairs = confirmed.len(),
            url = %provider.controller.url(),
            "Provider initialized"
        );
        Ok(provider)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn subscribed_pairs(&self) -> Vec<CurrencyPair> {
        let subscribed = self
            .shared
            .subscribed
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        subscribed.values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.controller.connection_count()
    }

    pub fn message_counts(&self) -> MessageCounts {
        self.shared.counters.snapshot()
    }

    /// Feed one raw frame through the normalizer into the store, exactly as a
    /// websocket worker would.
    pub fn handle_frame(&self, frame: &[u8]) {
        self.shared.handle_frame::<E>(frame);
    }

    fn frame_handler(&self) -> FrameHandler {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |frame: &[u8]| shared.handle_frame::<E>(frame))
    }

    fn add_connections(&self, pairs: &[CurrencyPair]) {
        for chunk in chunk_pairs(pairs, E::MAX_PAIRS_PER_CONNECTION) {
            self.controller.add_connection(
                E::subscription_msgs(chunk),
                self.frame_handler(),
                E::keepalive(),
            );
        }
    }

    fn set_subscribed_pairs(&self, pairs: &[CurrencyPair]) -> Vec<CurrencyPair> {
        let mut subscribed = self
            .shared
            .subscribed
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        pairs
            .iter()
            .filter(|pair| subscribed.insert(pair.symbol(), (*pair).clone()).is_none())
            .cloned()
            .collect()
    }

    async fn confirm_pair_availability(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<Vec<CurrencyPair>, ProviderError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let available = self.get_available_pairs().await?;
        Ok(confirm_pairs(E::NAME, &available, pairs))
    }
}

#[async_trait]
impl<E: Exchange> Provider for WebsocketProvider<E> {
    fn name(&self) -> ProviderName {
        E::NAME
    }

    fn start_connections(&self) {
        self.controller.start_connections();
    }

    async fn subscribe_currency_pairs(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<Vec<CurrencyPair>, ProviderError> {
        let mut seen = HashSet::new();
        let new_pairs: Vec<CurrencyPair> = pairs
            .iter()
            .filter(|pair| !self.shared.is_subscribed(&pair.symbol()))
            .filter(|pair| seen.insert(pair.symbol()))
            .cloned()
            .collect();
        if new_pairs.is_empty() {
            return Ok(Vec::new());
        }

        let confirmed = self.confirm_pair_availability(&new_pairs).await?;
        // A concurrent call may have added some of these meanwhile
        let added = self.set_subscribed_pairs(&confirmed);
        if E::SUBSCRIBE_BY_REQUEST && !added.is_empty() {
            self.add_connections(&added);
        }

        info!(
            provider = %E::NAME,
            requested = pairs.len(),
            added = added.len(),
            "Subscribed currency pairs"
        );
        Ok(added)
    }

    fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<String, TickerPrice>, ProviderError> {
        let mut prices = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            match self.shared.store.ticker(&pair.symbol()) {
                Ok(ticker) => {
                    prices.insert(pair.symbol(), ticker);
                }
                Err(e) => warn!(provider = %E::NAME, error = %e, "Missing ticker"),
            }
        }

        if prices.is_empty() {
            return Err(ProviderError::NoTickers {
                provider: E::NAME,
                pairs: pairs.to_vec(),
            });
        }
        Ok(prices)
    }

    fn get_candle_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<String, Vec<CandlePrice>>, ProviderError> {
        let mut candles = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            let symbol = pair.symbol();
            let found = match E::CANDLE_SOURCE {
                CandleSource::Candles => self.shared.store.candles(&symbol),
                CandleSource::Trades => self
                    .shared
                    .store
                    .trades(&symbol)
                    .map(|trades| candles_from_trades(&trades)),
            };
            match found {
                Ok(list) => {
                    candles.insert(symbol, list);
                }
                Err(e) => warn!(provider = %E::NAME, error = %e, "Missing candles"),
            }
        }

        if candles.is_empty() {
            return Err(ProviderError::NoCandles {
                provider: E::NAME,
                pairs: pairs.to_vec(),
            });
        }
        Ok(candles)
    }

    async fn get_available_pairs(&self) -> Result<HashSet<String>, ProviderError> {
        let url = format!("{}{}", self.endpoint.rest, E::PAIRS_PATH);
        let availability_error = |reason: String| ProviderError::AvailablePairs {
            provider: E::NAME,
            reason,
        };

        let body = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| availability_error(e.to_string()))?;
        let pairs =
            E::parse_available_pairs(&body).map_err(|e| availability_error(e.to_string()))?;

        Ok(pairs.iter().map(|pair| pair.symbol().to_uppercase()).collect())
    }

    async fn shutdown(&self) {
        self.controller.shutdown().await;
    }
}

/// Keep the configured endpoint only if it belongs to this exchange.
pub fn resolve_endpoint<E: Exchange>(endpoint: Option<Endpoint>) -> Endpoint {
    match endpoint {
        Some(endpoint) if endpoint.name == E::NAME => endpoint,
        _ => E::default_endpoint(),
    }
}

/// Pairs of `pairs` present in `available`; the rest are logged and dropped.
pub fn confirm_pairs(
    provider: ProviderName,
    available: &HashSet<String>,
    pairs: &[CurrencyPair],
) -> Vec<CurrencyPair> {
    pairs
        .iter()
        .filter(|pair| {
            let listed = available.contains(&pair.symbol());
            if !listed {
                warn!(
                    provider = %provider,
                    pair = %pair,
                    "Pair not available on provider; skipping"
                );
            }
            listed
        })
        .cloned()
        .collect()
}

fn chunk_pairs(pairs: &[CurrencyPair], max: Option<usize>) -> Vec<&[CurrencyPair]> {
    if pairs.is_empty() {
        return Vec::new();
    }
    match max {
        Some(size) if size > 0 => pairs.chunks(size).collect(),
        _ => vec![pairs],
    }
}

/// Build any supported provider behind the facade trait.
pub async fn new_provider(
    name: ProviderName,
    cancel: CancellationToken,
    endpoint: Option<Endpoint>,
    pairs: &[CurrencyPair],
    options: ProviderOptions,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match name {
        ProviderName::Coinbase => {
            Arc::new(CoinbaseProvider::new(cancel, endpoint, pairs, options).await?)
        }
        ProviderName::OsmosisV2 => {
            Arc::new(OsmosisV2Provider::new(cancel, endpoint, pairs, options).await?)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const COINBASE_PRODUCTS: &str = r#"[
        {"id": "ATOM-USDT", "base_currency": "ATOM", "quote_currency": "USDT"},
        {"id": "BTC-USD", "base_currency": "BTC", "quote_currency": "USD"}
    ]"#;

    const OSMOSIS_PAIRS: &str = r#"[
        {"base": "ATOM", "quote": "USDT"},
        {"base": "OSMO", "quote": "ATOM"}
    ]"#;

    fn pair(base: &str, quote: &str) -> CurrencyPair {
        CurrencyPair::new(base, quote)
    }

    fn fetcher_returning(body: &'static str, times: usize) -> Arc<dyn PairsFetcher> {
        let mut fetcher = MockPairsFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url.ends_with("api.exchange.coinbase.com/products"))
            .times(times)
            .returning(move |_| Ok(body.as_bytes().to_vec()));
        Arc::new(fetcher)
    }

    async fn coinbase(pairs: &[CurrencyPair], fetcher: Arc<dyn PairsFetcher>) -> CoinbaseProvider {
        CoinbaseProvider::with_fetcher(
            CancellationToken::new(),
            None,
            pairs,
            ProviderOptions::default(),
            fetcher,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_available_pairs_fetched_on_every_call() {
        let provider = coinbase(&[], fetcher_returning(COINBASE_PRODUCTS, 2)).await;

        let first = provider.get_available_pairs().await.unwrap();
        let second = provider.get_available_pairs().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            HashSet::from(["ATOMUSDT".to_string(), "BTCUSD".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unavailable_pair_is_skipped_on_subscribe() {
        let provider =
            coinbase(&[pair("ATOM", "USDT")], fetcher_returning(COINBASE_PRODUCTS, 2)).await;
        assert_eq!(provider.connection_count(), 1);

        let added = provider
            .subscribe_currency_pairs(&[
                pair("ATOM", "USDT"),
                pair("BTC", "USD"),
                pair("FOO", "BAR"),
            ])
            .await
            .unwrap();

        assert_eq!(added, vec![pair("BTC", "USD")]);
        let mut subscribed: Vec<String> =
            provider.subscribed_pairs().iter().map(CurrencyPair::symbol).collect();
        subscribed.sort();
        assert_eq!(subscribed, vec!["ATOMUSDT", "BTCUSD"]);
        assert_eq!(provider.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_already_subscribed_pairs_skip_rest_call() {
        // Only the constructor hits the listing
        let provider =
            coinbase(&[pair("ATOM", "USDT")], fetcher_returning(COINBASE_PRODUCTS, 1)).await;

        let added = provider
            .subscribe_currency_pairs(&[pair("atom", "usdt")])
            .await
            .unwrap();
        assert!(added.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_fails_construction() {
        let mut fetcher = MockPairsFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Err(ProviderError::AvailablePairs {
                provider: ProviderName::Coinbase,
                reason: "connection refused".to_string(),
            })
        });

        let result = CoinbaseProvider::with_fetcher(
            CancellationToken::new(),
            None,
            &[pair("ATOM", "USDT")],
            ProviderOptions::default(),
            Arc::new(fetcher),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::AvailablePairs { .. })));
    }

    #[tokio::test]
    async fn test_ticker_partial_and_total_failure() {
        let provider =
            coinbase(&[pair("ATOM", "USDT")], fetcher_returning(COINBASE_PRODUCTS, 1)).await;
        provider.handle_frame(
            br#"{"type":"ticker","product_id":"ATOM-USDT","price":"10.5","volume_24h":"1000"}"#,
        );

        let prices = provider
            .get_ticker_prices(&[pair("ATOM", "USDT"), pair("BTC", "USD")])
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["ATOMUSDT"].price, dec!(10.5));
        assert!(!prices.contains_key("BTCUSD"));

        let err = provider.get_ticker_prices(&[pair("BTC", "USD")]).unwrap_err();
        assert!(matches!(err, ProviderError::NoTickers { provider: ProviderName::Coinbase, .. }));
        assert!(err.to_string().contains("BTCUSD"));
    }

    #[tokio::test]
    async fn test_trade_candles_partial_and_total_failure() {
        let provider =
            coinbase(&[pair("ATOM", "USDT")], fetcher_returning(COINBASE_PRODUCTS, 1)).await;
        let time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        provider.handle_frame(
            format!(
                r#"{{"type":"match","product_id":"ATOM-USDT",
                    "size":"2","price":"10.4","time":"{time}"}}"#
            )
            .as_bytes(),
        );

        let candles = provider
            .get_candle_prices(&[pair("ATOM", "USDT"), pair("BTC", "USD")])
            .unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles["ATOMUSDT"][0].price, dec!(10.4));
        assert_eq!(candles["ATOMUSDT"][0].volume, dec!(2));

        let err = provider
            .get_candle_prices(&[pair("BTC", "USD"), pair("OSMO", "ATOM")])
            .unwrap_err();
        match &err {
            ProviderError::NoCandles { provider, pairs } => {
                assert_eq!(*provider, ProviderName::Coinbase);
                assert_eq!(pairs, &vec![pair("BTC", "USD"), pair("OSMO", "ATOM")]);
            }
            other => panic!("expected NoCandles, got {other:?}"),
        }
        assert!(err.to_string().contains("[BTCUSD, OSMOATOM]"));
    }

    #[tokio::test]
    async fn test_streamed_candles_partial_and_total_failure() {
        let mut fetcher = MockPairsFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url.ends_with("/assetpairs"))
            .times(1)
            .returning(|_| Ok(OSMOSIS_PAIRS.as_bytes().to_vec()));
        let provider = OsmosisV2Provider::with_fetcher(
            CancellationToken::new(),
            None,
            &[pair("ATOM", "USDT")],
            ProviderOptions::default(),
            Arc::new(fetcher),
        )
        .await
        .unwrap();

        let end_time = crate::types::now_millis();
        provider.handle_frame(
            format!(r#"{{"ATOM/USDT": [{{"Close":"10.4","Volume":"5","EndTime":{end_time}}}]}}"#)
                .as_bytes(),
        );

        let candles = provider
            .get_candle_prices(&[pair("ATOM", "USDT"), pair("OSMO", "ATOM")])
            .unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles["ATOMUSDT"][0].timestamp, end_time);

        let err = provider.get_candle_prices(&[pair("OSMO", "ATOM")]).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::NoCandles {
                provider: ProviderName::OsmosisV2,
                ..
            }
        ));
        assert!(err.to_string().contains("OSMOATOM"));
    }

    /// Coinbase wire format with at most two pairs per socket
    struct CappedCoinbase;

    impl Exchange for CappedCoinbase {
        const NAME: ProviderName = ProviderName::Coinbase;
        const WEBSOCKET_PATH: &'static str = "";
        const PAIRS_PATH: &'static str = "/products";
        const CANDLE_SOURCE: CandleSource = CandleSource::Trades;
        const SUBSCRIBE_BY_REQUEST: bool = true;
        const MAX_PAIRS_PER_CONNECTION: Option<usize> = Some(2);

        fn default_endpoint() -> Endpoint {
            Coinbase::default_endpoint()
        }

        fn currency_pair_to_wire(pair: &CurrencyPair) -> String {
            Coinbase::currency_pair_to_wire(pair)
        }

        fn wire_to_currency_pair(symbol: &str) -> Option<CurrencyPair> {
            Coinbase::wire_to_currency_pair(symbol)
        }

        fn subscription_msgs(pairs: &[CurrencyPair]) -> Vec<String> {
            Coinbase::subscription_msgs(pairs)
        }

        fn normalize(frame: &[u8]) -> Result<ParsedFrame, NormalizeError> {
            Coinbase::normalize(frame)
        }

        fn parse_available_pairs(body: &[u8]) -> Result<Vec<CurrencyPair>, serde_json::Error> {
            Coinbase::parse_available_pairs(body)
        }
    }

    const MANY_PRODUCTS: &str = r#"[
        {"base_currency": "T0", "quote_currency": "USD"},
        {"base_currency": "T1", "quote_currency": "USD"},
        {"base_currency": "T2", "quote_currency": "USD"},
        {"base_currency": "T3", "quote_currency": "USD"},
        {"base_currency": "T4", "quote_currency": "USD"},
        {"base_currency": "T5", "quote_currency": "USD"},
        {"base_currency": "T6", "quote_currency": "USD"},
        {"base_currency": "T7", "quote_currency": "USD"}
    ]"#;

    #[tokio::test]
    async fn test_capped_exchange_fans_out_connections() {
        let pairs: Vec<CurrencyPair> = (0..8).map(|i| pair(&format!("T{i}"), "USD")).collect();
        let provider = WebsocketProvider::<CappedCoinbase>::with_fetcher(
            CancellationToken::new(),
            None,
            &pairs[..5],
            ProviderOptions::default(),
            fetcher_returning(MANY_PRODUCTS, 2),
        )
        .await
        .unwrap();

        // 5 pairs at 2 per socket
        assert_eq!(provider.connection_count(), 3);

        let added = provider.subscribe_currency_pairs(&pairs[3..]).await.unwrap();
        assert_eq!(added, pairs[5..].to_vec());
        // 3 new pairs at 2 per socket
        assert_eq!(provider.connection_count(), 5);
        assert_eq!(provider.subscribed_pairs().len(), 8);
    }

    #[test]
    fn test_endpoint_falls_back_to_defaults() {
        let foreign = Endpoint {
            name: ProviderName::OsmosisV2,
            rest: "https://example.com".to_string(),
            websocket: "example.com".to_string(),
            api_key: None,
        };
        assert_eq!(
            resolve_endpoint::<Coinbase>(Some(foreign.clone())),
            Coinbase::default_endpoint()
        );
        assert_eq!(resolve_endpoint::<Coinbase>(None), Coinbase::default_endpoint());
        assert_eq!(resolve_endpoint::<OsmosisV2>(Some(foreign.clone())), foreign);
    }

    #[test]
    fn test_chunk_pairs() {
        let pairs: Vec<CurrencyPair> = (0..5).map(|i| pair(&format!("T{i}"), "USD")).collect();
        assert_eq!(chunk_pairs(&pairs, None).len(), 1);
        let chunks = chunk_pairs(&pairs, Some(2));
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert!(chunk_pairs(&[], Some(2)).is_empty());
    }
}
