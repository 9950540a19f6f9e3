//! price-feeder - stream exchange prices and log them
//!
//! Usage: price-feeder [CONFIG_FILE]

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_feeder::config::FeederConfig;
use price_feeder::oracle::{new_provider, Provider};
use price_feeder::types::CurrencyPair;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PRICE_FEEDER_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = FeederConfig::load_from(config_path.as_deref())?;
    info!(config = %config, "Configuration loaded");

    let cancel = CancellationToken::new();
    let endpoints = config.provider_endpoints_map();
    let options = config.provider_options();

    let mut providers: Vec<(Arc<dyn Provider>, Vec<CurrencyPair>)> = Vec::new();
    for (name, pairs) in config.provider_pairs() {
        match new_provider(
            name,
            cancel.child_token(),
            endpoints.get(&name).cloned(),
            &pairs,
            options.clone(),
        )
        .await
        {
            Ok(provider) => providers.push((provider, pairs)),
            Err(e) => error!(provider = %name, error = %e, "Failed to create provider"),
        }
    }

    if providers.is_empty() {
        bail!("No provider could be started");
    }

    for (provider, _) in &providers {
        provider.start_connections();
    }
    info!(providers = providers.len(), "Price feeder running");

    let mut log_interval = interval(config.price_log_interval());
    log_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = log_interval.tick() => {
                for (provider, pairs) in &providers {
                    log_prices(provider.as_ref(), pairs);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    info!("Shutting down");
    for (provider, _) in &providers {
        provider.shutdown().await;
    }
    cancel.cancel();

    Ok(())
}

fn log_prices(provider: &dyn Provider, pairs: &[CurrencyPair]) {
    match provider.get_ticker_prices(pairs) {
        Ok(tickers) => {
            for (symbol, ticker) in tickers {
                info!(
                    provider = %provider.name(),
                    symbol = %symbol,
                    price = %ticker.price,
                    volume = %ticker.volume,
                    "Ticker"
                );
            }
        }
        Err(e) => warn!(provider = %provider.name(), error = %e, "No ticker prices yet"),
    }

    match provider.get_candle_prices(pairs) {
        Ok(candles) => {
            for (symbol, candles) in candles {
                if let Some(latest) = candles.iter().max_by_key(|c| c.timestamp) {
                    info!(
                        provider = %provider.name(),
                        symbol = %symbol,
                        close = %latest.price,
                        candles = candles.len(),
                        "Candle"
                    );
                }
            }
        }
        Err(e) => warn!(provider = %provider.name(), error = %e, "No candle prices yet"),
    }
}
