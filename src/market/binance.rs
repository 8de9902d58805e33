use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::exec::order::normalize_symbol;
use crate::market::{PriceSource, PriceUnavailable};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Spot ticker polling over REST. Every failure mode (network, HTTP status,
/// parse) collapses into `PriceUnavailable` so a flaky feed can only ever
/// skip ticks, not kill the loop.
pub struct BinanceFeed {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceFeed {
    pub fn new(base_url: Option<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fader/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[async_trait]
impl PriceSource for BinanceFeed {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, PriceUnavailable> {
        let symbol = normalize_symbol(symbol);
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("[FEED] ticker request failed for {}: {}", symbol, e);
                PriceUnavailable
            })?;

        let ticker: TickerPrice = resp.json().await.map_err(|e| {
            warn!("[FEED] ticker decode failed for {}: {}", symbol, e);
            PriceUnavailable
        })?;

        Decimal::from_str(&ticker.price).map_err(|e| {
            warn!("[FEED] bad price '{}' for {}: {}", ticker.price, symbol, e);
            PriceUnavailable
        })
    }
}
