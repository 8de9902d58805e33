use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::exec::order::Side;
use crate::market::PriceSource;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("venue request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no quote available for fill")]
    NoQuote,
    #[error("venue rejected order: {0}")]
    Rejected(String),
}

/// One executed (simulated or confirmed) fill.
#[derive(Debug, Clone)]
pub struct VenueFill {
    pub price: Decimal,
    pub quantity: Decimal,
    pub fill_id: Uuid,
}

/// Execution venue seam. The sim implementation fills synchronously at the
/// price source's current quote; the live one is a single best-effort network
/// call; retries, if any, belong to the collaborator behind the endpoint.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    async fn submit_market(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<VenueFill, VenueError>;

    /// Current quote, used for immediate-fill checks on limit orders.
    async fn last_price(&self, symbol: &str) -> Result<Decimal, VenueError>;
}

/// Paper venue: every market order fills fully at the quoted price.
pub struct SimVenue {
    feed: Arc<dyn PriceSource>,
}

impl SimVenue {
    pub fn new(feed: Arc<dyn PriceSource>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl ExecutionVenue for SimVenue {
    async fn submit_market(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<VenueFill, VenueError> {
        let price = self
            .feed
            .get_price(symbol)
            .await
            .map_err(|_| VenueError::NoQuote)?;

        info!("[VENUE][SIM] fill {} {:?} qty={} @ {}", symbol, side, quantity, price);

        Ok(VenueFill {
            price,
            quantity,
            fill_id: Uuid::new_v4(),
        })
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, VenueError> {
        self.feed.get_price(symbol).await.map_err(|_| VenueError::NoQuote)
    }
}

#[derive(Debug, Deserialize)]
struct LiveFillResponse {
    price: Decimal,
    quantity: Decimal,
}

/// Live venue: a single signed-off POST per order, no retry. Exchange-native
/// auth protocols are out of scope; the endpoint is an order bridge that
/// accepts a bearer key.
pub struct LiveVenue {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    feed: Arc<dyn PriceSource>,
}

impl LiveVenue {
    pub fn new(
        endpoint: String,
        api_key: String,
        feed: Arc<dyn PriceSource>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, endpoint, api_key, feed })
    }
}

#[async_trait]
impl ExecutionVenue for LiveVenue {
    async fn submit_market(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<VenueFill, VenueError> {
        let resp = self
            .http
            .post(format!("{}/orders/market", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "symbol": symbol,
                "side": side.as_str(),
                "quantity": quantity.to_string(),
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VenueError::Rejected(format!("{}: {}", status, body)));
        }

        let fill: LiveFillResponse = resp.json().await?;

        info!(
            "[VENUE][LIVE] fill {} {:?} qty={} @ {}",
            symbol, side, fill.quantity, fill.price
        );

        Ok(VenueFill {
            price: fill.price,
            quantity: fill.quantity,
            fill_id: Uuid::new_v4(),
        })
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, VenueError> {
        self.feed.get_price(symbol).await.map_err(|_| VenueError::NoQuote)
    }
}
