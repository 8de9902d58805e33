use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, Mode};
use crate::exec::order::{ClientOrderId, OrderResult, Side};
use crate::exec::venue::{ExecutionVenue, LiveVenue, SimVenue};
use crate::exec::OrderRouter;
use crate::market::binance::BinanceFeed;
use crate::market::PriceSource;
use crate::paper::{EngineStatus, LoopParams, PaperEngine};
use crate::risk::{RiskEngine, RiskParams, RiskParamsUpdate, RiskSummary};

/// Combined view for status queries; served even while halted.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub engine: EngineStatus,
    pub risk: RiskSummary,
}

/// One trading session: the aggregate owning the risk engine, the order
/// router, and the paper loop. Everything the request-handling boundary
/// needs hangs off this value; no module-level singletons.
pub struct TradingSession {
    risk: Arc<Mutex<RiskEngine>>,
    router: Arc<OrderRouter>,
    engine: PaperEngine,
}

impl TradingSession {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let feed: Arc<dyn PriceSource> = Arc::new(BinanceFeed::new(
            cfg.binance_base_url.clone(),
            cfg.request_timeout,
        )?);

        let venue: Arc<dyn ExecutionVenue> = match cfg.mode {
            Mode::Paper => Arc::new(SimVenue::new(feed.clone())),
            Mode::Live => {
                // validated at config time; double-checked here because this
                // is the last gate before a live order could exist
                let endpoint = cfg
                    .venue_endpoint
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("live mode without venue endpoint"))?;
                let api_key = cfg
                    .venue_api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("live mode without venue api key"))?;
                Arc::new(LiveVenue::new(endpoint, api_key, feed.clone(), cfg.request_timeout)?)
            }
        };

        let mut risk_engine = RiskEngine::new(cfg.risk.clone());
        if cfg.kill_switch {
            risk_engine.set_kill_switch(true, "set at startup");
        }
        Ok(Self::with_risk_engine(feed, venue, risk_engine))
    }

    pub fn new(
        feed: Arc<dyn PriceSource>,
        venue: Arc<dyn ExecutionVenue>,
        risk_params: RiskParams,
    ) -> Self {
        Self::with_risk_engine(feed, venue, RiskEngine::new(risk_params))
    }

    fn with_risk_engine(
        feed: Arc<dyn PriceSource>,
        venue: Arc<dyn ExecutionVenue>,
        risk_engine: RiskEngine,
    ) -> Self {
        let start_equity = risk_engine.equity();
        let risk = Arc::new(Mutex::new(risk_engine));
        let router = Arc::new(OrderRouter::new(venue, risk.clone()));
        let engine = PaperEngine::new(feed, router.clone(), risk.clone(), start_equity);
        Self { risk, router, engine }
    }

    /* ---------- Loop control ---------- */

    pub async fn start(&self, params: LoopParams) -> EngineStatus {
        self.engine.start(params).await
    }

    pub async fn stop(&self) -> EngineStatus {
        self.engine.stop().await
    }

    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            engine: self.engine.status().await,
            risk: self.risk.lock().await.summary(),
        }
    }

    pub async fn reset_accounting(&self) -> EngineStatus {
        self.engine.reset_accounting().await
    }

    /* ---------- Risk operations ---------- */

    pub async fn set_risk(&self, update: RiskParamsUpdate) -> RiskSummary {
        let mut risk = self.risk.lock().await;
        risk.set_params(update);
        risk.summary()
    }

    pub async fn set_kill_switch(&self, active: bool, reason: &str) -> RiskSummary {
        let mut risk = self.risk.lock().await;
        risk.set_kill_switch(active, reason);
        risk.summary()
    }

    pub async fn reset_daily(&self) -> RiskSummary {
        let mut risk = self.risk.lock().await;
        risk.reset_daily();
        risk.summary()
    }

    /* ---------- Manual order flow ---------- */

    /// Manual submissions share the loop's router and risk gate. When the
    /// caller supplies no idempotency key, each call is its own order; when
    /// no risk estimate, the trade is sized at the current per-trade limit.
    pub async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        idempotency_key: Option<String>,
        est_risk: Option<Decimal>,
    ) -> OrderResult {
        let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        let est_risk = match est_risk {
            Some(v) => v,
            None => self.risk.lock().await.allowed_risk_per_trade(),
        };
        info!("[SESSION] manual market order {} {:?} qty={}", symbol, side, quantity);
        self.router
            .submit_market(symbol, side, quantity, &key, est_risk)
            .await
    }

    pub async fn submit_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        idempotency_key: Option<String>,
        est_risk: Option<Decimal>,
    ) -> OrderResult {
        let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        let est_risk = match est_risk {
            Some(v) => v,
            None => self.risk.lock().await.allowed_risk_per_trade(),
        };
        info!(
            "[SESSION] manual limit order {} {:?} qty={} limit={}",
            symbol, side, quantity, limit_price
        );
        self.router
            .submit_limit(symbol, side, quantity, limit_price, &key, est_risk)
            .await
    }

    pub async fn submit_oco_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        idempotency_key: Option<String>,
    ) -> OrderResult {
        let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.router
            .submit_oco_stub(symbol, side, quantity, limit_price, &key)
            .await
    }

    pub async fn list_orders(&self) -> Vec<OrderResult> {
        self.router.list_orders().await
    }

    pub async fn get_order(&self, id: &ClientOrderId) -> Option<OrderResult> {
        self.router.get_order(id).await
    }
}
