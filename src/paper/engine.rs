use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::exec::order::{OrderStatus, Side};
use crate::exec::OrderRouter;
use crate::market::PriceSource;
use crate::paper::ledger::Ledger;
use crate::risk::RiskEngine;

/// Floor on the tick period so a misconfigured interval cannot hammer the
/// price source.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(250);

const PRICE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct LoopParams {
    pub symbol: String,
    pub interval_ms: u64,
    pub threshold_bps: Decimal,
    pub trade_qty: Decimal,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval_ms: 2000,
            threshold_bps: dec!(15),
            trade_qty: dec!(0.001),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub params: LoopParams,
    pub ledger: Ledger,
    pub ticks: u64,
}

struct LoopState {
    running: bool,
    params: LoopParams,
    ledger: Ledger,
    ticks: u64,
}

struct Control {
    task: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

/// The periodic decision loop for one symbol: price → signal → risk gate →
/// router → ledger. All mutation happens inside the tick, serialized by the
/// loop task; status readers take the same lock and always see a consistent
/// snapshot.
pub struct PaperEngine {
    feed: Arc<dyn PriceSource>,
    router: Arc<OrderRouter>,
    risk: Arc<Mutex<RiskEngine>>,
    state: Arc<Mutex<LoopState>>,
    control: Mutex<Control>,
    price_timeout: Duration,
}

impl PaperEngine {
    pub fn new(
        feed: Arc<dyn PriceSource>,
        router: Arc<OrderRouter>,
        risk: Arc<Mutex<RiskEngine>>,
        start_equity: Decimal,
    ) -> Self {
        Self {
            feed,
            router,
            risk,
            state: Arc::new(Mutex::new(LoopState {
                running: false,
                params: LoopParams::default(),
                ledger: Ledger::new(start_equity),
                ticks: 0,
            })),
            control: Mutex::new(Control { task: None, stop_tx: None }),
            price_timeout: PRICE_TIMEOUT,
        }
    }

    /// Starts the loop. A start while already running is a no-op that
    /// returns the current status; start/stop transitions are serialized by
    /// the control lock, so two loops can never run for the same engine.
    pub async fn start(&self, mut params: LoopParams) -> EngineStatus {
        let mut control = self.control.lock().await;

        let already_running = control
            .task
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false);
        if already_running {
            info!("[PAPER] start ignored, loop already running");
            return self.status().await;
        }

        if params.interval_ms < MIN_TICK_INTERVAL.as_millis() as u64 {
            params.interval_ms = MIN_TICK_INTERVAL.as_millis() as u64;
        }

        let start_equity = self.risk.lock().await.equity();
        {
            let mut st = self.state.lock().await;
            st.running = true;
            st.params = params.clone();
            st.ledger = Ledger::new(start_equity);
            st.ticks = 0;
        }

        info!(
            "[PAPER] start symbol={} interval_ms={} threshold_bps={} qty={}",
            params.symbol, params.interval_ms, params.threshold_bps, params.trade_qty
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            self.feed.clone(),
            self.router.clone(),
            self.risk.clone(),
            self.state.clone(),
            self.price_timeout,
            stop_rx,
        ));
        control.task = Some(task);
        control.stop_tx = Some(stop_tx);

        self.status().await
    }

    /// Signals the loop and waits for the in-flight tick to finish. On
    /// return, `running == false` is visible to every status reader and the
    /// ledger holds either zero or one complete tick since the stop was
    /// requested, never a half-applied fill.
    pub async fn stop(&self) -> EngineStatus {
        let mut control = self.control.lock().await;
        if let Some(stop_tx) = control.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = control.task.take() {
            if let Err(e) = task.await {
                warn!("[PAPER] loop task join error: {}", e);
            }
        }
        self.state.lock().await.running = false;
        info!("[PAPER] stopped");
        self.status().await
    }

    pub async fn status(&self) -> EngineStatus {
        let st = self.state.lock().await;
        EngineStatus {
            running: st.running,
            params: st.params.clone(),
            ledger: st.ledger.clone(),
            ticks: st.ticks,
        }
    }

    /// Fresh ledger anchored at the risk engine's current equity. Meant for
    /// a stopped session; with a running loop the next tick simply starts
    /// writing into the new ledger.
    pub async fn reset_accounting(&self) -> EngineStatus {
        let start_equity = self.risk.lock().await.equity();
        {
            let mut st = self.state.lock().await;
            st.ledger = Ledger::new(start_equity);
            st.ticks = 0;
        }
        info!("[PAPER] accounting reset start_equity={}", start_equity);
        self.status().await
    }
}

async fn run_loop(
    feed: Arc<dyn PriceSource>,
    router: Arc<OrderRouter>,
    risk: Arc<Mutex<RiskEngine>>,
    state: Arc<Mutex<LoopState>>,
    price_timeout: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let interval_ms = state.lock().await.params.interval_ms;
    let mut ticker = interval(Duration::from_millis(interval_ms));
    // the ticker sleeps only the remainder of the period; late ticks are
    // delayed, not burst
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                tick(&feed, &router, &risk, &state, price_timeout).await;
            }
        }
    }

    state.lock().await.running = false;
    debug!("[PAPER] loop exited");
}

async fn tick(
    feed: &Arc<dyn PriceSource>,
    router: &Arc<OrderRouter>,
    risk: &Arc<Mutex<RiskEngine>>,
    state: &Arc<Mutex<LoopState>>,
    price_timeout: Duration,
) {
    let symbol = state.lock().await.params.symbol.clone();

    let price = match timeout(price_timeout, feed.get_price(&symbol)).await {
        Ok(Ok(px)) => Some(px),
        Ok(Err(_)) | Err(_) => None,
    };

    let mut st = state.lock().await;
    st.ticks += 1;
    st.ledger.touch();

    // no quote: skip signal logic but keep the clock moving
    let Some(px) = price else {
        debug!("[PAPER] no quote for {}, skipping tick", symbol);
        return;
    };

    st.ledger.mark(px);
    risk.lock().await.observe_equity(st.ledger.equity);

    let anchor = match st.ledger.anchor_price {
        Some(a) => a,
        None => {
            st.ledger.anchor_price = Some(px);
            info!("[PAPER] anchor set @ {}", px);
            return;
        }
    };

    let deviation_bps = (px / anchor - Decimal::ONE) * dec!(10000);

    // mean reversion: fade the move away from the anchor
    let side = if deviation_bps >= st.params.threshold_bps {
        Side::Sell
    } else if deviation_bps <= -st.params.threshold_bps {
        Side::Buy
    } else {
        return;
    };

    info!(
        "[PAPER] signal {:?} px={} anchor={} deviation_bps={}",
        side, px, anchor, deviation_bps.round_dp(2)
    );

    let est_risk = risk.lock().await.allowed_risk_per_trade();
    let key = format!("loop-{}", Uuid::new_v4());
    let qty = st.params.trade_qty;
    let result = router.submit_market(&symbol, side, qty, &key, est_risk).await;

    if let Some(reason) = &result.deny {
        // denial is not a stop condition, the loop keeps ticking
        warn!("[PAPER] trade denied: {}", reason);
        return;
    }

    match result.order.status {
        OrderStatus::Filled => {
            let fill_px = result.order.avg_fill_price.unwrap_or(px);
            let realized = st.ledger.apply_fill(side, result.order.filled_quantity, fill_px);
            st.ledger.mark(fill_px);
            // the next deviation is measured from the fresh fill
            st.ledger.anchor_price = Some(fill_px);

            let mut risk = risk.lock().await;
            risk.record_fill(realized);
            risk.observe_equity(st.ledger.equity);

            info!(
                "[PAPER] fill {:?} qty={} @ {} position={} cash={} equity={}",
                side,
                result.order.filled_quantity,
                fill_px,
                st.ledger.position_qty,
                st.ledger.cash,
                st.ledger.equity
            );
        }
        status => {
            warn!("[PAPER] order not filled: {:?} note={:?}", status, result.order.note);
        }
    }
}
