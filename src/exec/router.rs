use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::exec::order::{normalize_symbol, ClientOrderId, Order, OrderResult, OrderType, Side};
use crate::exec::venue::{ExecutionVenue, VenueError};
use crate::risk::RiskEngine;

const DEFAULT_VENUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Idempotent order-submission layer.
///
/// Every submission resolves to exactly one durable outcome keyed by the
/// content-derived client order id. The cache is process-lifetime and never
/// evicted; the check-then-insert sequence runs under one lock, so concurrent
/// retries with the same idempotency key execute at most once.
pub struct OrderRouter {
    venue: Arc<dyn ExecutionVenue>,
    risk: Arc<Mutex<RiskEngine>>,
    orders: Mutex<HashMap<ClientOrderId, OrderResult>>,
    venue_timeout: Duration,
}

impl OrderRouter {
    pub fn new(venue: Arc<dyn ExecutionVenue>, risk: Arc<Mutex<RiskEngine>>) -> Self {
        Self {
            venue,
            risk,
            orders: Mutex::new(HashMap::new()),
            venue_timeout: DEFAULT_VENUE_TIMEOUT,
        }
    }

    pub fn with_venue_timeout(mut self, venue_timeout: Duration) -> Self {
        self.venue_timeout = venue_timeout;
        self
    }

    /* ---------- Submission ---------- */

    pub async fn submit_market(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        idempotency_key: &str,
        est_risk: Decimal,
    ) -> OrderResult {
        let symbol = normalize_symbol(symbol);
        let id = ClientOrderId::derive(&symbol, side, quantity, idempotency_key);

        // Lock held across risk check and venue call: at-most-one execution
        // per key, even under concurrent retries.
        let mut orders = self.orders.lock().await;
        if let Some(cached) = orders.get(&id) {
            debug!("[ROUTER] replay {} (cached {:?})", id, cached.order.status);
            return cached.clone();
        }

        let order = Order::new(id.clone(), &symbol, side, OrderType::Market, quantity, None);

        if let Err(reason) = self.risk.lock().await.pre_trade_check(est_risk) {
            warn!("[ROUTER] denied {} {:?} qty={}: {}", symbol, side, quantity, reason);
            let result = OrderResult::denied(order.reject(reason.to_string()), reason);
            orders.insert(id, result.clone());
            return result;
        }

        let result = match timeout(self.venue_timeout, self.venue.submit_market(&symbol, side, quantity)).await {
            Ok(Ok(fill)) => {
                info!(
                    "[ROUTER] filled {} {} {:?} qty={} @ {}",
                    id, symbol, side, fill.quantity, fill.price
                );
                OrderResult::accepted(order.fill(fill.price, fill.quantity, "market fill"))
            }
            Ok(Err(e)) => {
                // Cached so a retried key is never resent to the venue.
                warn!("[ROUTER] venue error for {}: {}", id, e);
                OrderResult::accepted(order.reject(format!("venue error: {}", e)))
            }
            Err(_) => {
                warn!("[ROUTER] venue timeout for {}", id);
                OrderResult::accepted(order.reject("venue timeout".to_string()))
            }
        };

        orders.insert(id, result.clone());
        result
    }

    /// Limit orders fill immediately and fully iff the venue's last price
    /// already satisfies the limit at submission time; otherwise they rest as
    /// `New` forever. There is no matching engine; that is the contract, not
    /// a gap.
    pub async fn submit_limit(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        idempotency_key: &str,
        est_risk: Decimal,
    ) -> OrderResult {
        let symbol = normalize_symbol(symbol);
        let id = ClientOrderId::derive(&symbol, side, quantity, idempotency_key);

        let mut orders = self.orders.lock().await;
        if let Some(cached) = orders.get(&id) {
            debug!("[ROUTER] replay {} (cached {:?})", id, cached.order.status);
            return cached.clone();
        }

        let order = Order::new(
            id.clone(),
            &symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(limit_price),
        );

        if let Err(reason) = self.risk.lock().await.pre_trade_check(est_risk) {
            warn!("[ROUTER] denied {} {:?} qty={}: {}", symbol, side, quantity, reason);
            let result = OrderResult::denied(order.reject(reason.to_string()), reason);
            orders.insert(id, result.clone());
            return result;
        }

        let last = match timeout(self.venue_timeout, self.venue.last_price(&symbol)).await {
            Ok(Ok(px)) => Some(px),
            Ok(Err(_)) | Err(_) => None,
        };

        let result = match last {
            Some(last) => {
                let in_the_money = match side {
                    Side::Buy => last <= limit_price,
                    Side::Sell => last >= limit_price,
                };
                if in_the_money {
                    info!("[ROUTER] limit {} immediate fill @ {}", id, last);
                    OrderResult::accepted(order.fill(last, quantity, "limit immediate fill"))
                } else {
                    OrderResult::accepted(order)
                }
            }
            // no quote: rest the order, nothing to evaluate against
            None => OrderResult::accepted(order),
        };

        orders.insert(id, result.clone());
        result
    }

    /// Stored for the books only; no trigger logic behind it.
    pub async fn submit_oco_stub(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        idempotency_key: &str,
    ) -> OrderResult {
        let symbol = normalize_symbol(symbol);
        let id = ClientOrderId::derive(&symbol, side, quantity, idempotency_key);

        let mut orders = self.orders.lock().await;
        if let Some(cached) = orders.get(&id) {
            return cached.clone();
        }

        let mut order = Order::new(
            id.clone(),
            &symbol,
            side,
            OrderType::OcoStub,
            quantity,
            Some(limit_price),
        );
        order.note = Some("oco stub recorded, no trigger logic".to_string());

        let result = OrderResult::accepted(order);
        orders.insert(id, result.clone());
        result
    }

    /* ---------- Read-only lookups ---------- */

    pub async fn get_order(&self, id: &ClientOrderId) -> Option<OrderResult> {
        self.orders.lock().await.get(id).cloned()
    }

    pub async fn list_orders(&self) -> Vec<OrderResult> {
        let mut all: Vec<OrderResult> = self.orders.lock().await.values().cloned().collect();
        all.sort_by_key(|r| r.order.ts_ms);
        all
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::exec::order::OrderStatus;
    use crate::exec::venue::{SimVenue, VenueFill};
    use crate::market::sim::ScriptedFeed;
    use crate::risk::{DenyReason, RiskParams};

    struct CountingVenue {
        calls: AtomicUsize,
        quote: Decimal,
        fail: bool,
    }

    impl CountingVenue {
        fn new(quote: Decimal) -> Self {
            Self { calls: AtomicUsize::new(0), quote, fail: false }
        }

        fn failing() -> Self {
            Self { calls: AtomicUsize::new(0), quote: Decimal::ZERO, fail: true }
        }
    }

    #[async_trait]
    impl ExecutionVenue for CountingVenue {
        async fn submit_market(
            &self,
            _symbol: &str,
            _side: Side,
            quantity: Decimal,
        ) -> Result<VenueFill, VenueError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(VenueError::Rejected("down".to_string()));
            }
            Ok(VenueFill { price: self.quote, quantity, fill_id: Uuid::new_v4() })
        }

        async fn last_price(&self, _symbol: &str) -> Result<Decimal, VenueError> {
            Ok(self.quote)
        }
    }

    fn risk() -> Arc<Mutex<RiskEngine>> {
        Arc::new(Mutex::new(RiskEngine::new(RiskParams::default())))
    }

    #[tokio::test]
    async fn duplicate_submission_replays_without_reexecution() {
        let venue = Arc::new(CountingVenue::new(dec!(100.3)));
        let router = OrderRouter::new(venue.clone(), risk());

        let first = router
            .submit_market("BTCUSDT", Side::Sell, dec!(0.5), "k1", dec!(10))
            .await;
        let second = router
            .submit_market("BTCUSDT", Side::Sell, dec!(0.5), "k1", dec!(10))
            .await;

        assert_eq!(first.order.id, second.order.id);
        assert_eq!(first.order.status, OrderStatus::Filled);
        assert_eq!(second.order.status, OrderStatus::Filled);
        assert_eq!(second.order.avg_fill_price, Some(dec!(100.3)));
        assert_eq!(venue.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deny_is_cached_and_venue_never_contacted() {
        let venue = Arc::new(CountingVenue::new(dec!(100)));
        let risk = risk();
        risk.lock().await.set_kill_switch(true, "test");
        let router = OrderRouter::new(venue.clone(), risk);

        let result = router
            .submit_market("BTCUSDT", Side::Buy, dec!(1), "k1", dec!(1))
            .await;
        assert_eq!(result.order.status, OrderStatus::Rejected);
        assert_eq!(result.deny, Some(DenyReason::KillSwitch));

        let replay = router
            .submit_market("BTCUSDT", Side::Buy, dec!(1), "k1", dec!(1))
            .await;
        assert_eq!(replay.deny, Some(DenyReason::KillSwitch));
        assert_eq!(venue.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn venue_error_is_cached_not_resent() {
        let venue = Arc::new(CountingVenue::failing());
        let router = OrderRouter::new(venue.clone(), risk());

        let first = router
            .submit_market("BTCUSDT", Side::Buy, dec!(1), "k1", dec!(1))
            .await;
        assert_eq!(first.order.status, OrderStatus::Rejected);
        assert!(first.deny.is_none());

        let second = router
            .submit_market("BTCUSDT", Side::Buy, dec!(1), "k1", dec!(1))
            .await;
        assert_eq!(second.order.status, OrderStatus::Rejected);
        assert_eq!(venue.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn limit_fills_only_in_the_money() {
        let feed = Arc::new(ScriptedFeed::from_prices(&[dec!(100), dec!(100)]));
        let venue = Arc::new(SimVenue::new(feed));
        let router = OrderRouter::new(venue, risk());

        // buy at 101 with last=100: in the money, immediate fill at last
        let filled = router
            .submit_limit("BTCUSDT", Side::Buy, dec!(1), dec!(101), "k1", dec!(1))
            .await;
        assert_eq!(filled.order.status, OrderStatus::Filled);
        assert_eq!(filled.order.avg_fill_price, Some(dec!(100)));

        // buy at 99 with last=100: rests as New
        let resting = router
            .submit_limit("BTCUSDT", Side::Buy, dec!(1), dec!(99), "k2", dec!(1))
            .await;
        assert_eq!(resting.order.status, OrderStatus::New);
        assert_eq!(resting.order.limit_price, Some(dec!(99)));
    }

    #[tokio::test]
    async fn lookups_are_read_only_views() {
        let venue = Arc::new(CountingVenue::new(dec!(50)));
        let router = OrderRouter::new(venue, risk());

        let r = router
            .submit_market("eth-usdt", Side::Buy, dec!(2), "k1", dec!(1))
            .await;
        assert_eq!(r.order.symbol, "ETHUSDT");

        let looked_up = router.get_order(&r.order.id).await.expect("order exists");
        assert_eq!(looked_up.order.status, OrderStatus::Filled);
        assert_eq!(router.list_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_retries_execute_once() {
        let venue = Arc::new(CountingVenue::new(dec!(100)));
        let router = Arc::new(OrderRouter::new(venue.clone(), risk()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                router
                    .submit_market("BTCUSDT", Side::Buy, dec!(1), "same-key", dec!(1))
                    .await
            }));
        }

        for h in handles {
            let r = h.await.expect("task");
            assert_eq!(r.order.status, OrderStatus::Filled);
        }
        assert_eq!(venue.calls.load(Ordering::SeqCst), 1);
    }
}
