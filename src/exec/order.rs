use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::risk::DenyReason;

/// Deterministic, content-derived order identity. Two submissions with the
/// same (symbol, side, quantity, idempotency key) always map to the same id;
/// this is the contract the router's replay cache is built on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClientOrderId(pub String);

impl ClientOrderId {
    pub fn derive(symbol: &str, side: Side, quantity: Decimal, idempotency_key: &str) -> Self {
        // canonical serialization, then BLAKE3 for a stable hash across runs
        let canonical = json!({
            "symbol": symbol,
            "side": side.as_str(),
            "quantity": quantity.to_string(),
            "key": idempotency_key,
        });
        Self(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    /// Recorded but never triggered; real OCO semantics are out of scope.
    OcoStub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Filled,
    PartiallyFilled,
    Rejected,
    Canceled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: ClientOrderId,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub ts_ms: u64,
    pub note: Option<String>,
}

impl Order {
    pub fn new(
        id: ClientOrderId,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        limit_price: Option<Decimal>,
    ) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            limit_price,
            status: OrderStatus::New,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            ts_ms: now_ms(),
            note: None,
        }
    }

    pub fn fill(mut self, price: Decimal, quantity: Decimal, note: &str) -> Self {
        self.status = OrderStatus::Filled;
        self.filled_quantity = quantity;
        self.avg_fill_price = Some(price);
        self.note = Some(note.to_string());
        self
    }

    pub fn reject(mut self, note: String) -> Self {
        self.status = OrderStatus::Rejected;
        self.note = Some(note);
        self
    }
}

/// Outcome of one submission: the order plus, when risk denied it, the
/// structured reason. Cached verbatim by the router for idempotent replay.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub order: Order,
    pub deny: Option<DenyReason>,
}

impl OrderResult {
    pub fn accepted(order: Order) -> Self {
        Self { order, deny: None }
    }

    pub fn denied(order: Order, reason: DenyReason) -> Self {
        Self { order, deny: Some(reason) }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// BTCUSDT, ethusdt, BTC-USDT, BTC/USDT -> BTCUSDT
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| *c != '-' && *c != '/')
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn client_order_id_is_pure() {
        let a = ClientOrderId::derive("BTCUSDT", Side::Buy, dec!(0.001), "k1");
        let b = ClientOrderId::derive("BTCUSDT", Side::Buy, dec!(0.001), "k1");
        assert_eq!(a, b);
    }

    #[test]
    fn client_order_id_is_input_sensitive() {
        let base = ClientOrderId::derive("BTCUSDT", Side::Buy, dec!(0.001), "k1");
        assert_ne!(base, ClientOrderId::derive("ETHUSDT", Side::Buy, dec!(0.001), "k1"));
        assert_ne!(base, ClientOrderId::derive("BTCUSDT", Side::Sell, dec!(0.001), "k1"));
        assert_ne!(base, ClientOrderId::derive("BTCUSDT", Side::Buy, dec!(0.002), "k1"));
        assert_ne!(base, ClientOrderId::derive("BTCUSDT", Side::Buy, dec!(0.001), "k2"));
    }

    #[test]
    fn symbol_normalization() {
        assert_eq!(normalize_symbol("btcusdt"), "BTCUSDT");
        assert_eq!(normalize_symbol("BTC-USDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("btc/usdt"), "BTCUSDT");
    }
}
