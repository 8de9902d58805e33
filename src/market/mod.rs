pub mod binance;
pub mod sim;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Transient quote failure. A value the loop branches on, never a loop-fatal
/// error; freshness policy belongs to the implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("price unavailable")]
pub struct PriceUnavailable;

/// Market data source abstraction.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, PriceUnavailable>;
}
