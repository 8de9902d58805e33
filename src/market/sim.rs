use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::market::{PriceSource, PriceUnavailable};

/// Replays a fixed price script, one step per call. `None` steps simulate an
/// unavailable quote; once the script runs out the last price repeats.
pub struct ScriptedFeed {
    steps: Mutex<VecDeque<Option<Decimal>>>,
    last: Mutex<Option<Decimal>>,
}

impl ScriptedFeed {
    pub fn new(steps: Vec<Option<Decimal>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
        }
    }

    pub fn from_prices(prices: &[Decimal]) -> Self {
        Self::new(prices.iter().copied().map(Some).collect())
    }
}

#[async_trait]
impl PriceSource for ScriptedFeed {
    async fn get_price(&self, _symbol: &str) -> Result<Decimal, PriceUnavailable> {
        let step = self.steps.lock().expect("scripted feed lock").pop_front();
        match step {
            Some(Some(px)) => {
                *self.last.lock().expect("scripted feed lock") = Some(px);
                Ok(px)
            }
            Some(None) => Err(PriceUnavailable),
            None => {
                let last = *self.last.lock().expect("scripted feed lock");
                last.ok_or(PriceUnavailable)
            }
        }
    }
}

/// Deterministic upward drift, for demo runs without network access.
pub struct DriftFeed {
    mid: Mutex<Decimal>,
    step: Decimal,
}

impl DriftFeed {
    pub fn new(start: Decimal) -> Self {
        Self {
            mid: Mutex::new(start),
            step: dec!(0.1),
        }
    }
}

#[async_trait]
impl PriceSource for DriftFeed {
    async fn get_price(&self, _symbol: &str) -> Result<Decimal, PriceUnavailable> {
        let mut mid = self.mid.lock().expect("drift feed lock");
        *mid += self.step;
        Ok(*mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_replays_then_repeats_last() {
        let feed = ScriptedFeed::new(vec![Some(dec!(100)), None, Some(dec!(101))]);
        assert_eq!(feed.get_price("BTCUSDT").await, Ok(dec!(100)));
        assert_eq!(feed.get_price("BTCUSDT").await, Err(PriceUnavailable));
        assert_eq!(feed.get_price("BTCUSDT").await, Ok(dec!(101)));
        assert_eq!(feed.get_price("BTCUSDT").await, Ok(dec!(101)));
    }
}
