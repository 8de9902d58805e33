use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::exec::order::{now_ms, Side};

/// Accounting state for one paper session, owned exclusively by the engine
/// loop. Equity is recomputed on every fill and price update so risk
/// decisions never read a stale number.
///
/// Policy: mark-to-market equity, realized PnL attributed on
/// position-reducing fills via the average entry price.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    pub start_equity: Decimal,
    pub cash: Decimal,
    pub position_qty: Decimal,
    pub avg_entry_price: Decimal,
    pub realized_pnl: Decimal,
    pub last_price: Option<Decimal>,
    pub anchor_price: Option<Decimal>,
    pub equity: Decimal,
    pub high_watermark: Decimal,
    pub cumulative_intraday_loss: Decimal,
    pub last_ts_ms: u64,
}

impl Ledger {
    pub fn new(start_equity: Decimal) -> Self {
        Self {
            start_equity,
            cash: Decimal::ZERO,
            position_qty: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            last_price: None,
            anchor_price: None,
            equity: start_equity,
            high_watermark: start_equity,
            cumulative_intraday_loss: Decimal::ZERO,
            last_ts_ms: 0,
        }
    }

    /// Books a fill into cash/position and returns the realized PnL delta
    /// (non-zero only when the fill reduces or flips the position).
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let signed = quantity * side.sign();
        self.cash -= signed * price;

        let mut realized = Decimal::ZERO;

        if self.position_qty.is_zero() || self.position_qty.signum() == signed.signum() {
            // same direction: blend the average entry
            let new_qty = self.position_qty + signed;
            if !new_qty.is_zero() {
                self.avg_entry_price = (self.avg_entry_price * self.position_qty.abs()
                    + price * signed.abs())
                    / new_qty.abs();
            }
            self.position_qty = new_qty;
        } else {
            // reducing or flipping
            let closing_qty = self.position_qty.abs().min(signed.abs());
            realized = closing_qty * (price - self.avg_entry_price) * self.position_qty.signum();
            self.realized_pnl += realized;
            self.position_qty += signed;

            if self.position_qty.is_zero() {
                self.avg_entry_price = Decimal::ZERO;
            } else if self.position_qty.signum() == signed.signum() {
                // flipped through flat: remainder opened at the fill price
                self.avg_entry_price = price;
            }
        }

        realized
    }

    /// Mark-to-market: recompute equity, high watermark, and the running
    /// intraday loss from the session start.
    pub fn mark(&mut self, price: Decimal) {
        self.last_price = Some(price);
        self.equity = self.start_equity + self.cash + self.position_qty * price;
        self.high_watermark = self.high_watermark.max(self.equity);

        let loss = self.start_equity - self.equity;
        if loss > self.cumulative_intraday_loss {
            self.cumulative_intraday_loss = loss;
        }
    }

    /// High-watermark drawdown at the current mark.
    pub fn drawdown(&self) -> Decimal {
        self.high_watermark - self.equity
    }

    /// Ages the tick clock forward even when no price arrived.
    pub fn touch(&mut self) {
        self.last_ts_ms = now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trip_realizes_pnl() {
        let mut l = Ledger::new(dec!(10000));

        let r = l.apply_fill(Side::Buy, dec!(2), dec!(100));
        assert_eq!(r, dec!(0));
        assert_eq!(l.position_qty, dec!(2));
        assert_eq!(l.avg_entry_price, dec!(100));
        assert_eq!(l.cash, dec!(-200));

        let r = l.apply_fill(Side::Sell, dec!(2), dec!(110));
        assert_eq!(r, dec!(20));
        assert_eq!(l.position_qty, dec!(0));
        assert_eq!(l.realized_pnl, dec!(20));
        assert_eq!(l.cash, dec!(20));

        l.mark(dec!(110));
        assert_eq!(l.equity, dec!(10020));
    }

    #[test]
    fn partial_reduce_attributes_only_closed_quantity() {
        let mut l = Ledger::new(dec!(10000));
        l.apply_fill(Side::Buy, dec!(3), dec!(100));

        let r = l.apply_fill(Side::Sell, dec!(1), dec!(105));
        assert_eq!(r, dec!(5));
        assert_eq!(l.position_qty, dec!(2));
        assert_eq!(l.avg_entry_price, dec!(100));
    }

    #[test]
    fn flip_reopens_at_fill_price() {
        let mut l = Ledger::new(dec!(10000));
        l.apply_fill(Side::Buy, dec!(1), dec!(100));

        let r = l.apply_fill(Side::Sell, dec!(3), dec!(90));
        assert_eq!(r, dec!(-10));
        assert_eq!(l.position_qty, dec!(-2));
        assert_eq!(l.avg_entry_price, dec!(90));
    }

    #[test]
    fn short_side_accounting() {
        let mut l = Ledger::new(dec!(10000));
        l.apply_fill(Side::Sell, dec!(1), dec!(100.3));
        assert_eq!(l.position_qty, dec!(-1));
        assert_eq!(l.cash, dec!(100.3));

        l.mark(dec!(100.3));
        assert_eq!(l.equity, dec!(10000));

        // price falls, the short gains
        l.mark(dec!(100));
        assert_eq!(l.equity, dec!(10000.3));
    }

    #[test]
    fn watermark_and_intraday_loss_track_marks() {
        let mut l = Ledger::new(dec!(10000));
        l.apply_fill(Side::Buy, dec!(10), dec!(100));

        l.mark(dec!(105));
        assert_eq!(l.high_watermark, dec!(10050));
        assert_eq!(l.cumulative_intraday_loss, dec!(0));

        l.mark(dec!(98));
        assert_eq!(l.equity, dec!(9980));
        assert_eq!(l.high_watermark, dec!(10050));
        assert_eq!(l.drawdown(), dec!(70));
        assert_eq!(l.cumulative_intraday_loss, dec!(20));

        // recovery never shrinks the running loss
        l.mark(dec!(101));
        assert_eq!(l.cumulative_intraday_loss, dec!(20));
    }
}
