use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::risk::types::{
    bps_to_ratio, DenyReason, HaltReason, RiskParams, RiskParamsUpdate, RiskState, RiskSummary,
};

/// Admission-control gate plus loss/drawdown tracker.
///
/// Limits enforced:
///   - max risk per trade (bps of current equity)
///   - daily loss cap (bps of day-start equity)
///   - max drawdown (bps of session-start equity)
///   - kill switch (external, sticky, independent of the halt flag)
pub struct RiskEngine {
    params: RiskParams,
    state: RiskState,
}

impl RiskEngine {
    pub fn new(params: RiskParams) -> Self {
        let state = RiskState::new(params.capital_base);
        info!("[RISK] init capital={} risk_per_trade_bps={} daily_loss_cap_bps={} max_drawdown_bps={}",
            params.capital_base, params.risk_per_trade_bps,
            params.daily_loss_cap_bps, params.max_drawdown_bps);
        Self { params, state }
    }

    /* ---------- Limits ---------- */

    fn daily_loss_limit(&self) -> Decimal {
        self.state.day_start_equity * bps_to_ratio(self.params.daily_loss_cap_bps)
    }

    fn max_drawdown_limit(&self) -> Decimal {
        self.state.equity_start * bps_to_ratio(self.params.max_drawdown_bps)
    }

    pub fn allowed_risk_per_trade(&self) -> Decimal {
        self.state.equity_current * bps_to_ratio(self.params.risk_per_trade_bps)
    }

    pub fn equity(&self) -> Decimal {
        self.state.equity_current
    }

    /* ---------- Admission control ---------- */

    /// `est_risk` is the expected worst-case loss of the candidate trade.
    /// Checks short-circuit in precedence order; denial has no side effects.
    pub fn pre_trade_check(&self, est_risk: Decimal) -> Result<(), DenyReason> {
        if self.state.kill_switch {
            return Err(DenyReason::KillSwitch);
        }

        if self.state.trading_halted {
            let reason = self
                .state
                .halt_reason
                .clone()
                .unwrap_or(HaltReason::KillSwitch { reason: "unknown".into() });
            return Err(DenyReason::Halted(reason));
        }

        let limit = self.allowed_risk_per_trade();
        if est_risk > limit {
            return Err(DenyReason::RiskPerTrade { requested: est_risk, limit });
        }

        if self.state.realized_pnl_today < -self.daily_loss_limit() {
            return Err(DenyReason::DailyLossCap);
        }

        let dd = self.state.equity_start - self.state.equity_current;
        if dd > self.max_drawdown_limit() {
            return Err(DenyReason::MaxDrawdown);
        }

        Ok(())
    }

    /* ---------- State transitions ---------- */

    /// Mark-to-market sync from the ledger. Keeps pre-trade checks off stale
    /// equity; breach transitions stay the business of `record_fill`.
    pub fn observe_equity(&mut self, equity: Decimal) {
        self.state.equity_current = equity;
        self.state.max_equity_seen = self.state.max_equity_seen.max(equity);
        self.state.min_equity_seen = self.state.min_equity_seen.min(equity);
    }

    /// Book a realized PnL delta and re-evaluate the breach conditions.
    /// A breach here is a sticky transition into the halted state; the first
    /// recorded reason wins until an explicit reset.
    pub fn record_fill(&mut self, realized_pnl: Decimal) {
        self.state.equity_current += realized_pnl;
        self.state.realized_pnl_today += realized_pnl;
        self.state.max_equity_seen = self.state.max_equity_seen.max(self.state.equity_current);
        self.state.min_equity_seen = self.state.min_equity_seen.min(self.state.equity_current);

        if !self.state.trading_halted {
            if self.state.realized_pnl_today < -self.daily_loss_limit() {
                self.halt(HaltReason::DailyLossCap);
            } else if self.state.equity_start - self.state.equity_current
                > self.max_drawdown_limit()
            {
                self.halt(HaltReason::MaxDrawdown);
            }
        }

        info!(
            "[RISK] fill pnl={} equity={} pnl_today={} halted={}",
            realized_pnl,
            self.state.equity_current,
            self.state.realized_pnl_today,
            self.state.trading_halted
        );
    }

    fn halt(&mut self, reason: HaltReason) {
        warn!("[RISK] halt: {}", reason);
        self.state.trading_halted = true;
        self.state.halt_reason = Some(reason);
    }

    /// Externally settable operator signal. Activating forces a halt as well;
    /// clearing does NOT clear the halt (both flags need their own reset).
    pub fn set_kill_switch(&mut self, active: bool, reason: &str) {
        self.state.kill_switch = active;
        if active {
            self.halt(HaltReason::KillSwitch { reason: reason.to_string() });
        }
        warn!("[RISK] kill switch set active={} reason={}", active, reason);
    }

    /// Re-anchors the trading day: day-start equity becomes current equity,
    /// today's PnL and the halt are cleared. Never touches the kill switch.
    pub fn reset_daily(&mut self) {
        self.state.day_start_equity = self.state.equity_current;
        self.state.realized_pnl_today = Decimal::ZERO;
        self.state.trading_halted = false;
        self.state.halt_reason = None;
        info!("[RISK] daily reset day_start_equity={}", self.state.day_start_equity);
    }

    pub fn set_params(&mut self, update: RiskParamsUpdate) {
        if let Some(v) = update.capital_base {
            self.params.capital_base = v;
        }
        if let Some(v) = update.risk_per_trade_bps {
            self.params.risk_per_trade_bps = v;
        }
        if let Some(v) = update.daily_loss_cap_bps {
            self.params.daily_loss_cap_bps = v;
        }
        if let Some(v) = update.max_drawdown_bps {
            self.params.max_drawdown_bps = v;
        }
        if let Some(v) = update.max_position_notional {
            self.params.max_position_notional = v;
        }
        if let Some(v) = update.allow_leverage {
            self.params.allow_leverage = v;
        }
        if let Some(v) = update.max_leverage {
            self.params.max_leverage = v;
        }
        info!("[RISK] params updated");
    }

    pub fn summary(&self) -> RiskSummary {
        RiskSummary {
            params: self.params.clone(),
            state: self.state.clone(),
            risk_per_trade_limit: self.allowed_risk_per_trade(),
            daily_loss_limit: self.daily_loss_limit(),
            max_drawdown_limit: self.max_drawdown_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskParams::default())
    }

    #[test]
    fn allows_within_per_trade_limit() {
        let e = engine();
        // 50 bps of 10_000
        assert_eq!(e.allowed_risk_per_trade(), dec!(50));
        assert!(e.pre_trade_check(dec!(50)).is_ok());
        assert_eq!(
            e.pre_trade_check(dec!(50.01)),
            Err(DenyReason::RiskPerTrade { requested: dec!(50.01), limit: dec!(50) })
        );
    }

    #[test]
    fn daily_loss_cap_denies_until_reset() {
        let mut e = engine();
        // cap is 200 bps of 10_000 = 200
        e.record_fill(dec!(-201));
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::Halted(HaltReason::DailyLossCap)));
        // sticky across further fills, reason unchanged
        e.record_fill(dec!(300));
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::Halted(HaltReason::DailyLossCap)));

        e.reset_daily();
        assert!(e.pre_trade_check(dec!(1)).is_ok());
    }

    #[test]
    fn loss_under_cap_is_not_a_breach() {
        let mut e = engine();
        e.record_fill(dec!(-199));
        assert!(e.pre_trade_check(dec!(1)).is_ok());
    }

    #[test]
    fn drawdown_denies_regardless_of_size() {
        let mut e = engine();
        e.observe_equity(dec!(8999)); // dd = 1001 > 1000
        assert_eq!(e.pre_trade_check(dec!(0.01)), Err(DenyReason::MaxDrawdown));
    }

    #[test]
    fn drawdown_breach_on_fill_halts() {
        let mut e = engine();
        // big daily cap so the drawdown rule fires first
        e.set_params(RiskParamsUpdate { daily_loss_cap_bps: Some(dec!(5000)), ..Default::default() });
        e.record_fill(dec!(-1001));
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::Halted(HaltReason::MaxDrawdown)));
    }

    #[test]
    fn kill_switch_precedence_and_independence() {
        let mut e = engine();
        e.set_kill_switch(true, "manual");
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::KillSwitch));

        // clearing the switch does not clear the halt it forced
        e.set_kill_switch(false, "manual");
        assert!(matches!(e.pre_trade_check(dec!(1)), Err(DenyReason::Halted(_))));

        // halt clears on daily reset, switch already off
        e.reset_daily();
        assert!(e.pre_trade_check(dec!(1)).is_ok());
    }

    #[test]
    fn reset_daily_keeps_kill_switch() {
        let mut e = engine();
        e.set_kill_switch(true, "ops");
        e.reset_daily();
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::KillSwitch));
    }

    #[test]
    fn reset_daily_reanchors_day_start() {
        let mut e = engine();
        e.record_fill(dec!(-150));
        e.reset_daily();
        // new day-start equity is 9_850, cap 2% of that = 197
        e.record_fill(dec!(-197));
        assert!(e.pre_trade_check(dec!(1)).is_ok());
        e.record_fill(dec!(-1));
        assert_eq!(e.pre_trade_check(dec!(1)), Err(DenyReason::Halted(HaltReason::DailyLossCap)));
    }
}
