use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Session risk limits. Fractions are carried in basis points and converted
/// to ratios only at computation time.
#[derive(Debug, Clone, Serialize)]
pub struct RiskParams {
    pub capital_base: Decimal,
    pub risk_per_trade_bps: Decimal,
    pub daily_loss_cap_bps: Decimal,
    pub max_drawdown_bps: Decimal,
    pub max_position_notional: Decimal,
    pub allow_leverage: bool,
    pub max_leverage: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            capital_base: dec!(10000),
            risk_per_trade_bps: dec!(50),
            daily_loss_cap_bps: dec!(200),
            max_drawdown_bps: dec!(1000),
            max_position_notional: dec!(5000),
            allow_leverage: false,
            max_leverage: dec!(1),
        }
    }
}

/// Partial reconfiguration of [`RiskParams`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct RiskParamsUpdate {
    pub capital_base: Option<Decimal>,
    pub risk_per_trade_bps: Option<Decimal>,
    pub daily_loss_cap_bps: Option<Decimal>,
    pub max_drawdown_bps: Option<Decimal>,
    pub max_position_notional: Option<Decimal>,
    pub allow_leverage: Option<bool>,
    pub max_leverage: Option<Decimal>,
}

pub fn bps_to_ratio(bps: Decimal) -> Decimal {
    bps / dec!(10000)
}

/// Why the engine entered the halted state. Sticky until an explicit reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    DailyLossCap,
    MaxDrawdown,
    KillSwitch { reason: String },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DailyLossCap => write!(f, "daily loss cap breached"),
            HaltReason::MaxDrawdown => write!(f, "max drawdown breached"),
            HaltReason::KillSwitch { reason } => write!(f, "kill switch: {}", reason),
        }
    }
}

/// Pre-trade denial. A value, not an error: denial is expected control flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    KillSwitch,
    Halted(HaltReason),
    RiskPerTrade { requested: Decimal, limit: Decimal },
    DailyLossCap,
    MaxDrawdown,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::KillSwitch => write!(f, "kill switch active"),
            DenyReason::Halted(r) => write!(f, "trading halted: {}", r),
            DenyReason::RiskPerTrade { requested, limit } => {
                write!(f, "risk per trade exceeded: {} > {}", requested, limit)
            }
            DenyReason::DailyLossCap => write!(f, "daily loss cap breached"),
            DenyReason::MaxDrawdown => write!(f, "max drawdown breached"),
        }
    }
}

/// Mutable risk bookkeeping, owned exclusively by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct RiskState {
    pub equity_start: Decimal,
    pub equity_current: Decimal,
    pub day_start_equity: Decimal,
    pub realized_pnl_today: Decimal,
    pub max_equity_seen: Decimal,
    pub min_equity_seen: Decimal,
    pub trading_halted: bool,
    pub halt_reason: Option<HaltReason>,
    pub kill_switch: bool,
}

impl RiskState {
    pub fn new(capital: Decimal) -> Self {
        Self {
            equity_start: capital,
            equity_current: capital,
            day_start_equity: capital,
            realized_pnl_today: Decimal::ZERO,
            max_equity_seen: capital,
            min_equity_seen: capital,
            trading_halted: false,
            halt_reason: None,
            kill_switch: false,
        }
    }
}

/// Read-only snapshot served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct RiskSummary {
    pub params: RiskParams,
    pub state: RiskState,
    pub risk_per_trade_limit: Decimal,
    pub daily_loss_limit: Decimal,
    pub max_drawdown_limit: Decimal,
}
