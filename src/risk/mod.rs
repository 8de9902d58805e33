pub mod engine;
pub mod types;

pub use engine::RiskEngine;
pub use types::{DenyReason, HaltReason, RiskParams, RiskParamsUpdate, RiskState, RiskSummary};
