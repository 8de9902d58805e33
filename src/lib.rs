pub mod config;
pub mod exec;
pub mod market;
pub mod paper;
pub mod risk;
pub mod session;

pub use config::{Config, ConfigError, Mode};
pub use session::{SessionStatus, TradingSession};
