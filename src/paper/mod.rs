pub mod engine;
pub mod ledger;

pub use engine::{EngineStatus, LoopParams, PaperEngine, MIN_TICK_INTERVAL};
pub use ledger::Ledger;
