use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fader::config::Config;
use fader::paper::LoopParams;
use fader::session::TradingSession;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    let session = TradingSession::from_config(&cfg)?;

    let params = LoopParams {
        symbol: cfg.symbol.clone(),
        interval_ms: cfg.interval_ms,
        threshold_bps: cfg.threshold_bps,
        trade_qty: cfg.trade_qty,
    };

    info!("[MAIN] starting fader loop on {}", params.symbol);
    session.start(params).await;

    tokio::signal::ctrl_c().await?;
    info!("[MAIN] shutdown requested");

    let status = session.stop().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
