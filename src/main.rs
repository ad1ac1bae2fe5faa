//! MirrorBot - Cross-Venue Perp Arbitrage Bot
//! Mission: Mirror two perp venues, trade the spread, never carry a leg
//! Philosophy: One venue's hiccup must never become a naked position

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mirrorbot_core::arbitrage::ArbEngine;
use mirrorbot_core::config::{GlobalSettings, SharedSettings};
use mirrorbot_core::execution::{PaperExecutor, RestExecutor, TradeExecutor};
use mirrorbot_core::feeds::account::AccountPoller;
use mirrorbot_core::feeds::{BackpackAdapter, ConnectionRegistry, EdgexAdapter, VenueAdapter};
use mirrorbot_core::models::VenueId;

const POSITION_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "mirrorbot", about = "Cross-venue perp arbitrage bot")]
struct Cli {
    /// Settings file (TOML). Monitors, thresholds, position limits.
    #[arg(long, env = "MIRRORBOT_SETTINGS", default_value = "mirrorbot.toml")]
    settings: PathBuf,

    /// Symbols to subscribe on both venues.
    #[arg(long, env = "MIRRORBOT_SYMBOLS", value_delimiter = ',', default_value = "BTC-USD")]
    symbols: Vec<String>,

    /// Paper mode: fills are simulated, nothing reaches a venue.
    #[arg(long, env = "MIRRORBOT_PAPER")]
    paper: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        warn!(error = %e, "metrics exporter not installed");
    }

    let cli = Cli::parse();
    info!("🚀 MirrorBot starting ({} mode)", if cli.paper { "paper" } else { "live" });

    let settings = match SharedSettings::load(&cli.settings) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "settings file unavailable; starting with defaults");
            Arc::new(SharedSettings::new(GlobalSettings::default().apply_env()))
        }
    };

    let edgex: Arc<dyn VenueAdapter> = Arc::new(EdgexAdapter::new());
    let backpack: Arc<dyn VenueAdapter> = Arc::new(BackpackAdapter::new());

    let (executor1, executor2): (Arc<dyn TradeExecutor>, Arc<dyn TradeExecutor>) = if cli.paper {
        (
            Arc::new(PaperExecutor::for_venue(VenueId::One)),
            Arc::new(PaperExecutor::for_venue(VenueId::Two)),
        )
    } else {
        (
            Arc::new(RestExecutor::new(
                VenueId::One,
                env_or("EDGEX_API_URL", "https://api.edgex.exchange")?,
                "/api/v1/private/order",
                env_required("EDGEX_API_KEY")?,
                env_required("EDGEX_API_SECRET")?,
            )),
            Arc::new(RestExecutor::new(
                VenueId::Two,
                env_or("BACKPACK_API_URL", "https://api.backpack.exchange")?,
                "/api/v1/order",
                env_required("BACKPACK_API_KEY")?,
                env_required("BACKPACK_API_SECRET")?,
            )),
        )
    };

    let registry = ConnectionRegistry::new();
    let engine = ArbEngine::new(
        edgex.clone(),
        backpack.clone(),
        settings,
        executor1,
        executor2,
        registry.clone(),
    );

    registry.spawn(edgex, cli.symbols.clone(), engine.clone());
    registry.spawn(backpack, cli.symbols.clone(), engine.clone());

    if !cli.paper {
        for (venue, var, default_base, path) in [
            (
                VenueId::One,
                "EDGEX_API_URL",
                "https://api.edgex.exchange",
                "/api/v1/private/positions",
            ),
            (
                VenueId::Two,
                "BACKPACK_API_URL",
                "https://api.backpack.exchange",
                "/api/v1/positions",
            ),
        ] {
            let base = env_or(var, default_base)?;
            AccountPoller::new(venue, format!("{base}{path}"), POSITION_POLL_INTERVAL)
                .spawn(engine.clone());
        }
    }

    info!(symbols = ?cli.symbols, "✅ MirrorBot running; ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("ctrl-c handler")?;
    info!("👋 MirrorBot shutting down");
    Ok(())
}

fn env_or(name: &str, default: &str) -> Result<String> {
    Ok(std::env::var(name).unwrap_or_else(|_| default.to_string()))
}

fn env_required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set for live mode"))
}
