use clap::Parser;
use fxbot::config::Settings;
use fxbot::connection::ConnectionSupervisor;
use fxbot::execution::OrderManager;
use fxbot::gateway::{BridgeGateway, PaperGateway, TerminalGateway};
use fxbot::journal::Journal;
use fxbot::runner::StrategyLoop;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;

/// Terminal-connected Bollinger Bands trading daemon.
#[derive(Parser, Debug)]
#[command(name = "fxbot", version, about)]
struct Cli {
    /// Run against a simulated terminal instead of the bridge.
    #[arg(long)]
    paper: bool,

    /// Optional TOML settings file, layered under FXBOT_* env vars.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the paper gateway's price walk.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fxbot=info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    tracing::info!("🚀 fxbot starting");

    let settings = match Settings::load(cli.config.as_deref(), cli.paper) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        symbol = %settings.symbol,
        timeframe = %settings.timeframe,
        engine = ?settings.engine,
        period = settings.period,
        multiplier = settings.multiplier,
        mode = ?settings.band_mode,
        volume = settings.volume,
        paper = cli.paper,
        "configuration loaded"
    );

    let gateway: Box<dyn TerminalGateway> = if cli.paper {
        tracing::info!(seed = cli.seed, "paper mode: simulated terminal");
        Box::new(PaperGateway::new(cli.seed, 1.0850))
    } else {
        tracing::info!(url = %settings.bridge_url, "bridge mode: terminal sidecar");
        Box::new(BridgeGateway::new(
            settings.bridge_url.clone(),
            settings.call_timeout(),
        ))
    };

    // Operator stop: ctrl-c flips the watch channel; every sleep in the
    // supervisor and the loop selects against it
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("⚠️  ctrl-c received");
            let _ = stop_tx.send(true);
        }
    });

    let supervisor = ConnectionSupervisor::new(
        gateway,
        settings.credentials(),
        settings.backoff(),
        settings.call_timeout(),
        settings.max_degraded_strikes,
        stop_rx.clone(),
    );

    let journal = if settings.journal_path.is_empty() {
        None
    } else {
        Some(Journal::new(PathBuf::from(&settings.journal_path)))
    };

    let orders = OrderManager::new(settings.order_policy(), settings.risk.clone(), journal);

    let mut strategy_loop = StrategyLoop::new(
        supervisor,
        settings.build_engine(),
        orders,
        settings.symbol.clone(),
        settings.timeframe,
        settings.poll_interval(),
        settings.flatten_on_exit,
        stop_rx,
    );

    match strategy_loop.run().await {
        Ok(()) => {
            tracing::info!("👋 fxbot stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "terminal link lost, retries exhausted");
            ExitCode::from(1)
        }
    }
}
