//! Zecswap - swap intents into and out of Zcash
//!
//! Quotes and executes swaps from the command line, or runs as a service
//! that tracks executed swaps and serves their status over HTTP.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use zecswap::api;
use zecswap::clock::{Clock, SystemClock};
use zecswap::config::Settings;
use zecswap::engine::{SwapEngine, SwapMonitor};
use zecswap::events::SwapEvent;
use zecswap::metrics::MetricsServer;
use zecswap::state::SwapStore;
use zecswap::swap::{ExecParams, QuoteRequest, RefundContext, SwapDirection};

/// Cross-chain swaps into and out of Zcash via swap intents
#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file; defaults to $ZECSWAP_CONFIG or config/default.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List swappable assets
    Assets,
    /// Request dry-run quotes
    Quote(SwapArgs),
    /// Quote, execute the best quote and record the swap
    Swap(SwapArgs),
    /// Show a recorded swap, refreshing its status from the provider
    Status {
        id: String,
        /// Print the stored record without polling the provider
        #[arg(long)]
        offline: bool,
    },
    /// List recorded swaps, newest first
    History {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Run the status API, metrics exporter and swap monitor
    Serve,
}

#[derive(Args, Debug)]
struct SwapArgs {
    /// Composite asset identifier, e.g. BTC.BTC or ETH.USDC-0xA0b8...
    #[arg(short, long)]
    asset: String,

    /// Amount in display units of the asset being sold
    #[arg(long)]
    amount: String,

    /// inbound (asset into ZEC) or outbound (ZEC out to the asset)
    #[arg(short, long, default_value = "inbound")]
    direction: SwapDirection,

    /// Address receiving the bought asset
    #[arg(short, long)]
    recipient: String,

    /// Refund address on the source chain (required for inbound)
    #[arg(long)]
    refund_address: Option<String>,

    /// Zcash address receiving refunds of outbound swaps
    #[arg(long)]
    home_refund_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Assets => {
            let engine = SwapEngine::new(&settings, clock)?;
            print_json(&engine.list_assets().await)?;
        }
        Command::Quote(args) => {
            let engine = SwapEngine::new(&settings, clock)?;
            let request = quote_request(&engine, &args).await?;
            print_json(&engine.get_quotes(&request).await?)?;
        }
        Command::Swap(args) => run_swap(&settings, clock, args).await?,
        Command::Status { id, offline } => {
            let store = open_store(&settings).await?;
            let mut swap = store
                .get_swap(&id)
                .await?
                .with_context(|| format!("no swap with id {id}"))?;

            if !offline && !swap.is_terminal() {
                let engine = SwapEngine::new(&settings, clock.clone())?;
                let snapshot = engine.poll(&swap).await;
                if swap.apply_snapshot(&snapshot, clock.now()) {
                    store.update_status(&swap).await?;
                }
                info!("Swap {}: {}", swap.id, swap.status.display_label());
            }
            print_json(&swap)?;
        }
        Command::History { limit } => {
            let store = open_store(&settings).await?;
            print_json(&store.get_swap_history(limit).await?)?;
        }
        Command::Serve => serve(settings, clock).await?,
    }

    Ok(())
}

async fn quote_request(engine: &SwapEngine, args: &SwapArgs) -> Result<QuoteRequest> {
    Ok(QuoteRequest {
        direction: args.direction,
        asset: engine.resolve_asset(&args.asset).await?,
        amount: args.amount.clone(),
        recipient: args.recipient.clone(),
        refund: RefundContext {
            source_chain_refund_address: args.refund_address.clone(),
            home_refund_address: args.home_refund_address.clone(),
        },
    })
}

async fn run_swap(settings: &Settings, clock: Arc<dyn Clock>, args: SwapArgs) -> Result<()> {
    let store = open_store(settings).await?;
    let engine = SwapEngine::new(settings, clock)?;

    let mut events = engine.events().subscribe();

    let request = quote_request(&engine, &args).await?;
    let quotes = engine.get_quotes(&request).await?;
    let best = quotes.first().context("no quotes returned")?;

    let params = ExecParams {
        destination_address: args.recipient.clone(),
        source_chain_refund_address: args.refund_address.clone(),
        home_refund_address: args.home_refund_address.clone(),
    };
    let swap = engine.execute(best, &params).await?;
    store.save_swap(&swap).await?;
    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }

    info!(
        "Send {} {} to {} (swap {})",
        swap.from_amount,
        swap.from_asset.symbol,
        swap.deposit_address.as_deref().unwrap_or("-"),
        swap.id
    );
    print_json(&swap)
}

async fn serve(settings: Settings, clock: Arc<dyn Clock>) -> Result<()> {
    info!("Starting Zecswap v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&settings).await?;
    info!("Database connection established");

    let engine = Arc::new(SwapEngine::new(&settings, clock.clone())?);
    let events = engine.events();

    let monitor = Arc::new(SwapMonitor::new(
        store.clone(),
        engine.tracker(),
        events.clone(),
        clock,
        settings.tracker.clone(),
    ));

    // Start API server
    let api_handle = if settings.api.enabled {
        let config = settings.api.clone();
        let store = store.clone();
        let engine = engine.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = api::run_server(config, store, engine).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start swap monitor
    let monitor_handle = tokio::spawn({
        let monitor = monitor.clone();
        async move {
            if let Err(e) = monitor.run().await {
                error!("Swap monitor error: {}", e);
            }
        }
    });

    // Log lifecycle events
    let event_handle = tokio::spawn({
        let mut rx = events.subscribe();
        async move {
            loop {
                match rx.recv().await {
                    Ok(event) => log_event(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event log lagged, skipped {} events", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    info!("Zecswap is running in {} mode", engine.mode());
    if settings.api.enabled {
        info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    }
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    monitor.stop().await;

    // Abort background tasks
    monitor_handle.abort();
    event_handle.abort();
    if let Some(h) = api_handle {
        h.abort();
    }
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Zecswap stopped");
    Ok(())
}

async fn open_store(settings: &Settings) -> Result<Arc<SwapStore>> {
    let store = SwapStore::new(&settings.database)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database.url))?;
    store.run_migrations().await?;
    Ok(Arc::new(store))
}

fn log_event(event: &SwapEvent) {
    match event {
        SwapEvent::Failed { swap_id, reason, .. } => warn!("Swap {} failed: {}", swap_id, reason),
        SwapEvent::TrackingAbandoned { swap_id, polls, .. } => {
            warn!("Stopped tracking swap {} after {} polls", swap_id, polls)
        }
        other => info!("Swap {}: {}", other.swap_id(), other.name()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zecswap=debug,sqlx=warn,hyper=warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    // Logs go to stderr so command output on stdout stays machine-readable
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
