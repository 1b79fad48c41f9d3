//! Order book aggregation engine entry point.

use std::net::SocketAddr;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crossbook::api::{create_router, AppState};
use crossbook::arbitrage::{scan_spot, scan_triangular, sort_opportunities, SortKey};
use crossbook::config::Config;
use crossbook::metrics;
use crossbook::venue::{Asset, MarketKind, VenueClient};

/// Multi-exchange order book aggregation and arbitrage detection engine.
#[derive(Parser, Debug)]
#[command(name = "crossbook")]
#[command(about = "Aggregates order books across exchanges and detects arbitrage")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server (default).
    Serve {
        /// HTTP server port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch and print one aggregated snapshot.
    Snapshot {
        /// Symbol, e.g. BTC.
        symbol: String,

        /// Market kind: spot or futures.
        #[arg(long, default_value = "spot")]
        market: String,
    },

    /// Run one arbitrage scan and print the opportunities.
    Scan {
        /// Sort key: score, spread, or profit.
        #[arg(long, default_value = "score")]
        sort: String,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("crossbook=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Snapshot { symbol, market }) => cmd_snapshot(&symbol, &market).await,
        Some(Command::Scan { sort }) => cmd_scan(&sort).await,
        Some(Command::Serve { port }) => cmd_serve(port).await,
        None => cmd_serve(None).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("configuration load failed: {e}")
    })?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration invalid: {e}"))?;
    Ok(config)
}

/// Run the HTTP API server.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config()?;
    if let Some(port) = port_override {
        config.port = port;
    }

    metrics::init_metrics();
    if config.metrics_enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    info!(
        venues = config.venues.len(),
        symbols = config.symbols.len(),
        cache_ttl_ms = config.cache_ttl_ms,
        "Starting aggregation engine"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let state = AppState::new(VenueClient::new(&config), config);
    let router = create_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Fetch one snapshot and print a summary.
async fn cmd_snapshot(symbol: &str, market: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let symbol = Asset::from_str(symbol)
        .map_err(|_| anyhow::anyhow!("unknown symbol: {symbol}"))?;
    let market = MarketKind::from_str(market)
        .map_err(|_| anyhow::anyhow!("unknown market: {market}"))?;

    let state = AppState::new(VenueClient::new(&config), config);
    let snapshot = state.engine.snapshot(symbol, market).await?;
    let book = &snapshot.aggregated;

    println!("======================================================================");
    println!("{} {} AGGREGATED ORDER BOOK", symbol, market);
    println!("======================================================================");
    println!(
        "  Venues: {}",
        book.venues
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Best Bid: {} @ {} ({})",
        book.best_bid.quantity, book.best_bid.price, book.best_bid.venue
    );
    println!(
        "  Best Ask: {} @ {} ({})",
        book.best_ask.quantity, book.best_ask.price, book.best_ask.venue
    );
    println!("  Mid: {}", book.mid_price.round_dp(8));
    println!(
        "  Spread: {} ({}%)",
        book.spread.round_dp(8),
        book.spread_percent.round_dp(4)
    );
    println!(
        "  Depth: bid {} / ask {} (quote units)",
        book.total_bid_depth_quote.round_dp(2),
        book.total_ask_depth_quote.round_dp(2)
    );
    println!("  Imbalance: {}", book.imbalance.round_dp(4));
    println!("----------------------------------------------------------------------");
    for venue in &book.venue_breakdown {
        println!(
            "  {:<10} bid {} ({}%)  ask {} ({}%)  {}ms",
            venue.venue.to_string(),
            venue.bid_depth_quote.round_dp(2),
            venue.bid_percent.round_dp(1),
            venue.ask_depth_quote.round_dp(2),
            venue.ask_percent.round_dp(1),
            venue.latency_ms
        );
    }
    for failed in &snapshot.diagnostics {
        println!("  {:<10} EXCLUDED: {}", failed.venue.to_string(), failed.kind);
    }
    println!("======================================================================");

    Ok(())
}

/// Run one arbitrage scan and print the results.
async fn cmd_scan(sort: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let sort = SortKey::from_str(sort).map_err(|_| anyhow::anyhow!("unknown sort key: {sort}"))?;

    let state = AppState::new(VenueClient::new(&config), config);

    println!("======================================================================");
    println!("ARBITRAGE SCAN");
    println!("======================================================================");

    let mut spot = Vec::new();
    for &symbol in &state.config.symbols {
        match state.engine.snapshot(symbol, MarketKind::Spot).await {
            Ok(snapshot) => {
                spot.extend(scan_spot(symbol, &snapshot.venue_books, &state.config));
            }
            Err(e) => println!("  {symbol}: skipped ({e})"),
        }
    }
    sort_opportunities(&mut spot, sort);

    println!("\nSpot opportunities: {}", spot.len());
    for opp in &spot {
        println!(
            "  {} buy {} @ {} -> sell {} @ {} | net {}% | score {}",
            opp.symbol,
            opp.buy_venue,
            opp.buy_price,
            opp.sell_venue,
            opp.sell_price,
            opp.net_profit_percent.round_dp(4),
            opp.overall_score.round_dp(2)
        );
    }

    let triangular = scan_triangular(state.engine.source().as_ref(), &state.config).await;
    println!("\nTriangular opportunities: {}", triangular.len());
    for opp in &triangular {
        let path = opp
            .path
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        println!(
            "  {} {} | net {}%",
            opp.venue,
            path,
            opp.profit_percent.round_dp(4)
        );
    }

    println!("======================================================================");
    Ok(())
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CROSSBOOK - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!(
        "  Venues: {}",
        config
            .venues
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Symbols: {}",
        config
            .symbols
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Cache TTL: {}ms", config.cache_ttl_ms);
    println!("  Venue Timeout: {}ms", config.venue_timeout_ms);
    println!("  Cycle Timeout: {}ms", config.cycle_timeout_ms);
    println!("  Depth Limit: {}", config.depth_limit);
    match config.taker_fee_bps {
        Some(bps) => println!("  Taker Fee: {} bps (flat override)", bps),
        None => println!("  Taker Fee: per-venue schedule"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
