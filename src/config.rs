//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::venue::{Asset, MarketKind, VenueId};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Venue Universe ===
    /// Venues to aggregate (comma-separated, e.g. "binance,kraken").
    #[serde(default = "default_venues")]
    pub venues: Vec<VenueId>,

    /// Supported symbols (comma-separated, e.g. "BTC,ETH").
    #[serde(default = "default_symbols")]
    pub symbols: Vec<Asset>,

    /// Venues scanned for triangular cycles.
    #[serde(default = "default_triangular_venues")]
    pub triangular_venues: Vec<VenueId>,

    // === Fetch Parameters ===
    /// Order book depth requested from each venue.
    #[serde(default = "default_depth_limit")]
    pub depth_limit: u32,

    /// Per-venue request timeout in milliseconds.
    #[serde(default = "default_venue_timeout_ms")]
    pub venue_timeout_ms: u64,

    /// Global deadline for one aggregation cycle in milliseconds.
    #[serde(default = "default_cycle_timeout_ms")]
    pub cycle_timeout_ms: u64,

    /// Snapshot cache TTL in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// HTTP connection pool size per venue host.
    #[serde(default = "default_http_pool_size")]
    pub http_pool_size: usize,

    // === Analytics Parameters ===
    /// Reference notional (quote units) for the liquidity depth score.
    #[serde(default = "default_liquidity_reference_quote")]
    pub liquidity_reference_quote: Decimal,

    /// Order sizes (quote units) for the dashboard slippage ladder.
    #[serde(default = "default_dashboard_order_sizes")]
    pub dashboard_order_sizes: Vec<Decimal>,

    /// Flat taker fee override in basis points; unset uses the per-venue
    /// schedule.
    #[serde(default)]
    pub taker_fee_bps: Option<Decimal>,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable Prometheus metrics exporter.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Prometheus exporter port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_venues() -> Vec<VenueId> {
    VenueId::all().to_vec()
}

fn default_symbols() -> Vec<Asset> {
    vec![
        Asset::Btc,
        Asset::Eth,
        Asset::Sol,
        Asset::Bnb,
        Asset::Xrp,
        Asset::Ada,
        Asset::Doge,
        Asset::Avax,
    ]
}

fn default_triangular_venues() -> Vec<VenueId> {
    vec![VenueId::Binance, VenueId::Bybit, VenueId::Okx]
}

fn default_depth_limit() -> u32 {
    100
}

fn default_venue_timeout_ms() -> u64 {
    3_000
}

fn default_cycle_timeout_ms() -> u64 {
    5_000
}

fn default_cache_ttl_ms() -> u64 {
    10_000
}

fn default_http_pool_size() -> usize {
    10
}

fn default_liquidity_reference_quote() -> Decimal {
    Decimal::new(1_000_000, 0)
}

fn default_dashboard_order_sizes() -> Vec<Decimal> {
    vec![
        Decimal::new(10_000, 0),
        Decimal::new(50_000, 0),
        Decimal::new(100_000, 0),
        Decimal::new(500_000, 0),
    ]
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.venues.is_empty() {
            return Err("VENUES must name at least one venue".to_string());
        }

        if self.symbols.is_empty() {
            return Err("SYMBOLS must name at least one symbol".to_string());
        }

        if self.symbols.contains(&Asset::Usdt) {
            return Err("SYMBOLS must not contain the quote asset USDT".to_string());
        }

        if self.depth_limit == 0 {
            return Err("DEPTH_LIMIT must be positive".to_string());
        }

        if self.venue_timeout_ms > self.cycle_timeout_ms {
            return Err("VENUE_TIMEOUT_MS must not exceed CYCLE_TIMEOUT_MS".to_string());
        }

        if self.liquidity_reference_quote <= Decimal::ZERO {
            return Err("LIQUIDITY_REFERENCE_QUOTE must be positive".to_string());
        }

        if let Some(bps) = self.taker_fee_bps {
            if bps < Decimal::ZERO {
                return Err("TAKER_FEE_BPS must be non-negative".to_string());
            }
        }

        Ok(())
    }

    /// Whether a symbol is in the supported set.
    pub fn supports_symbol(&self, symbol: Asset) -> bool {
        self.symbols.contains(&symbol)
    }

    /// Venues eligible for a market kind, in deterministic id order.
    pub fn venues_for(&self, market: MarketKind) -> Vec<VenueId> {
        let mut venues: Vec<VenueId> = self
            .venues
            .iter()
            .copied()
            .filter(|v| v.supports(market))
            .collect();
        venues.sort();
        venues.dedup();
        venues
    }

    /// Assumed taker fee for a venue, as a percentage.
    pub fn taker_fee_percent(&self, venue: VenueId) -> Decimal {
        let bps = match self.taker_fee_bps {
            Some(flat) => flat,
            None => FeeSchedule::default().taker_bps(venue),
        };
        bps / Decimal::ONE_HUNDRED
    }

    /// Per-venue request timeout.
    pub fn venue_timeout(&self) -> Duration {
        Duration::from_millis(self.venue_timeout_ms)
    }

    /// Global per-cycle deadline.
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }

    /// Snapshot cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            venues: default_venues(),
            symbols: default_symbols(),
            triangular_venues: default_triangular_venues(),
            depth_limit: default_depth_limit(),
            venue_timeout_ms: default_venue_timeout_ms(),
            cycle_timeout_ms: default_cycle_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            http_pool_size: default_http_pool_size(),
            liquidity_reference_quote: default_liquidity_reference_quote(),
            dashboard_order_sizes: default_dashboard_order_sizes(),
            taker_fee_bps: None,
            port: default_port(),
            rust_log: default_log_level(),
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

/// Assumed taker fees per venue, in basis points.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    fees: HashMap<VenueId, Decimal>,
}

impl FeeSchedule {
    /// Taker fee for a venue in basis points.
    pub fn taker_bps(&self, venue: VenueId) -> Decimal {
        self.fees
            .get(&venue)
            .copied()
            .unwrap_or_else(|| Decimal::new(10, 0))
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fees: HashMap::from([
                (VenueId::Binance, Decimal::new(10, 0)),
                (VenueId::Bybit, Decimal::new(10, 0)),
                (VenueId::Okx, Decimal::new(10, 0)),
                (VenueId::Kraken, Decimal::new(26, 0)),
                (VenueId::Kucoin, Decimal::new(10, 0)),
                (VenueId::Coinbase, Decimal::new(60, 0)),
            ]),
        }
    }
}
