//! HTTP API handlers.
//!
//! All rounding of monetary figures happens here, at the boundary:
//! prices and quantities to 8 decimal places, quote notionals to 2,
//! percentages to 4. Engine internals always carry full precision.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analytics::{analyze_liquidity, estimate_slippage, LiquidityReport, SlippageEstimate};
use crate::arbitrage::{
    scan_spot, scan_triangular, sort_opportunities, SortKey, SpotOpportunity,
    TriangularOpportunity,
};
use crate::book::{AggregatedBook, BookSnapshot, VenueBook};
use crate::config::Config;
use crate::error::{EngineError, RequestError};
use crate::metrics;
use crate::refresh::{MemoryStore, RefreshService};
use crate::venue::{Asset, BookSource, MarketKind, Side, VenueClient, VenueId};

/// Decimal places for prices and base quantities.
const PRICE_DP: u32 = 8;
/// Decimal places for quote notionals.
const QUOTE_DP: u32 = 2;
/// Decimal places for percentages and ratios.
const PERCENT_DP: u32 = 4;

/// Application state shared with handlers.
#[derive(Debug)]
pub struct AppState<S = VenueClient> {
    /// Refresh service serving cached snapshots.
    pub engine: Arc<RefreshService<S, MemoryStore>>,
    /// Engine configuration.
    pub config: Arc<Config>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: BookSource + 'static> AppState<S> {
    /// Create state over a book source.
    pub fn new(source: S, config: Config) -> Self {
        let config = Arc::new(config);
        let store = MemoryStore::new(config.cache_ttl());
        let engine = Arc::new(RefreshService::new(Arc::new(source), store, config.clone()));
        Self { engine, config }
    }
}

/// Error wrapper mapping engine errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self(EngineError::Request(err))
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable failure reason.
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Request(_) => StatusCode::BAD_REQUEST,
            EngineError::NoVenuesAvailable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// === Request parsing ===

fn parse_symbol(config: &Config, raw: &str) -> Result<Asset, RequestError> {
    let symbol = Asset::from_str(raw)
        .map_err(|_| RequestError::UnsupportedSymbol(raw.to_string()))?;
    if !config.supports_symbol(symbol) {
        return Err(RequestError::UnsupportedSymbol(raw.to_string()));
    }
    Ok(symbol)
}

fn parse_market(raw: Option<&str>) -> Result<MarketKind, RequestError> {
    match raw {
        None => Ok(MarketKind::Spot),
        Some(raw) => MarketKind::from_str(raw)
            .map_err(|_| RequestError::UnsupportedMarket(raw.to_string())),
    }
}

// === Shared query shapes ===

/// Common query parameters for book-shaped endpoints.
#[derive(Debug, Deserialize)]
pub struct BookQuery {
    /// Market kind, defaults to spot.
    pub market: Option<String>,
    /// Truncate merged ladders to this many levels per side.
    pub depth: Option<usize>,
}

/// Query parameters for the slippage endpoint.
#[derive(Debug, Deserialize)]
pub struct SlippageQuery {
    /// Market kind, defaults to spot.
    pub market: Option<String>,
    /// Order side, `buy` or `sell`.
    pub side: String,
    /// Order size in quote units.
    pub size: Decimal,
}

/// Query parameters for the arbitrage scan.
#[derive(Debug, Deserialize)]
pub struct ArbitrageQuery {
    /// Sort key: `score`, `spread`, or `profit`.
    pub sort: Option<String>,
}

// === Responses ===

/// One failed venue in a snapshot's diagnostics.
#[derive(Debug, Serialize)]
pub struct FailedVenue {
    /// Venue that was excluded.
    pub venue: VenueId,
    /// Failure reason.
    pub reason: String,
}

fn failed_venues(snapshot: &BookSnapshot) -> Vec<FailedVenue> {
    snapshot
        .diagnostics
        .iter()
        .map(|err| FailedVenue {
            venue: err.venue,
            reason: err.kind.to_string(),
        })
        .collect()
}

/// Aggregated book response.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    /// Merged book, boundary-rounded.
    pub book: AggregatedBook,
    /// Venues excluded this cycle.
    pub failed_venues: Vec<FailedVenue>,
}

/// Per-venue books response.
#[derive(Debug, Serialize)]
pub struct VenueBooksResponse {
    /// Symbol requested.
    pub symbol: Asset,
    /// Market requested.
    pub market: MarketKind,
    /// Contributing venue books, boundary-rounded.
    pub books: Vec<VenueBook>,
    /// Venues excluded this cycle.
    pub failed_venues: Vec<FailedVenue>,
}

/// Arbitrage scan response.
#[derive(Debug, Serialize)]
pub struct ArbitrageResponse {
    /// Spot opportunities across all supported symbols.
    pub spot: Vec<SpotOpportunity>,
    /// Triangular opportunities on the configured venues.
    pub triangular: Vec<TriangularOpportunity>,
    /// Symbols whose snapshot could not be refreshed.
    pub skipped_symbols: Vec<Asset>,
}

/// Slippage ladder entry for the dashboard.
#[derive(Debug, Serialize)]
pub struct SlippageLadder {
    /// Buy-side estimates, one per configured notional.
    pub buy: Vec<SlippageEstimate>,
    /// Sell-side estimates, one per configured notional.
    pub sell: Vec<SlippageEstimate>,
}

/// Combined dashboard response.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Merged book, boundary-rounded.
    pub book: AggregatedBook,
    /// Liquidity analysis.
    pub liquidity: LiquidityReport,
    /// Slippage at the configured order sizes.
    pub slippage: SlippageLadder,
    /// Best cross-venue opportunity in this snapshot, if any.
    pub top_opportunity: Option<SpotOpportunity>,
    /// Venues excluded this cycle.
    pub failed_venues: Vec<FailedVenue>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

// === Handlers ===

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Serve the merged ladder for a symbol.
pub async fn aggregated_book<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookResponse>, ApiError> {
    let symbol = parse_symbol(&state.config, &symbol)?;
    let market = parse_market(query.market.as_deref())?;

    let snapshot = state.engine.snapshot(symbol, market).await?;

    let mut book = round_aggregated(snapshot.aggregated.clone());
    if let Some(depth) = query.depth {
        book.bids.truncate(depth);
        book.asks.truncate(depth);
    }

    Ok(Json(BookResponse {
        book,
        failed_venues: failed_venues(&snapshot),
    }))
}

/// Serve the individual venue ladders for a symbol.
pub async fn venue_books<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<VenueBooksResponse>, ApiError> {
    let symbol = parse_symbol(&state.config, &symbol)?;
    let market = parse_market(query.market.as_deref())?;

    let snapshot = state.engine.snapshot(symbol, market).await?;

    let mut books: Vec<VenueBook> = snapshot
        .venue_books
        .iter()
        .cloned()
        .map(round_venue_book)
        .collect();
    if let Some(depth) = query.depth {
        for book in &mut books {
            book.bids.truncate(depth);
            book.asks.truncate(depth);
        }
    }

    Ok(Json(VenueBooksResponse {
        symbol,
        market,
        books,
        failed_venues: failed_venues(&snapshot),
    }))
}

/// Estimate slippage for a hypothetical order.
pub async fn slippage<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Path(symbol): Path<String>,
    Query(query): Query<SlippageQuery>,
) -> Result<Json<SlippageEstimate>, ApiError> {
    let symbol = parse_symbol(&state.config, &symbol)?;
    let market = parse_market(query.market.as_deref())?;
    let side = Side::from_str(&query.side).map_err(|_| RequestError::InvalidParameter {
        name: "side",
        reason: format!("expected buy or sell, got {:?}", query.side),
    })?;
    if query.size < Decimal::ZERO {
        return Err(RequestError::InvalidParameter {
            name: "size",
            reason: "must be non-negative".to_string(),
        }
        .into());
    }

    let snapshot = state.engine.snapshot(symbol, market).await?;
    let estimate = estimate_slippage(&snapshot.aggregated, side, query.size);

    Ok(Json(round_slippage(estimate)))
}

/// Analyze liquidity depth bands for a symbol.
pub async fn liquidity<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<LiquidityReport>, ApiError> {
    let symbol = parse_symbol(&state.config, &symbol)?;
    let market = parse_market(query.market.as_deref())?;

    let snapshot = state.engine.snapshot(symbol, market).await?;
    let report = analyze_liquidity(&snapshot.aggregated, state.config.liquidity_reference_quote);

    Ok(Json(round_liquidity(report)))
}

/// Scan all supported symbols for spot and triangular opportunities.
pub async fn arbitrage<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ArbitrageQuery>,
) -> Result<Json<ArbitrageResponse>, ApiError> {
    let sort = match query.sort.as_deref() {
        None => SortKey::default(),
        Some(raw) => SortKey::from_str(raw).map_err(|_| RequestError::InvalidParameter {
            name: "sort",
            reason: format!("expected score, spread, or profit, got {raw:?}"),
        })?,
    };

    let mut spot = Vec::new();
    let mut skipped_symbols = Vec::new();

    // A symbol whose venues are all down degrades the scan's coverage,
    // not the whole scan.
    for &symbol in &state.config.symbols {
        match state.engine.snapshot(symbol, MarketKind::Spot).await {
            Ok(snapshot) => {
                spot.extend(scan_spot(symbol, &snapshot.venue_books, &state.config));
            }
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "symbol skipped in arbitrage scan");
                skipped_symbols.push(symbol);
            }
        }
    }
    sort_opportunities(&mut spot, sort);

    let triangular = scan_triangular(state.engine.source().as_ref(), &state.config).await;

    metrics::inc_spot_opportunities(spot.len());
    metrics::inc_triangular_opportunities(triangular.len());

    Ok(Json(ArbitrageResponse {
        spot: spot.into_iter().map(round_spot).collect(),
        triangular: triangular.into_iter().map(round_triangular).collect(),
        skipped_symbols,
    }))
}

/// Combined dashboard view for a symbol.
pub async fn dashboard<S: BookSource + 'static>(
    State(state): State<AppState<S>>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let symbol = parse_symbol(&state.config, &symbol)?;
    let market = parse_market(query.market.as_deref())?;

    let snapshot = state.engine.snapshot(symbol, market).await?;
    let aggregated = &snapshot.aggregated;

    let report = analyze_liquidity(aggregated, state.config.liquidity_reference_quote);

    let ladder = |side: Side| -> Vec<SlippageEstimate> {
        state
            .config
            .dashboard_order_sizes
            .iter()
            .map(|&size| round_slippage(estimate_slippage(aggregated, side, size)))
            .collect()
    };

    let mut opportunities = scan_spot(symbol, &snapshot.venue_books, &state.config);
    sort_opportunities(&mut opportunities, SortKey::Score);
    let top_opportunity = opportunities.into_iter().next().map(round_spot);

    Ok(Json(DashboardResponse {
        book: round_aggregated(aggregated.clone()),
        liquidity: round_liquidity(report),
        slippage: SlippageLadder {
            buy: ladder(Side::Buy),
            sell: ladder(Side::Sell),
        },
        top_opportunity,
        failed_venues: failed_venues(&snapshot),
    }))
}

// === Boundary rounding ===

fn round_aggregated(mut book: AggregatedBook) -> AggregatedBook {
    for level in book.bids.iter_mut().chain(book.asks.iter_mut()) {
        level.price = level.price.round_dp(PRICE_DP);
        level.quantity = level.quantity.round_dp(PRICE_DP);
        level.quote_value = level.quote_value.round_dp(QUOTE_DP);
        for share in &mut level.contributions {
            share.quantity = share.quantity.round_dp(PRICE_DP);
        }
    }
    book.best_bid.price = book.best_bid.price.round_dp(PRICE_DP);
    book.best_bid.quantity = book.best_bid.quantity.round_dp(PRICE_DP);
    book.best_ask.price = book.best_ask.price.round_dp(PRICE_DP);
    book.best_ask.quantity = book.best_ask.quantity.round_dp(PRICE_DP);
    book.mid_price = book.mid_price.round_dp(PRICE_DP);
    book.spread = book.spread.round_dp(PRICE_DP);
    book.spread_percent = book.spread_percent.round_dp(PERCENT_DP);
    book.total_bid_depth_quote = book.total_bid_depth_quote.round_dp(QUOTE_DP);
    book.total_ask_depth_quote = book.total_ask_depth_quote.round_dp(QUOTE_DP);
    book.imbalance = book.imbalance.round_dp(PERCENT_DP);
    for venue in &mut book.venue_breakdown {
        venue.bid_depth_quote = venue.bid_depth_quote.round_dp(QUOTE_DP);
        venue.ask_depth_quote = venue.ask_depth_quote.round_dp(QUOTE_DP);
        venue.bid_percent = venue.bid_percent.round_dp(PERCENT_DP);
        venue.ask_percent = venue.ask_percent.round_dp(PERCENT_DP);
        venue.spread = venue.spread.round_dp(PRICE_DP);
    }
    book
}

fn round_venue_book(mut book: VenueBook) -> VenueBook {
    for level in book.bids.iter_mut().chain(book.asks.iter_mut()) {
        level.price = level.price.round_dp(PRICE_DP);
        level.quantity = level.quantity.round_dp(PRICE_DP);
    }
    book.spread = book.spread.round_dp(PRICE_DP);
    book.spread_percent = book.spread_percent.round_dp(PERCENT_DP);
    book.mid_price = book.mid_price.round_dp(PRICE_DP);
    book.bid_depth_quote = book.bid_depth_quote.round_dp(QUOTE_DP);
    book.ask_depth_quote = book.ask_depth_quote.round_dp(QUOTE_DP);
    book
}

fn round_slippage(mut est: SlippageEstimate) -> SlippageEstimate {
    est.average_price = est.average_price.round_dp(PRICE_DP);
    est.worst_price = est.worst_price.round_dp(PRICE_DP);
    est.slippage_percent = est.slippage_percent.round_dp(PERCENT_DP);
    est.slippage_quote = est.slippage_quote.round_dp(QUOTE_DP);
    est.filled_quote = est.filled_quote.round_dp(QUOTE_DP);
    est.filled_base = est.filled_base.round_dp(PRICE_DP);
    est.shortfall_quote = est.shortfall_quote.round_dp(QUOTE_DP);
    for fill in &mut est.venue_fills {
        fill.quantity = fill.quantity.round_dp(PRICE_DP);
    }
    est
}

fn round_liquidity(mut report: LiquidityReport) -> LiquidityReport {
    for band in [
        &mut report.depth_1_percent,
        &mut report.depth_2_percent,
        &mut report.depth_5_percent,
        &mut report.depth_10_percent,
    ] {
        band.bid = band.bid.round_dp(QUOTE_DP);
        band.ask = band.ask.round_dp(QUOTE_DP);
    }
    report.bid_ask_ratio = report.bid_ask_ratio.round_dp(PERCENT_DP);
    report
}

fn round_spot(mut opp: SpotOpportunity) -> SpotOpportunity {
    opp.buy_price = opp.buy_price.round_dp(PRICE_DP);
    opp.sell_price = opp.sell_price.round_dp(PRICE_DP);
    opp.spread_percent = opp.spread_percent.round_dp(PERCENT_DP);
    opp.estimated_fees_percent = opp.estimated_fees_percent.round_dp(PERCENT_DP);
    opp.net_profit_percent = opp.net_profit_percent.round_dp(PERCENT_DP);
    opp.overall_score = opp.overall_score.round_dp(PERCENT_DP);
    opp
}

fn round_triangular(mut opp: TriangularOpportunity) -> TriangularOpportunity {
    for leg in &mut opp.legs {
        leg.rate = leg.rate.round_dp(PRICE_DP);
    }
    opp.gross_factor = opp.gross_factor.round_dp(PRICE_DP);
    opp.profit_percent = opp.profit_percent.round_dp(PERCENT_DP);
    opp
}
