//! Order book types: per-venue books, merged ladders, snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::VenueError;
use crate::venue::{Asset, MarketKind, Pair, VenueId};

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Quantity available at this price, in base units.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Value of this level in quote units.
    pub fn quote_value(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// One venue's normalized order book.
///
/// Produced only by the normalizer: bids strictly descending, asks strictly
/// ascending, both sides non-empty, best bid below best ask. Never mutated
/// after construction.
#[derive(Debug, Clone, Serialize)]
pub struct VenueBook {
    /// Venue the book came from.
    pub venue: VenueId,
    /// Pair the book is for.
    pub pair: Pair,
    /// Market kind.
    pub market: MarketKind,
    /// Bid levels, price descending.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, price ascending.
    pub asks: Vec<PriceLevel>,
    /// Best ask minus best bid.
    pub spread: Decimal,
    /// Spread as a percentage of mid price.
    pub spread_percent: Decimal,
    /// Midpoint of best bid and best ask.
    pub mid_price: Decimal,
    /// Total bid-side value in quote units.
    pub bid_depth_quote: Decimal,
    /// Total ask-side value in quote units.
    pub ask_depth_quote: Decimal,
    /// Levels discarded during normalization.
    pub dropped_levels: usize,
    /// Fetch round-trip latency in milliseconds.
    pub latency_ms: u64,
    /// When the book was fetched.
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

impl VenueBook {
    /// Best (highest) bid level.
    pub fn best_bid(&self) -> &PriceLevel {
        &self.bids[0]
    }

    /// Best (lowest) ask level.
    pub fn best_ask(&self) -> &PriceLevel {
        &self.asks[0]
    }
}

/// Quantity contributed by one venue at a merged level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VenueShare {
    /// Contributing venue.
    pub venue: VenueId,
    /// Quantity contributed, in base units.
    pub quantity: Decimal,
}

/// One price level of the merged ladder, with per-venue attribution.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregatedLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Summed quantity across contributing venues.
    pub quantity: Decimal,
    /// Level value in quote units.
    pub quote_value: Decimal,
    /// Per-venue contributions, in venue id order.
    pub contributions: Vec<VenueShare>,
}

/// Best price on one side of the aggregate, with its source venue.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BestPrice {
    /// The price.
    pub price: Decimal,
    /// Quantity at the source venue's best level.
    pub quantity: Decimal,
    /// Venue quoting this price.
    pub venue: VenueId,
}

/// One venue's share of the aggregate depth.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VenueDepth {
    /// Venue.
    pub venue: VenueId,
    /// Venue bid depth in quote units.
    pub bid_depth_quote: Decimal,
    /// Venue ask depth in quote units.
    pub ask_depth_quote: Decimal,
    /// Share of total bid depth, percent.
    pub bid_percent: Decimal,
    /// Share of total ask depth, percent.
    pub ask_percent: Decimal,
    /// Venue's own spread.
    pub spread: Decimal,
    /// Venue fetch latency in milliseconds.
    pub latency_ms: u64,
}

/// Unified order book view across all contributing venues.
///
/// Built fresh per aggregation cycle and never mutated afterwards; readers
/// only ever see a fully constructed instance.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedBook {
    /// Symbol the book is for.
    pub symbol: Asset,
    /// Market kind.
    pub market: MarketKind,
    /// Venues whose fetch succeeded, in id order.
    pub venues: Vec<VenueId>,
    /// Merged bid ladder, price descending.
    pub bids: Vec<AggregatedLevel>,
    /// Merged ask ladder, price ascending.
    pub asks: Vec<AggregatedLevel>,
    /// Highest bid across venues.
    pub best_bid: BestPrice,
    /// Lowest ask across venues.
    pub best_ask: BestPrice,
    /// Midpoint of best bid and best ask.
    pub mid_price: Decimal,
    /// Best ask minus best bid (negative when venues cross each other).
    pub spread: Decimal,
    /// Spread as a percentage of mid price.
    pub spread_percent: Decimal,
    /// Total bid depth in quote units.
    pub total_bid_depth_quote: Decimal,
    /// Total ask depth in quote units.
    pub total_ask_depth_quote: Decimal,
    /// (bid - ask) / (bid + ask) depth ratio, clamped to [-1, 1].
    pub imbalance: Decimal,
    /// Per-venue depth breakdown, largest contributor first.
    pub venue_breakdown: Vec<VenueDepth>,
    /// When the aggregate was computed.
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
}

/// The cache unit: one cycle's aggregate plus its inputs and diagnostics.
///
/// Published behind an `Arc` in a single store operation, so readers never
/// observe a partially built snapshot.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    /// Merged view.
    pub aggregated: AggregatedBook,
    /// The contributing per-venue books.
    pub venue_books: Vec<VenueBook>,
    /// Venues that failed this cycle, with reasons.
    pub diagnostics: Vec<VenueError>,
}
