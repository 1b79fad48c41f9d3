//! Conversion of raw venue responses into validated `VenueBook`s.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::debug;

use super::types::{PriceLevel, VenueBook};
use crate::error::{VenueError, VenueErrorKind};
use crate::venue::{RawBook, RawLevel};

/// Decimal places prices are normalized to before any cross-venue
/// comparison; two venues quoting the same price must merge exactly.
pub const PRICE_DP: u32 = 8;

/// Normalize one venue's raw book.
///
/// Discards unusable levels (non-positive price or quantity) instead of
/// failing the whole book, merges duplicate prices within the venue, and
/// sorts both sides. Rejects a book with an empty side or a crossed top of
/// book, since either indicates corrupt input.
pub fn normalize_book(raw: RawBook) -> Result<VenueBook, VenueError> {
    let venue = raw.venue;

    let (bids, dropped_bids) = sanitize(&raw.bids);
    let (asks, dropped_asks) = sanitize(&raw.asks);
    let dropped_levels = dropped_bids + dropped_asks;

    if dropped_levels > 0 {
        debug!(
            venue = %venue,
            pair = %raw.pair,
            dropped = dropped_levels,
            "discarded unusable levels during normalization"
        );
    }

    // Descending bids, ascending asks.
    let bids: Vec<PriceLevel> = bids.into_iter().rev().collect();
    let asks: Vec<PriceLevel> = asks;

    let (best_bid, best_ask) = match (bids.first(), asks.first()) {
        (Some(bid), Some(ask)) => (bid.price, ask.price),
        _ => return Err(VenueError::new(venue, VenueErrorKind::EmptyBook)),
    };

    if best_bid >= best_ask {
        return Err(VenueError::new(
            venue,
            VenueErrorKind::CrossedBook {
                bid: best_bid,
                ask: best_ask,
            },
        ));
    }

    let mid_price = (best_bid + best_ask) / Decimal::TWO;
    let spread = best_ask - best_bid;
    let spread_percent = spread / mid_price * Decimal::ONE_HUNDRED;

    Ok(VenueBook {
        venue,
        pair: raw.pair,
        market: raw.market,
        spread,
        spread_percent,
        mid_price,
        bid_depth_quote: bids.iter().map(PriceLevel::quote_value).sum(),
        ask_depth_quote: asks.iter().map(PriceLevel::quote_value).sum(),
        bids,
        asks,
        dropped_levels,
        latency_ms: raw.latency.as_millis() as u64,
        fetched_at: OffsetDateTime::now_utc(),
    })
}

/// Drop unusable levels, normalize prices, and merge duplicates.
///
/// Returns levels in ascending price order plus the dropped count.
fn sanitize(levels: &[RawLevel]) -> (Vec<PriceLevel>, usize) {
    let mut merged: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    let mut dropped = 0usize;

    for level in levels {
        if level.price <= Decimal::ZERO || level.quantity <= Decimal::ZERO {
            dropped += 1;
            continue;
        }
        let price = level.price.round_dp(PRICE_DP).normalize();
        *merged.entry(price).or_insert(Decimal::ZERO) += level.quantity;
    }

    let levels = merged
        .into_iter()
        .map(|(price, quantity)| PriceLevel::new(price, quantity))
        .collect();

    (levels, dropped)
}
