//! Merging normalized venue books into one unified ladder.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::types::{
    AggregatedBook, AggregatedLevel, BestPrice, VenueBook, VenueDepth, VenueShare,
};
use crate::venue::{Asset, MarketKind};

/// Merge venue books into an [`AggregatedBook`].
///
/// Levels at identical normalized price are grouped across venues into one
/// merged level with summed quantity. Returns `None` when no book
/// contributed; a single contributing venue is a valid degenerate
/// aggregate, not an error.
pub fn aggregate_books(
    symbol: Asset,
    market: MarketKind,
    books: &[VenueBook],
) -> Option<AggregatedBook> {
    if books.is_empty() {
        return None;
    }

    // Deterministic venue order for tie-breaking and attribution.
    let mut books: Vec<&VenueBook> = books.iter().collect();
    books.sort_by_key(|b| b.venue);

    let mut bid_levels: BTreeMap<Decimal, Vec<VenueShare>> = BTreeMap::new();
    let mut ask_levels: BTreeMap<Decimal, Vec<VenueShare>> = BTreeMap::new();

    let mut total_bid_depth = Decimal::ZERO;
    let mut total_ask_depth = Decimal::ZERO;

    let mut best_bid: Option<BestPrice> = None;
    let mut best_ask: Option<BestPrice> = None;

    for book in &books {
        total_bid_depth += book.bid_depth_quote;
        total_ask_depth += book.ask_depth_quote;

        for level in &book.bids {
            bid_levels.entry(level.price).or_default().push(VenueShare {
                venue: book.venue,
                quantity: level.quantity,
            });
        }
        for level in &book.asks {
            ask_levels.entry(level.price).or_default().push(VenueShare {
                venue: book.venue,
                quantity: level.quantity,
            });
        }

        let bid = book.best_bid();
        if best_bid.map_or(true, |best| bid.price > best.price) {
            best_bid = Some(BestPrice {
                price: bid.price,
                quantity: bid.quantity,
                venue: book.venue,
            });
        }

        let ask = book.best_ask();
        if best_ask.map_or(true, |best| ask.price < best.price) {
            best_ask = Some(BestPrice {
                price: ask.price,
                quantity: ask.quantity,
                venue: book.venue,
            });
        }
    }

    // Books are normalized, so both sides are non-empty here.
    let best_bid = best_bid?;
    let best_ask = best_ask?;

    let bids: Vec<AggregatedLevel> = bid_levels
        .into_iter()
        .rev()
        .map(|(price, contributions)| merge_level(price, contributions))
        .collect();
    let asks: Vec<AggregatedLevel> = ask_levels
        .into_iter()
        .map(|(price, contributions)| merge_level(price, contributions))
        .collect();

    let mid_price = (best_bid.price + best_ask.price) / Decimal::TWO;
    let spread = best_ask.price - best_bid.price;
    let spread_percent = if mid_price > Decimal::ZERO {
        spread / mid_price * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let imbalance = imbalance_ratio(total_bid_depth, total_ask_depth);

    let mut venue_breakdown: Vec<VenueDepth> = books
        .iter()
        .map(|book| VenueDepth {
            venue: book.venue,
            bid_depth_quote: book.bid_depth_quote,
            ask_depth_quote: book.ask_depth_quote,
            bid_percent: percent_of(book.bid_depth_quote, total_bid_depth),
            ask_percent: percent_of(book.ask_depth_quote, total_ask_depth),
            spread: book.spread,
            latency_ms: book.latency_ms,
        })
        .collect();
    // Largest depth contributor first, venue id breaks ties.
    venue_breakdown.sort_by(|a, b| {
        let depth_a = a.bid_depth_quote + a.ask_depth_quote;
        let depth_b = b.bid_depth_quote + b.ask_depth_quote;
        depth_b.cmp(&depth_a).then(a.venue.cmp(&b.venue))
    });

    Some(AggregatedBook {
        symbol,
        market,
        venues: books.iter().map(|b| b.venue).collect(),
        bids,
        asks,
        best_bid,
        best_ask,
        mid_price,
        spread,
        spread_percent,
        total_bid_depth_quote: total_bid_depth,
        total_ask_depth_quote: total_ask_depth,
        imbalance,
        venue_breakdown,
        computed_at: OffsetDateTime::now_utc(),
    })
}

fn merge_level(price: Decimal, contributions: Vec<VenueShare>) -> AggregatedLevel {
    let quantity: Decimal = contributions.iter().map(|c| c.quantity).sum();
    AggregatedLevel {
        price,
        quantity,
        quote_value: price * quantity,
        contributions,
    }
}

/// Signed depth imbalance in [-1, 1]; zero when both sides are empty.
fn imbalance_ratio(bid_depth: Decimal, ask_depth: Decimal) -> Decimal {
    let total = bid_depth + ask_depth;
    if total.is_zero() {
        return Decimal::ZERO;
    }
    ((bid_depth - ask_depth) / total)
        .clamp(-Decimal::ONE, Decimal::ONE)
}

fn percent_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        part / total * Decimal::ONE_HUNDRED
    }
}
