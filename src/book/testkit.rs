//! Test fixtures for building normalized books without a network.

use std::time::Duration;

use rust_decimal::Decimal;

use super::aggregator::aggregate_books;
use super::normalizer::normalize_book;
use super::types::{AggregatedBook, VenueBook};
use crate::venue::{Asset, MarketKind, Pair, RawBook, RawLevel, VenueId};

/// Build a normalized book for an arbitrary pair.
pub(crate) fn venue_book_for(
    venue: VenueId,
    pair: Pair,
    market: MarketKind,
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
) -> VenueBook {
    normalize_book(RawBook {
        venue,
        pair,
        market,
        bids: bids
            .into_iter()
            .map(|(price, quantity)| RawLevel { price, quantity })
            .collect(),
        asks: asks
            .into_iter()
            .map(|(price, quantity)| RawLevel { price, quantity })
            .collect(),
        latency: Duration::from_millis(5),
    })
    .expect("test book must normalize")
}

/// Build a normalized BTC/USDT spot book.
pub(crate) fn venue_book(
    venue: VenueId,
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
) -> VenueBook {
    venue_book_for(venue, Pair::usdt(Asset::Btc), MarketKind::Spot, bids, asks)
}

/// Aggregate BTC/USDT spot books.
pub(crate) fn aggregated(books: &[VenueBook]) -> AggregatedBook {
    aggregate_books(Asset::Btc, MarketKind::Spot, books).expect("non-empty books")
}
