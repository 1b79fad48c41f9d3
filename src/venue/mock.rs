//! Mock book source for unit testing.
//!
//! Provides canned order books without network access, with knobs for
//! failures and simulated latency.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;

use super::client::BookSource;
use super::types::{MarketKind, Pair, RawBook, RawLevel, VenueId};
use crate::error::{VenueError, VenueErrorKind};

type BookKey = (VenueId, Pair, MarketKind);

/// Mock [`BookSource`] backed by canned books.
#[derive(Debug, Clone, Default)]
pub struct MockBookSource {
    books: Arc<Mutex<HashMap<BookKey, (Vec<RawLevel>, Vec<RawLevel>)>>>,
    failing: Arc<Mutex<HashSet<VenueId>>>,
    latency: Arc<Mutex<HashMap<VenueId, Duration>>>,
    fetches: Arc<AtomicUsize>,
}

impl MockBookSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a canned book for a venue/pair/market.
    pub fn set_book(
        &self,
        venue: VenueId,
        pair: Pair,
        market: MarketKind,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    ) {
        let to_levels = |levels: Vec<(Decimal, Decimal)>| {
            levels
                .into_iter()
                .map(|(price, quantity)| RawLevel { price, quantity })
                .collect()
        };
        self.books
            .lock()
            .unwrap()
            .insert((venue, pair, market), (to_levels(bids), to_levels(asks)));
    }

    /// Make every fetch against a venue fail.
    pub fn fail_venue(&self, venue: VenueId) {
        self.failing.lock().unwrap().insert(venue);
    }

    /// Restore a failed venue.
    pub fn recover_venue(&self, venue: VenueId) {
        self.failing.lock().unwrap().remove(&venue);
    }

    /// Delay fetches against a venue.
    pub fn set_latency(&self, venue: VenueId, latency: Duration) {
        self.latency.lock().unwrap().insert(venue, latency);
    }

    /// Total fetches issued against this source.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Remove all canned data and recorded state.
    pub fn clear(&self) {
        self.books.lock().unwrap().clear();
        self.failing.lock().unwrap().clear();
        self.latency.lock().unwrap().clear();
        self.fetches.store(0, Ordering::SeqCst);
    }
}

impl BookSource for MockBookSource {
    async fn fetch_book(
        &self,
        venue: VenueId,
        pair: Pair,
        market: MarketKind,
    ) -> Result<RawBook, VenueError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.latency.lock().unwrap().get(&venue).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&venue) {
            return Err(VenueError::new(
                venue,
                VenueErrorKind::Transport("mock venue failure".to_string()),
            ));
        }

        let books = self.books.lock().unwrap();
        let (bids, asks) = books
            .get(&(venue, pair, market))
            .ok_or_else(|| VenueError::new(venue, VenueErrorKind::PairNotListed))?;

        Ok(RawBook {
            venue,
            pair,
            market,
            bids: bids.clone(),
            asks: asks.clone(),
            latency: delay.unwrap_or(Duration::from_millis(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::Asset;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn returns_canned_books() {
        let source = MockBookSource::new();
        let pair = Pair::usdt(Asset::Btc);
        source.set_book(
            VenueId::Binance,
            pair,
            MarketKind::Spot,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50010), dec!(1))],
        );

        let book = source
            .fetch_book(VenueId::Binance, pair, MarketKind::Spot)
            .await
            .unwrap();

        assert_eq!(book.bids[0].price, dec!(49990));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_book_is_pair_not_listed() {
        let source = MockBookSource::new();

        let err = source
            .fetch_book(VenueId::Okx, Pair::usdt(Asset::Eth), MarketKind::Spot)
            .await
            .unwrap_err();

        assert!(matches!(err.kind, VenueErrorKind::PairNotListed));
    }

    #[tokio::test]
    async fn failure_modes_toggle() {
        let source = MockBookSource::new();
        let pair = Pair::usdt(Asset::Btc);
        source.set_book(
            VenueId::Kraken,
            pair,
            MarketKind::Spot,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50010), dec!(1))],
        );

        source.fail_venue(VenueId::Kraken);
        assert!(source
            .fetch_book(VenueId::Kraken, pair, MarketKind::Spot)
            .await
            .is_err());

        source.recover_venue(VenueId::Kraken);
        assert!(source
            .fetch_book(VenueId::Kraken, pair, MarketKind::Spot)
            .await
            .is_ok());
    }
}
