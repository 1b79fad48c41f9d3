//! Integration tests against the real venue APIs.
//!
//! These hit live public endpoints and are ignored by default.
//! Run with: cargo test --test live_venues -- --ignored

use std::sync::Arc;

use crossbook::book::normalize_book;
use crossbook::config::Config;
use crossbook::refresh::{MemoryStore, RefreshService};
use crossbook::venue::{Asset, BookSource, MarketKind, Pair, VenueClient, VenueId};

fn live_client() -> VenueClient {
    VenueClient::new(&Config::default())
}

/// Fetch and normalize one live book, asserting the core invariants.
async fn check_venue(venue: VenueId) {
    let client = live_client();

    let raw = client
        .fetch_book(venue, Pair::usdt(Asset::Btc), MarketKind::Spot)
        .await
        .unwrap_or_else(|e| panic!("{venue} fetch failed: {e}"));

    let book = normalize_book(raw).unwrap_or_else(|e| panic!("{venue} rejected: {e}"));

    assert!(book.best_bid().price > rust_decimal::Decimal::ZERO);
    assert!(book.best_bid().price < book.best_ask().price);
    for pair in book.bids.windows(2) {
        assert!(pair[0].price > pair[1].price, "{venue} bids not descending");
    }
    for pair in book.asks.windows(2) {
        assert!(pair[0].price < pair[1].price, "{venue} asks not ascending");
    }

    println!(
        "{venue}: bid {} / ask {} ({} + {} levels, {}ms)",
        book.best_bid().price,
        book.best_ask().price,
        book.bids.len(),
        book.asks.len(),
        book.latency_ms
    );
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn binance_spot_book() {
    check_venue(VenueId::Binance).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn bybit_spot_book() {
    check_venue(VenueId::Bybit).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn okx_spot_book() {
    check_venue(VenueId::Okx).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn kraken_spot_book() {
    check_venue(VenueId::Kraken).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn kucoin_spot_book() {
    check_venue(VenueId::Kucoin).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn coinbase_spot_book() {
    check_venue(VenueId::Coinbase).await;
}

#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn binance_futures_book() {
    let client = live_client();

    let raw = client
        .fetch_book(VenueId::Binance, Pair::usdt(Asset::Btc), MarketKind::Futures)
        .await
        .expect("binance futures fetch failed");

    let book = normalize_book(raw).expect("binance futures book rejected");
    assert!(book.best_bid().price < book.best_ask().price);
}

/// A full cycle against the real venues should aggregate at least one.
#[tokio::test]
#[ignore = "hits live exchange APIs"]
async fn full_cycle_aggregates_live_venues() {
    let config = Arc::new(Config::default());
    let service = RefreshService::new(
        Arc::new(VenueClient::new(&config)),
        MemoryStore::new(config.cache_ttl()),
        config,
    );

    let snapshot = service
        .snapshot(Asset::Btc, MarketKind::Spot)
        .await
        .expect("every venue failed");

    let book = &snapshot.aggregated;
    assert!(!book.venues.is_empty());
    assert!(book.best_bid.price > rust_decimal::Decimal::ZERO);

    println!(
        "aggregated {} venues: bid {} / ask {} ({} excluded)",
        book.venues.len(),
        book.best_bid.price,
        book.best_ask.price,
        snapshot.diagnostics.len()
    );
    for failed in &snapshot.diagnostics {
        println!("  excluded {}: {}", failed.venue, failed.kind);
    }
}
