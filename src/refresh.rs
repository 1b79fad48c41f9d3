//! Snapshot cache and concurrent refresh cycles.
//!
//! One cycle fans out to every eligible venue, normalizes and aggregates
//! whatever came back in time, and publishes the finished snapshot to the
//! cache in a single store operation. Concurrent requests for a stale key
//! coalesce onto one in-flight cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::book::{aggregate_books, normalize_book, BookSnapshot, VenueBook};
use crate::config::Config;
use crate::error::{EngineError, VenueError, VenueErrorKind};
use crate::metrics;
use crate::venue::{Asset, BookSource, MarketKind, Pair, VenueId};

/// Cache key: one snapshot per symbol and market kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    /// Symbol.
    pub symbol: Asset,
    /// Market kind.
    pub market: MarketKind,
}

/// Get/put cache capability with TTL semantics.
///
/// `put` must replace atomically: a concurrent `get` sees either the old
/// snapshot or the new one, never a mixture.
pub trait SnapshotStore: Send + Sync {
    /// Fetch a snapshot if present and still fresh.
    fn get(&self, key: &SnapshotKey) -> Option<Arc<BookSnapshot>>;
    /// Publish a snapshot, restarting the TTL clock.
    fn put(&self, key: SnapshotKey, snapshot: Arc<BookSnapshot>);
}

/// In-memory [`SnapshotStore`] with a fixed TTL.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<SnapshotKey, StoredEntry>,
    ttl: std::time::Duration,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    snapshot: Arc<BookSnapshot>,
    stored_at: Instant,
}

impl MemoryStore {
    /// Create a store with the given TTL.
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &SnapshotKey) -> Option<Arc<BookSnapshot>> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }

    fn put(&self, key: SnapshotKey, snapshot: Arc<BookSnapshot>) {
        self.entries.insert(
            key,
            StoredEntry {
                snapshot,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Drives refresh cycles and serves cached snapshots.
#[derive(Debug)]
pub struct RefreshService<S, C> {
    source: Arc<S>,
    store: C,
    config: Arc<Config>,
    /// Per-key single-flight gates: one in-flight cycle per key.
    gates: DashMap<SnapshotKey, Arc<Mutex<()>>>,
}

impl<S, C> RefreshService<S, C>
where
    S: BookSource + 'static,
    C: SnapshotStore,
{
    /// Create a service over a book source and snapshot store.
    pub fn new(source: Arc<S>, store: C, config: Arc<Config>) -> Self {
        Self {
            source,
            store,
            config,
            gates: DashMap::new(),
        }
    }

    /// Serve a fresh snapshot, refreshing it if the cache is stale.
    ///
    /// Concurrent callers for the same stale key wait on the key's gate
    /// and are served by the single cycle that ran while they waited.
    pub async fn snapshot(
        &self,
        symbol: Asset,
        market: MarketKind,
    ) -> Result<Arc<BookSnapshot>, EngineError> {
        let key = SnapshotKey { symbol, market };

        if let Some(snapshot) = self.store.get(&key) {
            metrics::inc_cache_hit();
            return Ok(snapshot);
        }
        metrics::inc_cache_miss();

        let gate = self
            .gates
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _flight = gate.lock().await;

        // A cycle that finished while we queued already refreshed the key.
        if let Some(snapshot) = self.store.get(&key) {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.run_cycle(symbol, market).await?);
        self.store.put(key, snapshot.clone());
        Ok(snapshot)
    }

    /// Run one full fan-out/aggregate cycle, bypassing the cache.
    #[instrument(skip(self), fields(symbol = %symbol, market = %market))]
    async fn run_cycle(
        &self,
        symbol: Asset,
        market: MarketKind,
    ) -> Result<BookSnapshot, EngineError> {
        let started = Instant::now();
        let pair = Pair::usdt(symbol);
        let venues = self.config.venues_for(market);
        let venue_timeout = self.config.venue_timeout();
        let deadline = tokio::time::Instant::now() + self.config.cycle_timeout();

        let mut tasks: JoinSet<Result<crate::venue::RawBook, VenueError>> = JoinSet::new();
        let mut pending: HashSet<VenueId> = venues.iter().copied().collect();

        for venue in venues {
            let source = self.source.clone();
            tasks.spawn(async move {
                match tokio::time::timeout(
                    venue_timeout,
                    source.fetch_book(venue, pair, market),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(VenueError::new(
                        venue,
                        VenueErrorKind::Timeout(venue_timeout),
                    )),
                }
            });
        }

        let mut books: Vec<VenueBook> = Vec::new();
        let mut diagnostics: Vec<VenueError> = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(Ok(raw)))) => {
                    pending.remove(&raw.venue);
                    metrics::record_venue_fetch_latency(raw.venue, raw.latency);
                    match normalize_book(raw) {
                        Ok(book) => books.push(book),
                        Err(err) => {
                            warn!(venue = %err.venue, error = %err, "book rejected");
                            metrics::inc_venue_error(err.venue);
                            diagnostics.push(err);
                        }
                    }
                }
                Ok(Some(Ok(Err(err)))) => {
                    pending.remove(&err.venue);
                    warn!(venue = %err.venue, error = %err, "venue fetch failed");
                    metrics::inc_venue_error(err.venue);
                    diagnostics.push(err);
                }
                Ok(Some(Err(join_err))) => {
                    // A fetch task panicked; the venue stays unattributed.
                    error!(error = %join_err, "venue fetch task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    // Global deadline: stragglers are excluded, not awaited.
                    tasks.abort_all();
                    warn!(
                        stragglers = pending.len(),
                        "cycle deadline reached, excluding slow venues"
                    );
                    for venue in pending.drain() {
                        metrics::inc_venue_error(venue);
                        diagnostics.push(VenueError::new(
                            venue,
                            VenueErrorKind::Timeout(self.config.cycle_timeout()),
                        ));
                    }
                    break;
                }
            }
        }

        metrics::record_cycle_duration(started);

        let aggregated = aggregate_books(symbol, market, &books).ok_or_else(|| {
            EngineError::NoVenuesAvailable {
                symbol: symbol.to_string(),
                market,
                errors: diagnostics.clone(),
            }
        })?;

        info!(
            symbol = %symbol,
            market = %market,
            venues = books.len(),
            failed = diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation cycle complete"
        );

        Ok(BookSnapshot {
            aggregated,
            venue_books: books,
            diagnostics,
        })
    }

    /// The book source behind this service.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::MockBookSource;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn test_config(venues: Vec<VenueId>) -> Arc<Config> {
        Arc::new(Config {
            venues,
            venue_timeout_ms: 100,
            cycle_timeout_ms: 200,
            cache_ttl_ms: 10_000,
            ..Config::default()
        })
    }

    fn service_with(
        source: MockBookSource,
        config: Arc<Config>,
    ) -> RefreshService<MockBookSource, MemoryStore> {
        let store = MemoryStore::new(config.cache_ttl());
        RefreshService::new(Arc::new(source), store, config)
    }

    fn seed_book(source: &MockBookSource, venue: VenueId, mid: rust_decimal::Decimal) {
        source.set_book(
            venue,
            Pair::usdt(Asset::Btc),
            MarketKind::Spot,
            vec![(mid - dec!(10), dec!(1))],
            vec![(mid + dec!(10), dec!(1))],
        );
    }

    #[tokio::test]
    async fn one_failing_venue_still_aggregates() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));
        seed_book(&source, VenueId::Kraken, dec!(50005));
        source.fail_venue(VenueId::Kraken);

        let service = service_with(
            source,
            test_config(vec![VenueId::Binance, VenueId::Kraken]),
        );

        let snapshot = service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();

        assert_eq!(snapshot.aggregated.venues, vec![VenueId::Binance]);
        assert_eq!(snapshot.diagnostics.len(), 1);
        assert_eq!(snapshot.diagnostics[0].venue, VenueId::Kraken);
    }

    #[tokio::test]
    async fn all_venues_failing_is_a_hard_error() {
        let source = MockBookSource::new();
        source.fail_venue(VenueId::Binance);
        source.fail_venue(VenueId::Kraken);

        let service = service_with(
            source,
            test_config(vec![VenueId::Binance, VenueId::Kraken]),
        );

        let err = service
            .snapshot(Asset::Btc, MarketKind::Spot)
            .await
            .unwrap_err();

        match err {
            EngineError::NoVenuesAvailable { errors, .. } => {
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected NoVenuesAvailable, got {other}"),
        }
    }

    #[tokio::test]
    async fn failed_cycles_are_not_cached() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));
        source.fail_venue(VenueId::Binance);

        let service = service_with(source, test_config(vec![VenueId::Binance]));

        assert!(service.snapshot(Asset::Btc, MarketKind::Spot).await.is_err());

        // The venue recovers; the next request must not see a cached error.
        service.source().recover_venue(VenueId::Binance);
        assert!(service.snapshot(Asset::Btc, MarketKind::Spot).await.is_ok());
    }

    #[tokio::test]
    async fn fresh_snapshot_is_served_from_cache() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));

        let service = service_with(source, test_config(vec![VenueId::Binance]));

        service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();
        let fetched_once = service.source().fetch_count();

        service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();
        assert_eq!(service.source().fetch_count(), fetched_once);
    }

    #[tokio::test]
    async fn expired_ttl_triggers_refetch() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));

        let config = Arc::new(Config {
            venues: vec![VenueId::Binance],
            cache_ttl_ms: 0,
            venue_timeout_ms: 100,
            cycle_timeout_ms: 200,
            ..Config::default()
        });
        let service = service_with(source, config);

        service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();
        let fetched_once = service.source().fetch_count();

        service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();
        assert!(service.source().fetch_count() > fetched_once);
    }

    #[tokio::test]
    async fn concurrent_requests_coalesce_into_one_cycle() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));
        source.set_latency(VenueId::Binance, Duration::from_millis(50));

        let service = Arc::new(service_with(source, test_config(vec![VenueId::Binance])));

        let a = service.clone();
        let b = service.clone();
        let (ra, rb) = tokio::join!(
            a.snapshot(Asset::Btc, MarketKind::Spot),
            b.snapshot(Asset::Btc, MarketKind::Spot),
        );

        assert!(ra.is_ok() && rb.is_ok());
        // Single flight: one fetch despite two concurrent requests.
        assert_eq!(service.source().fetch_count(), 1);
    }

    #[tokio::test]
    async fn slow_venue_is_excluded_not_awaited() {
        let source = MockBookSource::new();
        seed_book(&source, VenueId::Binance, dec!(50000));
        seed_book(&source, VenueId::Kraken, dec!(50005));
        source.set_latency(VenueId::Kraken, Duration::from_millis(500));

        let service = service_with(
            source,
            test_config(vec![VenueId::Binance, VenueId::Kraken]),
        );

        let started = Instant::now();
        let snapshot = service.snapshot(Asset::Btc, MarketKind::Spot).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(snapshot.aggregated.venues, vec![VenueId::Binance]);
        assert!(snapshot
            .diagnostics
            .iter()
            .any(|e| e.venue == VenueId::Kraken
                && matches!(e.kind, VenueErrorKind::Timeout(_))));
    }

    #[tokio::test]
    async fn spot_only_venues_are_skipped_for_futures() {
        let source = MockBookSource::new();
        source.set_book(
            VenueId::Binance,
            Pair::usdt(Asset::Btc),
            MarketKind::Futures,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50010), dec!(1))],
        );

        let service = service_with(
            source,
            test_config(vec![VenueId::Binance, VenueId::Coinbase]),
        );

        let snapshot = service
            .snapshot(Asset::Btc, MarketKind::Futures)
            .await
            .unwrap();

        // Coinbase was never asked, so it is neither a venue nor an error.
        assert_eq!(snapshot.aggregated.venues, vec![VenueId::Binance]);
        assert!(snapshot.diagnostics.is_empty());
    }
}
