//! Three-leg triangular arbitrage within a single venue.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::book::{normalize_book, VenueBook};
use crate::config::Config;
use crate::venue::{Asset, BookSource, MarketKind, Pair, Side, VenueId};

/// Fixed 3-asset cycles scanned per venue: `USDT -> A -> B -> USDT`.
pub const TRIANGLE_CYCLES: &[(Asset, Asset)] = &[
    (Asset::Btc, Asset::Eth),
    (Asset::Btc, Asset::Sol),
    (Asset::Btc, Asset::Xrp),
    (Asset::Eth, Asset::Sol),
];

/// One executable leg of a triangular cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TriangleLeg {
    /// Pair traded on this leg.
    pub pair: Pair,
    /// Side taken.
    pub side: Side,
    /// Implied conversion rate applied to the running amount.
    pub rate: Decimal,
}

/// A profitable closed three-leg cycle on one venue.
#[derive(Debug, Clone, Serialize)]
pub struct TriangularOpportunity {
    /// Venue all three legs execute on.
    pub venue: VenueId,
    /// Asset path; starts and ends at the same asset.
    pub path: [Asset; 4],
    /// The three legs in execution order.
    pub legs: Vec<TriangleLeg>,
    /// Multiplicative round-trip factor before fees.
    pub gross_factor: Decimal,
    /// Assumed taker fee per leg, percent.
    pub fee_percent_per_leg: Decimal,
    /// Round-trip profit net of three legs of fees, percent. Positive.
    pub profit_percent: Decimal,
}

/// Evaluate one cycle `USDT -> A -> B -> USDT` from its three books.
///
/// Each rate is the best executable price for the required direction: legs
/// one and two buy at the ask, leg three sells into the bid. Returns
/// `None` unless the round trip is profitable after three legs of fees.
pub fn evaluate_cycle(
    a_book: &VenueBook,
    cross_book: &VenueBook,
    b_book: &VenueBook,
    fee_percent_per_leg: Decimal,
) -> Option<TriangularOpportunity> {
    let venue = a_book.venue;
    let a = a_book.pair.base;
    let b = b_book.pair.base;

    let ask_a = a_book.best_ask().price;
    let ask_cross = cross_book.best_ask().price;
    let bid_b = b_book.best_bid().price;

    if ask_a.is_zero() || ask_cross.is_zero() {
        return None;
    }

    // 1 USDT -> 1/ask A -> /ask(B/A) B -> *bid(B/USDT) USDT.
    let gross_factor = Decimal::ONE / ask_a / ask_cross * bid_b;

    let keep = Decimal::ONE - fee_percent_per_leg / Decimal::ONE_HUNDRED;
    let net_factor = gross_factor * keep * keep * keep;
    let profit_percent = (net_factor - Decimal::ONE) * Decimal::ONE_HUNDRED;

    if profit_percent <= Decimal::ZERO {
        return None;
    }

    Some(TriangularOpportunity {
        venue,
        path: [Asset::Usdt, a, b, Asset::Usdt],
        legs: vec![
            TriangleLeg {
                pair: a_book.pair,
                side: Side::Buy,
                rate: Decimal::ONE / ask_a,
            },
            TriangleLeg {
                pair: cross_book.pair,
                side: Side::Buy,
                rate: Decimal::ONE / ask_cross,
            },
            TriangleLeg {
                pair: b_book.pair,
                side: Side::Sell,
                rate: bid_b,
            },
        ],
        gross_factor,
        fee_percent_per_leg,
        profit_percent,
    })
}

/// Scan the configured venues' fixed cycle list.
///
/// A cycle whose pairs cannot all be fetched on a venue is skipped for
/// that venue; a missing cross pair is the common case, not a failure.
pub async fn scan_triangular<S: BookSource>(
    source: &S,
    config: &Config,
) -> Vec<TriangularOpportunity> {
    let mut opportunities = Vec::new();

    for &venue in &config.triangular_venues {
        let fee = config.taker_fee_percent(venue);

        for &(a, b) in TRIANGLE_CYCLES {
            let (raw_a, raw_cross, raw_b) = tokio::join!(
                source.fetch_book(venue, Pair::usdt(a), MarketKind::Spot),
                source.fetch_book(venue, Pair::new(b, a), MarketKind::Spot),
                source.fetch_book(venue, Pair::usdt(b), MarketKind::Spot),
            );

            let books = (|| {
                Some((
                    normalize_book(raw_a.ok()?).ok()?,
                    normalize_book(raw_cross.ok()?).ok()?,
                    normalize_book(raw_b.ok()?).ok()?,
                ))
            })();

            let Some((a_book, cross_book, b_book)) = books else {
                debug!(venue = %venue, a = %a, b = %b, "cycle skipped, pair unavailable");
                continue;
            };

            if let Some(opp) = evaluate_cycle(&a_book, &cross_book, &b_book, fee) {
                opportunities.push(opp);
            }
        }
    }

    sort_triangular(&mut opportunities);
    opportunities
}

/// Descending profit, ties broken by venue then path for determinism.
pub fn sort_triangular(opportunities: &mut [TriangularOpportunity]) {
    opportunities.sort_by(|a, b| {
        b.profit_percent
            .cmp(&a.profit_percent)
            .then_with(|| a.venue.cmp(&b.venue))
            .then_with(|| a.path.cmp(&b.path))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::testkit::venue_book_for;
    use crate::venue::mock::MockBookSource;
    use rust_decimal_macros::dec;

    fn cycle_books(
        ask_btc: Decimal,
        ask_ethbtc: Decimal,
        bid_eth: Decimal,
    ) -> (VenueBook, VenueBook, VenueBook) {
        let spot = MarketKind::Spot;
        let btc = venue_book_for(
            VenueId::Binance,
            Pair::usdt(Asset::Btc),
            spot,
            vec![(ask_btc - dec!(10), dec!(1))],
            vec![(ask_btc, dec!(1))],
        );
        let cross = venue_book_for(
            VenueId::Binance,
            Pair::new(Asset::Eth, Asset::Btc),
            spot,
            vec![(ask_ethbtc - dec!(0.0001), dec!(10))],
            vec![(ask_ethbtc, dec!(10))],
        );
        let eth = venue_book_for(
            VenueId::Binance,
            Pair::usdt(Asset::Eth),
            spot,
            vec![(bid_eth, dec!(20))],
            vec![(bid_eth + dec!(1), dec!(20))],
        );
        (btc, cross, eth)
    }

    #[test]
    fn profitable_cycle_is_detected() {
        // 1/50000 * 1/0.05 * 2520 = 1.008 gross.
        let (btc, cross, eth) = cycle_books(dec!(50000), dec!(0.05), dec!(2520));

        let opp = evaluate_cycle(&btc, &cross, &eth, dec!(0.1)).unwrap();

        assert_eq!(opp.path, [Asset::Usdt, Asset::Btc, Asset::Eth, Asset::Usdt]);
        assert_eq!(opp.legs.len(), 3);
        assert_eq!(opp.gross_factor, dec!(1.008));
        assert!(opp.profit_percent > dec!(0.4));
        assert!(opp.profit_percent < dec!(0.6));
    }

    #[test]
    fn flat_cycle_is_discarded() {
        // Gross factor exactly 1.0 cannot survive fees.
        let (btc, cross, eth) = cycle_books(dec!(50000), dec!(0.05), dec!(2500));

        assert!(evaluate_cycle(&btc, &cross, &eth, dec!(0.1)).is_none());
    }

    #[test]
    fn fees_can_erase_gross_profit() {
        // 0.1% gross edge, three 0.1% legs.
        let (btc, cross, eth) = cycle_books(dec!(50000), dec!(0.05), dec!(2502.5));

        assert!(evaluate_cycle(&btc, &cross, &eth, dec!(0)).is_some());
        assert!(evaluate_cycle(&btc, &cross, &eth, dec!(0.1)).is_none());
    }

    #[tokio::test]
    async fn scan_skips_venues_missing_cross_pairs() {
        let source = MockBookSource::new();
        let spot = MarketKind::Spot;
        // Only the BTC-ETH cycle on binance is fully quoted.
        source.set_book(
            VenueId::Binance,
            Pair::usdt(Asset::Btc),
            spot,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50000), dec!(1))],
        );
        source.set_book(
            VenueId::Binance,
            Pair::new(Asset::Eth, Asset::Btc),
            spot,
            vec![(dec!(0.0499), dec!(10))],
            vec![(dec!(0.05), dec!(10))],
        );
        source.set_book(
            VenueId::Binance,
            Pair::usdt(Asset::Eth),
            spot,
            vec![(dec!(2520), dec!(20))],
            vec![(dec!(2521), dec!(20))],
        );

        let config = Config {
            triangular_venues: vec![VenueId::Binance, VenueId::Bybit],
            taker_fee_bps: Some(dec!(10)),
            ..Config::default()
        };

        let opps = scan_triangular(&source, &config).await;

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].venue, VenueId::Binance);
        assert!(opps[0].profit_percent > Decimal::ZERO);
    }

    #[test]
    fn sort_is_deterministic() {
        let mk = |venue, profit: Decimal| TriangularOpportunity {
            venue,
            path: [Asset::Usdt, Asset::Btc, Asset::Eth, Asset::Usdt],
            legs: vec![],
            gross_factor: Decimal::ONE,
            fee_percent_per_leg: dec!(0.1),
            profit_percent: profit,
        };

        let mut opps = vec![
            mk(VenueId::Okx, dec!(0.2)),
            mk(VenueId::Binance, dec!(0.2)),
            mk(VenueId::Bybit, dec!(0.5)),
        ];

        sort_triangular(&mut opps);

        assert_eq!(opps[0].venue, VenueId::Bybit);
        assert_eq!(opps[1].venue, VenueId::Binance);
        assert_eq!(opps[2].venue, VenueId::Okx);
    }
}
