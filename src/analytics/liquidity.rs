//! Depth-band analysis and liquidity scoring of the merged ladder.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use strum::Display;

use crate::book::AggregatedBook;
use crate::venue::{Asset, MarketKind};

/// Quote-value depth available within one band on each side of mid.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DepthBand {
    /// Bid-side depth in quote units.
    pub bid: Decimal,
    /// Ask-side depth in quote units.
    pub ask: Decimal,
}

impl DepthBand {
    /// Combined depth of both sides.
    pub fn total(&self) -> Decimal {
        self.bid + self.ask
    }
}

/// Ordinal liquidity verdict derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LiquidityRating {
    /// Score >= 80.
    Excellent,
    /// Score >= 60.
    Good,
    /// Score >= 40.
    Moderate,
    /// Score >= 20.
    Low,
    /// Score < 20.
    Poor,
}

impl LiquidityRating {
    fn from_score(score: u32) -> Self {
        match score {
            80.. => LiquidityRating::Excellent,
            60..=79 => LiquidityRating::Good,
            40..=59 => LiquidityRating::Moderate,
            20..=39 => LiquidityRating::Low,
            _ => LiquidityRating::Poor,
        }
    }
}

/// Liquidity analysis over the aggregated book.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidityReport {
    /// Symbol analyzed.
    pub symbol: Asset,
    /// Market kind.
    pub market: MarketKind,
    /// Depth within 1% of mid.
    pub depth_1_percent: DepthBand,
    /// Depth within 2% of mid.
    pub depth_2_percent: DepthBand,
    /// Depth within 5% of mid.
    pub depth_5_percent: DepthBand,
    /// Depth within 10% of mid.
    pub depth_10_percent: DepthBand,
    /// Bid/ask depth ratio at the 2% band (zero when ask side is empty).
    pub bid_ask_ratio: Decimal,
    /// Composite score, 0-100.
    pub score: u32,
    /// Ordinal verdict for the score.
    pub rating: LiquidityRating,
}

/// Analyze depth bands and score the book's liquidity.
///
/// The score is the sum of three components and is monotonic in each
/// input: more depth at 1%, a tighter spread, or more contributing venues
/// can never lower it.
///
/// - depth: 0-40, linear in 1%-band depth against `reference_quote`
/// - spread: 0-30, `30 - spread_percent * 100`, clamped
/// - coverage: 0-30, five points per contributing venue
pub fn analyze_liquidity(
    book: &AggregatedBook,
    reference_quote: Decimal,
) -> LiquidityReport {
    let depth_1 = band_depth(book, Decimal::ONE);
    let depth_2 = band_depth(book, Decimal::TWO);
    let depth_5 = band_depth(book, Decimal::new(5, 0));
    let depth_10 = band_depth(book, Decimal::TEN);

    let bid_ask_ratio = if depth_2.ask.is_zero() {
        Decimal::ZERO
    } else {
        depth_2.bid / depth_2.ask
    };

    let forty = Decimal::new(40, 0);
    let thirty = Decimal::new(30, 0);

    let depth_score = (depth_1.total() / reference_quote * forty).min(forty);
    let spread_score = (thirty - book.spread_percent * Decimal::ONE_HUNDRED)
        .clamp(Decimal::ZERO, thirty);
    let coverage_score =
        (Decimal::new(5, 0) * Decimal::from(book.venues.len() as u64)).min(thirty);

    let score = (depth_score + spread_score + coverage_score)
        .round()
        .to_u32()
        .unwrap_or(0)
        .min(100);

    LiquidityReport {
        symbol: book.symbol,
        market: book.market,
        depth_1_percent: depth_1,
        depth_2_percent: depth_2,
        depth_5_percent: depth_5,
        depth_10_percent: depth_10,
        bid_ask_ratio,
        score,
        rating: LiquidityRating::from_score(score),
    }
}

/// Quote value of merged levels within `percent` of mid on each side.
fn band_depth(book: &AggregatedBook, percent: Decimal) -> DepthBand {
    let fraction = percent / Decimal::ONE_HUNDRED;
    let bid_floor = book.mid_price * (Decimal::ONE - fraction);
    let ask_ceiling = book.mid_price * (Decimal::ONE + fraction);

    let bid = book
        .bids
        .iter()
        .filter(|level| level.price >= bid_floor)
        .map(|level| level.quote_value)
        .sum();
    let ask = book
        .asks
        .iter()
        .filter(|level| level.price <= ask_ceiling)
        .map(|level| level.quote_value)
        .sum();

    DepthBand { bid, ask }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::testkit::{aggregated, venue_book};
    use crate::venue::VenueId;
    use rust_decimal_macros::dec;

    fn reference() -> Decimal {
        dec!(1000000)
    }

    #[test]
    fn bands_are_nested() {
        let book = aggregated(&[venue_book(
            VenueId::Binance,
            vec![
                (dec!(49900), dec!(1)),
                (dec!(49000), dec!(1)),
                (dec!(46000), dec!(1)),
            ],
            vec![
                (dec!(50100), dec!(1)),
                (dec!(51000), dec!(1)),
                (dec!(54000), dec!(1)),
            ],
        )]);

        let report = analyze_liquidity(&book, reference());

        assert!(report.depth_1_percent.total() <= report.depth_2_percent.total());
        assert!(report.depth_2_percent.total() <= report.depth_5_percent.total());
        assert!(report.depth_5_percent.total() <= report.depth_10_percent.total());
        // Only the tightest levels fall inside 1%.
        assert_eq!(report.depth_1_percent.bid, dec!(49900));
        assert_eq!(report.depth_1_percent.ask, dec!(50100));
    }

    #[test]
    fn more_depth_never_lowers_score() {
        let thin = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49990), dec!(0.1))],
            vec![(dec!(50010), dec!(0.1))],
        )]);
        let deep = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49990), dec!(10))],
            vec![(dec!(50010), dec!(10))],
        )]);

        let thin_score = analyze_liquidity(&thin, reference()).score;
        let deep_score = analyze_liquidity(&deep, reference()).score;
        assert!(deep_score >= thin_score);
    }

    #[test]
    fn tighter_spread_never_lowers_score() {
        let wide = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49500), dec!(1))],
            vec![(dec!(50500), dec!(1))],
        )]);
        let tight = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49995), dec!(1))],
            vec![(dec!(50005), dec!(1))],
        )]);

        let wide_score = analyze_liquidity(&wide, reference()).score;
        let tight_score = analyze_liquidity(&tight, reference()).score;
        assert!(tight_score >= wide_score);
    }

    #[test]
    fn more_venues_never_lower_score() {
        let one = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50010), dec!(1))],
        )]);
        let two = aggregated(&[
            venue_book(
                VenueId::Binance,
                vec![(dec!(49990), dec!(1))],
                vec![(dec!(50010), dec!(1))],
            ),
            venue_book(
                VenueId::Kraken,
                vec![(dec!(49990), dec!(1))],
                vec![(dec!(50010), dec!(1))],
            ),
        ]);

        let one_score = analyze_liquidity(&one, reference()).score;
        let two_score = analyze_liquidity(&two, reference()).score;
        assert!(two_score >= one_score);
    }

    #[test]
    fn score_is_bounded() {
        let book = aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49999), dec!(1000))],
            vec![(dec!(50001), dec!(1000))],
        )]);

        let report = analyze_liquidity(&book, dec!(1));
        assert!(report.score <= 100);
        assert_eq!(report.rating, LiquidityRating::Excellent);
    }

    #[test]
    fn rating_bands_map_scores() {
        assert_eq!(LiquidityRating::from_score(95), LiquidityRating::Excellent);
        assert_eq!(LiquidityRating::from_score(61), LiquidityRating::Good);
        assert_eq!(LiquidityRating::from_score(40), LiquidityRating::Moderate);
        assert_eq!(LiquidityRating::from_score(20), LiquidityRating::Low);
        assert_eq!(LiquidityRating::from_score(5), LiquidityRating::Poor);
    }
}
