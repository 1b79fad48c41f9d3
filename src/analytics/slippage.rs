//! Execution slippage simulation against the merged ladder.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::book::{AggregatedBook, AggregatedLevel};
use crate::venue::{Side, VenueId};

/// Base quantity filled at one venue during a simulated execution.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VenueFill {
    /// Venue the quantity came from.
    pub venue: VenueId,
    /// Filled base quantity.
    pub quantity: Decimal,
}

/// Result of simulating an order against the merged ladder.
///
/// `shortfall_quote > 0` means the ladder was exhausted before the order
/// filled; the estimate then covers only the filled portion. That is a
/// reportable partial result, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct SlippageEstimate {
    /// Order side.
    pub side: Side,
    /// Requested order size in quote units.
    pub order_size_quote: Decimal,
    /// Volume-weighted average fill price.
    pub average_price: Decimal,
    /// Worst price touched during the fill.
    pub worst_price: Decimal,
    /// Deviation of average from best price, percent.
    pub slippage_percent: Decimal,
    /// Slippage cost over the filled portion, in quote units.
    pub slippage_quote: Decimal,
    /// Quote value actually filled.
    pub filled_quote: Decimal,
    /// Base quantity actually filled.
    pub filled_base: Decimal,
    /// Unfilled remainder of the requested size (zero when fully filled).
    pub shortfall_quote: Decimal,
    /// Ladder levels touched.
    pub levels_consumed: usize,
    /// Per-venue fills in first-touch order.
    pub venue_fills: Vec<VenueFill>,
}

impl SlippageEstimate {
    /// Whether the requested size was filled in full.
    pub fn fully_filled(&self) -> bool {
        self.shortfall_quote.is_zero()
    }
}

/// Simulate consuming the merged ladder for an order of `order_size_quote`.
///
/// Walks asks for a buy and bids for a sell, from best price outward,
/// consuming each level's quote value until the size is filled or the
/// ladder runs dry. `order_size_quote` must be non-negative (the request
/// boundary validates); zero yields the best price with zero slippage.
pub fn estimate_slippage(
    book: &AggregatedBook,
    side: Side,
    order_size_quote: Decimal,
) -> SlippageEstimate {
    let (levels, best_price): (&[AggregatedLevel], Decimal) = match side {
        Side::Buy => (&book.asks, book.best_ask.price),
        Side::Sell => (&book.bids, book.best_bid.price),
    };

    let mut remaining = order_size_quote;
    let mut filled_quote = Decimal::ZERO;
    let mut filled_base = Decimal::ZERO;
    let mut worst_price = best_price;
    let mut levels_consumed = 0usize;
    let mut venue_fills: Vec<VenueFill> = Vec::new();

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }

        let level_value = level.quote_value;
        if level_value.is_zero() {
            continue;
        }

        let fill_quote = remaining.min(level_value);
        let fill_base = fill_quote / level.price;

        filled_quote += fill_quote;
        filled_base += fill_base;
        remaining -= fill_quote;
        worst_price = level.price;
        levels_consumed += 1;

        // Attribute the consumed base quantity pro-rata across the venues
        // that posted this level, preserving first-touch order.
        for share in &level.contributions {
            let venue_base = fill_base * share.quantity / level.quantity;
            match venue_fills.iter_mut().find(|f| f.venue == share.venue) {
                Some(fill) => fill.quantity += venue_base,
                None => venue_fills.push(VenueFill {
                    venue: share.venue,
                    quantity: venue_base,
                }),
            }
        }
    }

    let average_price = if filled_base.is_zero() {
        best_price
    } else {
        filled_quote / filled_base
    };

    let slippage_percent = if best_price.is_zero() {
        Decimal::ZERO
    } else {
        ((average_price - best_price) / best_price).abs() * Decimal::ONE_HUNDRED
    };

    let slippage_quote = filled_quote * slippage_percent / Decimal::ONE_HUNDRED;

    SlippageEstimate {
        side,
        order_size_quote,
        average_price,
        worst_price,
        slippage_percent,
        slippage_quote,
        filled_quote,
        filled_base,
        shortfall_quote: remaining.max(Decimal::ZERO),
        levels_consumed,
        venue_fills,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::testkit::{aggregated, venue_book};
    use crate::venue::VenueId;
    use rust_decimal_macros::dec;

    fn two_level_book() -> AggregatedBook {
        aggregated(&[venue_book(
            VenueId::Binance,
            vec![(dec!(49990), dec!(2)), (dec!(49980), dec!(2))],
            vec![(dec!(50000), dec!(1)), (dec!(50010), dec!(2))],
        )])
    }

    #[test]
    fn zero_size_yields_best_price_and_no_slippage() {
        let book = two_level_book();
        let est = estimate_slippage(&book, Side::Buy, Decimal::ZERO);

        assert_eq!(est.average_price, dec!(50000));
        assert_eq!(est.slippage_percent, Decimal::ZERO);
        assert_eq!(est.filled_quote, Decimal::ZERO);
        assert!(est.fully_filled());
        assert!(est.venue_fills.is_empty());
    }

    #[test]
    fn buy_walks_into_second_level() {
        let book = two_level_book();
        // First level holds 50,000 quote; the rest fills at 50010.
        let est = estimate_slippage(&book, Side::Buy, dec!(100000));

        assert!(est.fully_filled());
        assert_eq!(est.filled_quote, dec!(100000));
        assert_eq!(est.levels_consumed, 2);
        assert_eq!(est.worst_price, dec!(50010));
        assert!(est.average_price > dec!(50000));
        assert!(est.average_price < dec!(50010));
        assert!(est.slippage_percent > Decimal::ZERO);
    }

    #[test]
    fn single_level_fill_has_no_slippage() {
        let book = two_level_book();
        let est = estimate_slippage(&book, Side::Buy, dec!(25000));

        assert_eq!(est.average_price, dec!(50000));
        assert_eq!(est.slippage_percent, Decimal::ZERO);
        assert_eq!(est.filled_base, dec!(0.5));
    }

    #[test]
    fn sell_walks_bid_ladder() {
        let book = two_level_book();
        let est = estimate_slippage(&book, Side::Sell, dec!(150000));

        assert!(est.fully_filled());
        assert_eq!(est.worst_price, dec!(49980));
        assert!(est.average_price < dec!(49990));
        assert!(est.average_price > dec!(49980));
    }

    #[test]
    fn slippage_is_monotonic_in_order_size() {
        let book = two_level_book();
        let sizes = [dec!(10000), dec!(50000), dec!(90000), dec!(150000)];

        let mut previous = Decimal::ZERO;
        for size in sizes {
            let est = estimate_slippage(&book, Side::Buy, size);
            assert!(
                est.slippage_percent >= previous,
                "slippage decreased at size {size}"
            );
            previous = est.slippage_percent;
        }
    }

    #[test]
    fn exhausted_ladder_reports_shortfall() {
        let book = two_level_book();
        // Ask side holds 50,000 + 100,020 quote in total.
        let est = estimate_slippage(&book, Side::Buy, dec!(200000));

        assert!(!est.fully_filled());
        assert_eq!(est.filled_quote, dec!(150020));
        assert_eq!(est.shortfall_quote, dec!(49980));
        assert!(est.filled_quote < est.order_size_quote);
    }

    #[test]
    fn venue_fills_are_pro_rata_in_first_touch_order() {
        let a = venue_book(
            VenueId::Binance,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50000), dec!(1))],
        );
        let b = venue_book(
            VenueId::Kraken,
            vec![(dec!(49990), dec!(1))],
            vec![(dec!(50000), dec!(3))],
        );
        let book = aggregated(&[a, b]);

        // Consume half the merged 4-unit level.
        let est = estimate_slippage(&book, Side::Buy, dec!(100000));

        assert_eq!(est.filled_base, dec!(2));
        assert_eq!(est.venue_fills.len(), 2);
        assert_eq!(est.venue_fills[0].venue, VenueId::Binance);
        assert_eq!(est.venue_fills[0].quantity, dec!(0.5));
        assert_eq!(est.venue_fills[1].venue, VenueId::Kraken);
        assert_eq!(est.venue_fills[1].quantity, dec!(1.5));
    }
}
