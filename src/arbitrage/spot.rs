//! Two-leg spot arbitrage detection across venues.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::debug;

use crate::book::VenueBook;
use crate::config::Config;
use crate::venue::{Asset, VenueId};

/// Sort key for ranked opportunity lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortKey {
    /// Descending overall score.
    #[default]
    Score,
    /// Descending raw spread percent.
    Spread,
    /// Descending net profit percent.
    Profit,
}

/// A profitable cross-venue spot opportunity, net of assumed taker fees.
#[derive(Debug, Clone, Serialize)]
pub struct SpotOpportunity {
    /// Symbol traded.
    pub symbol: Asset,
    /// Venue to buy at (its ask).
    pub buy_venue: VenueId,
    /// Venue to sell at (its bid).
    pub sell_venue: VenueId,
    /// Best ask at the buy venue.
    pub buy_price: Decimal,
    /// Best bid at the sell venue.
    pub sell_price: Decimal,
    /// Raw spread as a percentage of the buy price.
    pub spread_percent: Decimal,
    /// Combined taker fees of both legs, percent.
    pub estimated_fees_percent: Decimal,
    /// Spread net of fees, percent. Always positive.
    pub net_profit_percent: Decimal,
    /// Confidence score from available depth at both legs, 0-100.
    pub liquidity_score: u32,
    /// Combined ranking score.
    pub overall_score: Decimal,
    /// Opportunity kind tag.
    pub direction: &'static str,
}

/// Scan one cycle's venue books for profitable two-leg opportunities.
///
/// Both directions of every venue pair are considered; a direction
/// survives only when the sell venue's bid exceeds the buy venue's ask
/// and the spread still clears both legs' taker fees.
pub fn scan_spot(symbol: Asset, books: &[VenueBook], config: &Config) -> Vec<SpotOpportunity> {
    let mut books: Vec<&VenueBook> = books.iter().collect();
    books.sort_by_key(|b| b.venue);

    let mut opportunities = Vec::new();

    for buy_book in &books {
        for sell_book in &books {
            if buy_book.venue == sell_book.venue {
                continue;
            }

            let buy = buy_book.best_ask();
            let sell = sell_book.best_bid();

            if sell.price <= buy.price {
                continue;
            }

            let spread_percent =
                (sell.price - buy.price) / buy.price * Decimal::ONE_HUNDRED;
            let fees_percent = config.taker_fee_percent(buy_book.venue)
                + config.taker_fee_percent(sell_book.venue);
            let net_profit_percent = spread_percent - fees_percent;

            if net_profit_percent <= Decimal::ZERO {
                debug!(
                    symbol = %symbol,
                    buy = %buy_book.venue,
                    sell = %sell_book.venue,
                    spread = %spread_percent,
                    fees = %fees_percent,
                    "spread does not clear fees"
                );
                continue;
            }

            let executable_quote = buy.quote_value().min(sell.quote_value());
            let liquidity_score = depth_confidence(executable_quote);

            opportunities.push(SpotOpportunity {
                symbol,
                buy_venue: buy_book.venue,
                sell_venue: sell_book.venue,
                buy_price: buy.price,
                sell_price: sell.price,
                spread_percent,
                estimated_fees_percent: fees_percent,
                net_profit_percent,
                liquidity_score,
                overall_score: overall_score(net_profit_percent, liquidity_score),
                direction: "spot",
            });
        }
    }

    sort_opportunities(&mut opportunities, SortKey::Score);
    opportunities
}

/// Sort opportunities by the requested key, descending; ties break on
/// symbol lexical order, then the venue pair, for deterministic output.
pub fn sort_opportunities(opportunities: &mut [SpotOpportunity], key: SortKey) {
    opportunities.sort_by(|a, b| {
        let primary = match key {
            SortKey::Score => b.overall_score.cmp(&a.overall_score),
            SortKey::Spread => b.spread_percent.cmp(&a.spread_percent),
            SortKey::Profit => b.net_profit_percent.cmp(&a.net_profit_percent),
        };
        primary
            .then_with(|| a.symbol.to_string().cmp(&b.symbol.to_string()))
            .then_with(|| a.buy_venue.cmp(&b.buy_venue))
            .then_with(|| a.sell_venue.cmp(&b.sell_venue))
    });
}

/// Confidence score from the smaller executable quote depth of the two
/// legs. An opportunity nobody can fill is not an opportunity.
fn depth_confidence(executable_quote: Decimal) -> u32 {
    if executable_quote >= Decimal::new(100_000, 0) {
        100
    } else if executable_quote >= Decimal::new(50_000, 0) {
        80
    } else if executable_quote >= Decimal::new(10_000, 0) {
        60
    } else if executable_quote >= Decimal::new(5_000, 0) {
        40
    } else if executable_quote >= Decimal::new(1_000, 0) {
        20
    } else {
        10
    }
}

/// Combine profit and depth confidence into the ranking score.
///
/// Weighted so that deep liquidity outranks marginally higher profit on
/// negligible depth.
fn overall_score(net_profit_percent: Decimal, liquidity_score: u32) -> Decimal {
    let profit_score = (net_profit_percent * Decimal::ONE_HUNDRED)
        .min(Decimal::ONE_HUNDRED);
    profit_score * Decimal::new(6, 1)
        + Decimal::from(liquidity_score) * Decimal::new(4, 1)
}
