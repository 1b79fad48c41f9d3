//! Venue, asset, and pair types shared across the engine.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported exchange venues.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum VenueId {
    /// Binance spot and USD-M futures.
    Binance,
    /// Bybit spot and linear perpetuals.
    Bybit,
    /// OKX spot and perpetual swaps.
    Okx,
    /// Kraken spot.
    Kraken,
    /// KuCoin spot.
    Kucoin,
    /// Coinbase Exchange spot.
    Coinbase,
}

impl VenueId {
    /// All venues in deterministic id order.
    pub fn all() -> &'static [VenueId] {
        &[
            VenueId::Binance,
            VenueId::Bybit,
            VenueId::Okx,
            VenueId::Kraken,
            VenueId::Kucoin,
            VenueId::Coinbase,
        ]
    }

    /// Whether the venue offers the given market kind.
    pub fn supports(&self, market: MarketKind) -> bool {
        match market {
            MarketKind::Spot => true,
            MarketKind::Futures => {
                matches!(self, VenueId::Binance | VenueId::Bybit | VenueId::Okx)
            }
        }
    }
}

/// Market kind for an order book request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MarketKind {
    /// Spot market.
    #[default]
    Spot,
    /// Futures / linear perpetual market.
    Futures,
}

/// Order side for slippage simulation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Side {
    /// Buy (consumes asks).
    Buy,
    /// Sell (consumes bids).
    Sell,
}

/// Assets in the supported universe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Asset {
    /// Bitcoin.
    Btc,
    /// Ether.
    Eth,
    /// Solana.
    Sol,
    /// BNB.
    Bnb,
    /// XRP.
    Xrp,
    /// Cardano.
    Ada,
    /// Dogecoin.
    Doge,
    /// Avalanche.
    Avax,
    /// Chainlink.
    Link,
    /// Tether, the quote leg of every supported pair.
    Usdt,
}

/// A trading pair, `base` priced in `quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    /// Base asset.
    pub base: Asset,
    /// Quote asset.
    pub quote: Asset,
}

impl Pair {
    /// Create a pair.
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// The default quote-currency pair for a symbol (`BTC` -> BTC/USDT).
    pub fn usdt(base: Asset) -> Self {
        Self::new(base, Asset::Usdt)
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Kraken's legacy pair codes for USDT-quoted symbols.
static KRAKEN_PAIRS: Lazy<HashMap<Asset, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (Asset::Btc, "XXBTZUSD"),
        (Asset::Eth, "XETHZUSD"),
        (Asset::Sol, "SOLUSD"),
        (Asset::Xrp, "XXRPZUSD"),
        (Asset::Ada, "ADAUSD"),
        (Asset::Doge, "XDGUSD"),
        (Asset::Avax, "AVAXUSD"),
        (Asset::Link, "LINKUSD"),
    ])
});

/// Assets Coinbase does not list against USD.
static COINBASE_UNLISTED: &[Asset] = &[Asset::Bnb];

/// Format a pair in a venue's native symbol convention.
///
/// Returns `None` when the venue does not list the pair at all, which the
/// caller treats as "skip this venue", not as a fetch failure.
pub fn venue_symbol(venue: VenueId, pair: Pair) -> Option<String> {
    match venue {
        VenueId::Binance | VenueId::Bybit => {
            Some(format!("{}{}", pair.base, pair.quote))
        }
        VenueId::Okx | VenueId::Kucoin => {
            Some(format!("{}-{}", pair.base, pair.quote))
        }
        VenueId::Kraken => {
            // Legacy codes exist only for the USD(T)-quoted majors.
            if pair.quote == Asset::Usdt {
                KRAKEN_PAIRS.get(&pair.base).map(|s| s.to_string())
            } else {
                None
            }
        }
        VenueId::Coinbase => {
            if COINBASE_UNLISTED.contains(&pair.base) {
                return None;
            }
            // Coinbase quotes the majors in USD, which this engine treats
            // as equivalent to the USDT quote leg.
            if pair.quote == Asset::Usdt {
                Some(format!("{}-USD", pair.base))
            } else {
                Some(format!("{}-{}", pair.base, pair.quote))
            }
        }
    }
}

/// One unvalidated price level as parsed from a venue response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLevel {
    /// Quoted price.
    pub price: Decimal,
    /// Quoted quantity in base units.
    pub quantity: Decimal,
}

/// One venue's order book exactly as fetched, before normalization.
#[derive(Debug, Clone)]
pub struct RawBook {
    /// Venue the book came from.
    pub venue: VenueId,
    /// Pair the book is for.
    pub pair: Pair,
    /// Market kind.
    pub market: MarketKind,
    /// Bid levels in venue order.
    pub bids: Vec<RawLevel>,
    /// Ask levels in venue order.
    pub asks: Vec<RawLevel>,
    /// Round-trip latency of the fetch.
    pub latency: std::time::Duration,
}
