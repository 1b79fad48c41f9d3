//! HTTP clients for the public order-book endpoints of each venue.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{venue_symbol, MarketKind, Pair, RawBook, RawLevel, VenueId};
use crate::config::Config;
use crate::error::{VenueError, VenueErrorKind};

const BINANCE_SPOT_URL: &str = "https://api.binance.com/api/v3/depth";
const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com/fapi/v1/depth";
const BYBIT_URL: &str = "https://api.bybit.com/v5/market/orderbook";
const OKX_URL: &str = "https://www.okx.com/api/v5/market/books";
const KRAKEN_URL: &str = "https://api.kraken.com/0/public/Depth";
const KUCOIN_URL: &str = "https://api.kucoin.com/api/v1/market/orderbook/level2_100";
const COINBASE_URL: &str = "https://api.exchange.coinbase.com/products";

/// Anything that can produce a raw order book for a venue/pair/market.
///
/// The live implementation is [`VenueClient`]; tests inject
/// [`mock::MockBookSource`](super::mock::MockBookSource).
pub trait BookSource: Send + Sync {
    /// Fetch one raw, unvalidated order book snapshot.
    fn fetch_book(
        &self,
        venue: VenueId,
        pair: Pair,
        market: MarketKind,
    ) -> impl Future<Output = Result<RawBook, VenueError>> + Send;
}

/// Read-only HTTP client over every supported venue's public depth
/// endpoint. No authentication, no write operations.
#[derive(Debug, Clone)]
pub struct VenueClient {
    /// Shared HTTP client with pooling and per-request timeout.
    http: reqwest::Client,
    /// Depth requested from each venue.
    depth_limit: u32,
    /// Per-request timeout, for error reporting.
    timeout: Duration,
}

impl VenueClient {
    /// Create a client from config with low-latency HTTP settings.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.venue_timeout())
            // Fast connection establishment
            .connect_timeout(Duration::from_millis(500))
            // TCP_NODELAY for low-latency (disable Nagle's algorithm)
            .tcp_nodelay(true)
            // Keep connections alive for reuse
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(config.http_pool_size)
            .pool_idle_timeout(Duration::from_secs(90))
            // Coinbase rejects requests without a user agent
            .user_agent(concat!("crossbook/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            depth_limit: config.depth_limit,
            timeout: config.venue_timeout(),
        }
    }

    /// GET a JSON document, mapping transport and status failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        venue: VenueId,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(venue, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VenueError::new(
                venue,
                VenueErrorKind::Status(status.as_u16()),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            VenueError::new(venue, VenueErrorKind::Malformed(e.to_string()))
        })
    }

    fn transport_error(&self, venue: VenueId, error: reqwest::Error) -> VenueError {
        let kind = if error.is_timeout() {
            VenueErrorKind::Timeout(self.timeout)
        } else {
            VenueErrorKind::Transport(error.to_string())
        };
        VenueError::new(venue, kind)
    }

    async fn fetch_binance(
        &self,
        symbol: &str,
        market: MarketKind,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let url = match market {
            MarketKind::Spot => BINANCE_SPOT_URL,
            MarketKind::Futures => BINANCE_FUTURES_URL,
        };
        let depth: BinanceDepth = self
            .get_json(
                VenueId::Binance,
                url,
                &[
                    ("symbol", symbol.to_string()),
                    ("limit", self.depth_limit.to_string()),
                ],
            )
            .await?;

        Ok((
            parse_string_levels(VenueId::Binance, &depth.bids)?,
            parse_string_levels(VenueId::Binance, &depth.asks)?,
        ))
    }

    async fn fetch_bybit(
        &self,
        symbol: &str,
        market: MarketKind,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let category = match market {
            MarketKind::Spot => "spot",
            MarketKind::Futures => "linear",
        };
        let response: BybitResponse = self
            .get_json(
                VenueId::Bybit,
                BYBIT_URL,
                &[
                    ("category", category.to_string()),
                    ("symbol", symbol.to_string()),
                    ("limit", self.depth_limit.to_string()),
                ],
            )
            .await?;

        if response.ret_code != 0 {
            return Err(VenueError::new(
                VenueId::Bybit,
                VenueErrorKind::VenueCode(format!(
                    "{} {}",
                    response.ret_code, response.ret_msg
                )),
            ));
        }
        let result = response.result.ok_or_else(|| {
            VenueError::new(
                VenueId::Bybit,
                VenueErrorKind::Malformed("missing result".to_string()),
            )
        })?;

        Ok((
            parse_string_levels(VenueId::Bybit, &result.b)?,
            parse_string_levels(VenueId::Bybit, &result.a)?,
        ))
    }

    async fn fetch_okx(
        &self,
        symbol: &str,
        market: MarketKind,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let inst_id = match market {
            MarketKind::Spot => symbol.to_string(),
            MarketKind::Futures => format!("{symbol}-SWAP"),
        };
        let response: OkxResponse = self
            .get_json(
                VenueId::Okx,
                OKX_URL,
                &[("instId", inst_id), ("sz", self.depth_limit.to_string())],
            )
            .await?;

        if response.code != "0" {
            return Err(VenueError::new(
                VenueId::Okx,
                VenueErrorKind::VenueCode(format!("{} {}", response.code, response.msg)),
            ));
        }
        let book = response.data.into_iter().next().ok_or_else(|| {
            VenueError::new(
                VenueId::Okx,
                VenueErrorKind::Malformed("empty data array".to_string()),
            )
        })?;

        Ok((
            parse_loose_levels(VenueId::Okx, &book.bids)?,
            parse_loose_levels(VenueId::Okx, &book.asks)?,
        ))
    }

    async fn fetch_kraken(
        &self,
        symbol: &str,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let response: KrakenResponse = self
            .get_json(
                VenueId::Kraken,
                KRAKEN_URL,
                &[
                    ("pair", symbol.to_string()),
                    ("count", self.depth_limit.to_string()),
                ],
            )
            .await?;

        if !response.error.is_empty() {
            return Err(VenueError::new(
                VenueId::Kraken,
                VenueErrorKind::VenueCode(response.error.join(", ")),
            ));
        }
        // Kraken keys the result by its own pair spelling.
        let book = response.result.into_values().next().ok_or_else(|| {
            VenueError::new(
                VenueId::Kraken,
                VenueErrorKind::Malformed("empty result".to_string()),
            )
        })?;

        Ok((
            parse_tagged_levels(VenueId::Kraken, &book.bids)?,
            parse_tagged_levels(VenueId::Kraken, &book.asks)?,
        ))
    }

    async fn fetch_kucoin(
        &self,
        symbol: &str,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let response: KucoinResponse = self
            .get_json(VenueId::Kucoin, KUCOIN_URL, &[("symbol", symbol.to_string())])
            .await?;

        if response.code != "200000" {
            return Err(VenueError::new(
                VenueId::Kucoin,
                VenueErrorKind::VenueCode(response.code),
            ));
        }
        let data = response.data.ok_or_else(|| {
            VenueError::new(
                VenueId::Kucoin,
                VenueErrorKind::Malformed("missing data".to_string()),
            )
        })?;

        let take = self.depth_limit as usize;
        Ok((
            parse_string_levels(VenueId::Kucoin, truncated(&data.bids, take))?,
            parse_string_levels(VenueId::Kucoin, truncated(&data.asks, take))?,
        ))
    }

    async fn fetch_coinbase(
        &self,
        symbol: &str,
    ) -> Result<(Vec<RawLevel>, Vec<RawLevel>), VenueError> {
        let url = format!("{COINBASE_URL}/{symbol}/book");
        let book: CoinbaseBook = self
            .get_json(VenueId::Coinbase, &url, &[("level", "2".to_string())])
            .await?;

        let take = self.depth_limit as usize;
        Ok((
            parse_tagged_levels(VenueId::Coinbase, truncated(&book.bids, take))?,
            parse_tagged_levels(VenueId::Coinbase, truncated(&book.asks, take))?,
        ))
    }
}

impl BookSource for VenueClient {
    #[instrument(skip(self), fields(venue = %venue, pair = %pair, market = %market))]
    async fn fetch_book(
        &self,
        venue: VenueId,
        pair: Pair,
        market: MarketKind,
    ) -> Result<RawBook, VenueError> {
        if !venue.supports(market) {
            return Err(VenueError::new(
                venue,
                VenueErrorKind::MarketNotOffered(market),
            ));
        }
        let symbol = venue_symbol(venue, pair)
            .ok_or_else(|| VenueError::new(venue, VenueErrorKind::PairNotListed))?;

        let started = Instant::now();
        let (bids, asks) = match venue {
            VenueId::Binance => self.fetch_binance(&symbol, market).await?,
            VenueId::Bybit => self.fetch_bybit(&symbol, market).await?,
            VenueId::Okx => self.fetch_okx(&symbol, market).await?,
            VenueId::Kraken => self.fetch_kraken(&symbol).await?,
            VenueId::Kucoin => self.fetch_kucoin(&symbol).await?,
            VenueId::Coinbase => self.fetch_coinbase(&symbol).await?,
        };
        let latency = started.elapsed();

        debug!(
            venue = %venue,
            bids = bids.len(),
            asks = asks.len(),
            latency_ms = latency.as_millis() as u64,
            "fetched order book"
        );

        Ok(RawBook {
            venue,
            pair,
            market,
            bids,
            asks,
            latency,
        })
    }
}

// === Wire formats ===

#[derive(Debug, Deserialize)]
struct BinanceDepth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<BybitDepth>,
}

#[derive(Debug, Deserialize)]
struct BybitDepth {
    b: Vec<[String; 2]>,
    a: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<OkxDepth>,
}

/// OKX levels carry two trailing count fields this engine ignores.
#[derive(Debug, Deserialize)]
struct OkxDepth {
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, KrakenDepth>,
}

#[derive(Debug, Deserialize)]
struct KrakenDepth {
    bids: Vec<TaggedLevel>,
    asks: Vec<TaggedLevel>,
}

#[derive(Debug, Deserialize)]
struct KucoinResponse {
    code: String,
    data: Option<KucoinDepth>,
}

#[derive(Debug, Deserialize)]
struct KucoinDepth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseBook {
    bids: Vec<TaggedLevel>,
    asks: Vec<TaggedLevel>,
}

/// Price/quantity plus one venue-specific trailing field (Kraken ships a
/// timestamp, Coinbase an order count).
#[derive(Debug, Deserialize)]
struct TaggedLevel(String, String, serde_json::Value);

// === Parsing helpers ===

fn truncated<T>(levels: &[T], take: usize) -> &[T] {
    &levels[..levels.len().min(take)]
}

fn parse_string_levels(
    venue: VenueId,
    levels: &[[String; 2]],
) -> Result<Vec<RawLevel>, VenueError> {
    levels
        .iter()
        .map(|[price, quantity]| parse_level(venue, price, quantity))
        .collect()
}

fn parse_loose_levels(
    venue: VenueId,
    levels: &[Vec<String>],
) -> Result<Vec<RawLevel>, VenueError> {
    levels
        .iter()
        .map(|level| match level.as_slice() {
            [price, quantity, ..] => parse_level(venue, price, quantity),
            _ => Err(VenueError::new(
                venue,
                VenueErrorKind::Malformed(format!("level with {} fields", level.len())),
            )),
        })
        .collect()
}

fn parse_tagged_levels(
    venue: VenueId,
    levels: &[TaggedLevel],
) -> Result<Vec<RawLevel>, VenueError> {
    levels
        .iter()
        .map(|TaggedLevel(price, quantity, _)| parse_level(venue, price, quantity))
        .collect()
}

fn parse_level(venue: VenueId, price: &str, quantity: &str) -> Result<RawLevel, VenueError> {
    let parse = |field: &str, value: &str| {
        value.parse::<rust_decimal::Decimal>().map_err(|_| {
            VenueError::new(
                venue,
                VenueErrorKind::Malformed(format!("unparseable {field}: {value:?}")),
            )
        })
    };

    Ok(RawLevel {
        price: parse("price", price)?,
        quantity: parse("quantity", quantity)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::Asset;
    use rust_decimal_macros::dec;

    #[test]
    fn client_creation_works() {
        let config = Config::default();
        let client = VenueClient::new(&config);
        assert_eq!(client.depth_limit, 100);
        assert_eq!(client.timeout, Duration::from_millis(3_000));
    }

    #[test]
    fn parses_string_levels() {
        let levels = [
            ["50000.5".to_string(), "1.25".to_string()],
            ["49999".to_string(), "0".to_string()],
        ];

        let parsed = parse_string_levels(VenueId::Binance, &levels).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].price, dec!(50000.5));
        assert_eq!(parsed[0].quantity, dec!(1.25));
    }

    #[test]
    fn malformed_level_is_a_venue_error() {
        let levels = [["not-a-number".to_string(), "1".to_string()]];

        let err = parse_string_levels(VenueId::Kucoin, &levels).unwrap_err();

        assert_eq!(err.venue, VenueId::Kucoin);
        assert!(matches!(err.kind, VenueErrorKind::Malformed(_)));
    }

    #[test]
    fn loose_levels_ignore_trailing_fields() {
        let levels = vec![vec![
            "50000".to_string(),
            "2".to_string(),
            "0".to_string(),
            "4".to_string(),
        ]];

        let parsed = parse_loose_levels(VenueId::Okx, &levels).unwrap();
        assert_eq!(parsed[0].price, dec!(50000));
        assert_eq!(parsed[0].quantity, dec!(2));
    }

    #[test]
    fn kraken_wire_format_deserializes() {
        let json = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": {
                    "bids": [["49990.1", "1.2", 1700000000]],
                    "asks": [["50010.9", "0.8", 1700000001]]
                }
            }
        }"#;

        let response: KrakenResponse = serde_json::from_str(json).unwrap();
        let book = response.result.into_values().next().unwrap();
        let bids = parse_tagged_levels(VenueId::Kraken, &book.bids).unwrap();

        assert_eq!(bids[0].price, dec!(49990.1));
        assert_eq!(bids[0].quantity, dec!(1.2));
    }

    #[tokio::test]
    async fn unsupported_market_is_rejected_without_network() {
        let client = VenueClient::new(&Config::default());

        let err = client
            .fetch_book(VenueId::Kraken, Pair::usdt(Asset::Btc), MarketKind::Futures)
            .await
            .unwrap_err();

        assert!(matches!(err.kind, VenueErrorKind::MarketNotOffered(_)));
    }

    #[tokio::test]
    async fn unlisted_pair_is_rejected_without_network() {
        let client = VenueClient::new(&Config::default());

        let err = client
            .fetch_book(VenueId::Coinbase, Pair::usdt(Asset::Bnb), MarketKind::Spot)
            .await
            .unwrap_err();

        assert!(matches!(err.kind, VenueErrorKind::PairNotListed));
    }
}
