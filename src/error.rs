//! Unified error types for the aggregation engine.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::venue::{MarketKind, VenueId};

/// Top-level error type for the aggregation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Invalid request parameters (client error).
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Every venue failed in one aggregation cycle.
    #[error("no venues available for {symbol} {market}: [{}]", format_reasons(.errors))]
    NoVenuesAvailable {
        /// Requested symbol.
        symbol: String,
        /// Requested market kind.
        market: MarketKind,
        /// Per-venue failure reasons from the cycle.
        errors: Vec<VenueError>,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_reasons(errors: &[VenueError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Request validation errors, surfaced as client errors at the API boundary.
#[derive(Error, Debug, Clone)]
pub enum RequestError {
    /// Symbol is not in the supported set.
    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    /// Market kind is not recognized.
    #[error("unsupported market: {0}")]
    UnsupportedMarket(String),

    /// A query parameter failed validation.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// One venue's fetch or normalization failed.
///
/// Recoverable: the venue is excluded from the cycle and recorded in the
/// snapshot diagnostics, it never aborts the aggregation.
#[derive(Error, Debug, Clone)]
#[error("{venue}: {kind}")]
pub struct VenueError {
    /// Venue that failed.
    pub venue: VenueId,
    /// What went wrong.
    pub kind: VenueErrorKind,
}

impl VenueError {
    /// Create a new venue error.
    pub fn new(venue: VenueId, kind: VenueErrorKind) -> Self {
        Self { venue, kind }
    }
}

/// Failure modes for a single venue within one cycle.
#[derive(Error, Debug, Clone)]
pub enum VenueErrorKind {
    /// Non-success HTTP status from the venue.
    #[error("http status {0}")]
    Status(u16),

    /// Transport-level request failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The venue missed its per-request deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Venue-level error code inside an HTTP 200 response.
    #[error("venue error code: {0}")]
    VenueCode(String),

    /// Book had no usable levels on one or both sides.
    #[error("empty book")]
    EmptyBook,

    /// Best bid at or above best ask, indicating corrupt input.
    #[error("crossed book: bid {bid} >= ask {ask}")]
    CrossedBook {
        /// Reported best bid.
        bid: Decimal,
        /// Reported best ask.
        ask: Decimal,
    },

    /// Venue does not list the requested pair.
    #[error("pair not listed")]
    PairNotListed,

    /// Venue does not offer the requested market kind.
    #[error("{0} market not offered")]
    MarketNotOffered(MarketKind),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
