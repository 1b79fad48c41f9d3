//! Venue boundary: identifiers, symbol mapping, and HTTP clients.
//!
//! This module handles:
//! - Venue, asset, and pair types
//! - Venue-native symbol formatting
//! - Public depth endpoint clients and the mock source for tests

pub mod client;
pub mod mock;
pub mod types;

pub use client::{BookSource, VenueClient};
pub use mock::MockBookSource;
pub use types::{venue_symbol, Asset, MarketKind, Pair, RawBook, RawLevel, Side, VenueId};
