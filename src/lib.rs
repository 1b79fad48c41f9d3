//! Multi-exchange order book aggregation and arbitrage detection engine.
//!
//! Fetches live order book snapshots from several exchanges in parallel,
//! merges them into one unified ladder per symbol, and derives analytics
//! from that view: best-price discovery, depth and liquidity scoring,
//! execution slippage estimates, and cross-venue arbitrage opportunities
//! (two-leg spot and three-leg triangular).
//!
//! Venue failures are partial by design: a cycle aggregates whatever
//! venues answered in time and records the rest in its diagnostics. Only
//! a cycle with zero usable venues fails the request.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`venue`]: Venue identifiers, symbol mapping, and HTTP clients
//! - [`book`]: Normalization and cross-venue aggregation
//! - [`analytics`]: Liquidity scoring and slippage simulation
//! - [`arbitrage`]: Spot and triangular opportunity scanning
//! - [`refresh`]: Snapshot cache and single-flight refresh cycles
//! - [`api`]: HTTP API exposing the engine
//! - [`metrics`]: Prometheus metrics

pub mod analytics;
pub mod api;
pub mod arbitrage;
pub mod book;
pub mod config;
pub mod error;
pub mod metrics;
pub mod refresh;
pub mod venue;

pub use config::Config;
pub use error::{EngineError, Result};
