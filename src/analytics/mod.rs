//! Pure analytics over the aggregated book.
//!
//! This module handles:
//! - Liquidity depth bands and scoring
//! - Execution slippage simulation

pub mod liquidity;
pub mod slippage;

pub use liquidity::{analyze_liquidity, DepthBand, LiquidityRating, LiquidityReport};
pub use slippage::{estimate_slippage, SlippageEstimate, VenueFill};
