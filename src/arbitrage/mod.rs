//! Arbitrage detection across venues.
//!
//! This module handles:
//! - Two-leg spot opportunities between venue pairs
//! - Three-leg triangular cycles within one venue

pub mod spot;
pub mod triangular;

pub use spot::{scan_spot, sort_opportunities, SortKey, SpotOpportunity};
pub use triangular::{
    evaluate_cycle, scan_triangular, sort_triangular, TriangularOpportunity,
    TRIANGLE_CYCLES,
};
