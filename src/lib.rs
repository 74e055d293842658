//! # AoE2 Overlay
//!
//! Player statistics for an Age of Empires II stream overlay, aggregated
//! from a public match-history and match-analysis API.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (listed matches, analysis payloads, ages, clocks)
//! - **fetch**: HTTP JSON fetching with an optional on-disk cache
//! - **upstream**: Upstream client behind the `StatsSource` trait
//! - **retry**: Bounded retry policy and cancellation
//! - **pipeline**: Match listing, analysis and orchestration of one run
//! - **calculate**: Statistics accumulation and derived metrics
//! - **api**: REST API endpoint
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod upstream;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
///
/// Returns `None` when the value does not fit in whole seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(multiplier)?))
}
