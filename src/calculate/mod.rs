//! Statistics calculation engine.
//!
//! Folds per-match observations into a [`StatsAccumulator`] and derives
//! the final overlay numbers from it:
//! - Win rate, best map, map and civilization shares
//! - Player vs opponent age-up averages
//! - Post-age-up technology rankings
//! - Market activity per age

mod accumulator;
mod derive;

pub use accumulator::*;
pub use derive::*;

use indexmap::IndexMap;

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the samples rounded to two decimals; `None` when empty.
pub fn average<I>(samples: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let (sum, count) = samples
        .into_iter()
        .fold((0.0_f64, 0_u64), |(sum, count), v| (sum + v.into(), count + 1));
    if count == 0 {
        None
    } else {
        Some(round2(sum / count as f64))
    }
}

/// `part * 100 / whole` rounded to two decimals; 0 when `whole` is 0.
pub fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

/// Calculate win percentage from wins and total matches.
pub fn calculate_win_percent(wins: u32, total: u32) -> f64 {
    percent(wins, total)
}

/// Key with the highest count. Among equal counts the first inserted wins.
pub fn first_max_key(counts: &IndexMap<String, u32>) -> Option<String> {
    let mut best: Option<(&String, u32)> = None;
    for (key, &count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((key, count)),
        }
    }
    best.map(|(key, _)| key.clone())
}

/// Increment a counter keyed by name.
pub(crate) fn bump(counts: &mut IndexMap<String, u32>, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}
