//! Finalization pass: turn a folded accumulator into overlay numbers.

use indexmap::IndexMap;
use serde::Serialize;

use super::{average, calculate_win_percent, first_max_key, percent, round2};
use super::{MarketTotals, StatsAccumulator, TechCompletion};
use crate::models::{format_clock_opt, Age, PerAge};

/// How many technologies the per-age rankings keep.
pub const TECH_RANKING_SIZE: usize = 5;

/// Civilizations played fewer times than this are left out of the share map.
pub const DEFAULT_MIN_CIV_PLAYS: u32 = 2;

/// A technology ranked by how often it was completed in an age window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechFrequency {
    pub name: String,
    pub count: u32,
    /// Mean absolute completion time in seconds
    pub avg_time: f64,
    pub avg_time_hms: String,
}

/// Average market amount per resource, for buys and sells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketAverages {
    pub buy: IndexMap<String, Option<f64>>,
    pub sell: IndexMap<String, Option<f64>>,
}

/// Derived numbers for one age.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgeStats {
    pub avg: Option<f64>,
    pub avg_hms: String,
    pub opp_avg: Option<f64>,
    pub opp_avg_hms: String,
    /// Mean number of completions in the age window per match reaching it
    pub avg_techs_after: Option<f64>,
    /// Mean seconds from age-up to each completion
    pub avg_tech_time_after: Option<f64>,
    pub techs_top5: Vec<TechFrequency>,
    pub techs_first5: Vec<TechCompletion>,
    pub market_avg: MarketAverages,
}

/// Final statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedStats {
    pub player_name: Option<String>,
    pub total: u32,
    pub analyzed: u32,
    pub skipped: u32,
    pub total_wins: u32,
    pub win_percent: f64,
    /// Matches whose player record was picked by the first-entry fallback
    pub low_confidence_matches: u32,

    /// Highest win count; ties go to the map seen first
    pub best_map: Option<String>,
    pub most_used_opening: Option<String>,

    pub map_counts: IndexMap<String, u32>,
    pub win_maps: IndexMap<String, u32>,
    pub lose_maps: IndexMap<String, u32>,
    pub map_played_percent: IndexMap<String, f64>,
    pub map_win_percent: IndexMap<String, f64>,

    pub civ_played: IndexMap<String, u32>,
    pub civ_played_percent: IndexMap<String, f64>,

    pub openings: IndexMap<String, u32>,
    pub lose_openings: IndexMap<String, u32>,

    pub ages: PerAge<AgeStats>,

    pub avg_eapm: Option<f64>,
    pub percent_prefer_random: Option<f64>,

    pub wheelbarrow_avg: Option<f64>,
    pub wheelbarrow_avg_hms: String,
    pub hand_cart_avg: Option<f64>,
    pub hand_cart_avg_hms: String,
}

impl StatsAccumulator {
    /// Derive the final statistics. Deterministic for a given fold order.
    pub fn finalize(&self, min_civ_plays: u32) -> DerivedStats {
        let ages = PerAge::from_fn(|age| self.age_stats(age));

        let total_map_plays: u32 = self.map_counts.values().sum();
        let mut map_played_percent = IndexMap::new();
        let mut map_win_percent = IndexMap::new();
        for (map, &count) in &self.map_counts {
            let wins = self.win_maps.get(map).copied().unwrap_or(0);
            map_win_percent.insert(map.clone(), percent(wins, count));
            map_played_percent.insert(map.clone(), percent(count, total_map_plays));
        }

        let total_civ_plays: u32 = self.civ_played.values().sum();
        let civ_played_percent = self
            .civ_played
            .iter()
            .filter(|(_, count)| **count >= min_civ_plays)
            .map(|(civ, &count)| (civ.clone(), percent(count, total_civ_plays)))
            .collect();

        let percent_prefer_random = if self.prefer_random.is_empty() {
            None
        } else {
            let yes = self.prefer_random.iter().filter(|p| **p).count() as f64;
            Some(round2(yes * 100.0 / self.prefer_random.len() as f64))
        };

        let wheelbarrow_avg = average(self.wheelbarrow_times.iter().copied());
        let hand_cart_avg = average(self.hand_cart_times.iter().copied());

        DerivedStats {
            player_name: self.player_name.clone(),
            total: self.total,
            analyzed: self.analyzed,
            skipped: self.skipped,
            total_wins: self.wins,
            win_percent: calculate_win_percent(self.wins, self.total),
            low_confidence_matches: self.low_confidence,
            best_map: first_max_key(&self.win_maps),
            most_used_opening: first_max_key(&self.openings),
            map_counts: self.map_counts.clone(),
            win_maps: self.win_maps.clone(),
            lose_maps: self.lose_maps.clone(),
            map_played_percent,
            map_win_percent,
            civ_played: self.civ_played.clone(),
            civ_played_percent,
            openings: self.openings.clone(),
            lose_openings: self.lose_openings.clone(),
            ages,
            avg_eapm: average(self.eapm.iter().copied()),
            percent_prefer_random,
            wheelbarrow_avg,
            wheelbarrow_avg_hms: format_clock_opt(wheelbarrow_avg),
            hand_cart_avg,
            hand_cart_avg_hms: format_clock_opt(hand_cart_avg),
        }
    }

    fn age_stats(&self, age: Age) -> AgeStats {
        let avg = average(self.age_times.get(age).iter().copied());
        let opp_avg = average(self.opp_age_times.get(age).iter().copied());
        let completions = self.tech_completions.get(age);

        AgeStats {
            avg,
            avg_hms: format_clock_opt(avg),
            opp_avg,
            opp_avg_hms: format_clock_opt(opp_avg),
            avg_techs_after: average(self.techs_per_match.get(age).iter().copied()),
            avg_tech_time_after: average(completions.iter().map(|c| c.rel_time)),
            techs_top5: top_techs(completions, TECH_RANKING_SIZE),
            techs_first5: first_techs(completions, TECH_RANKING_SIZE),
            market_avg: market_averages(self.market.get(age)),
        }
    }
}

/// Most frequent technology names, most frequent first; equal counts keep
/// first-seen order.
pub fn top_techs(completions: &[TechCompletion], limit: usize) -> Vec<TechFrequency> {
    let mut tally: IndexMap<&str, (u32, u64)> = IndexMap::new();
    for completion in completions {
        let entry = tally.entry(completion.name.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += completion.abs_time as u64;
    }

    let mut ranked: Vec<TechFrequency> = tally
        .into_iter()
        .map(|(name, (count, sum))| {
            let avg_time = round2(sum as f64 / count as f64);
            TechFrequency {
                name: name.to_string(),
                count,
                avg_time,
                avg_time_hms: format_clock_opt(Some(avg_time)),
            }
        })
        .collect();

    // Stable sort keeps first-seen order among equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Earliest completions by absolute time, duplicates included.
pub fn first_techs(completions: &[TechCompletion], limit: usize) -> Vec<TechCompletion> {
    let mut sorted = completions.to_vec();
    sorted.sort_by_key(|c| c.abs_time);
    sorted.truncate(limit);
    sorted
}

fn market_averages(totals: &MarketTotals) -> MarketAverages {
    let side = |map: &IndexMap<String, super::ResourceTally>| {
        map.iter()
            .map(|(resource, tally)| {
                let avg = if tally.count > 0 {
                    Some(round2(tally.sum / tally.count as f64))
                } else {
                    None
                };
                (resource.clone(), avg)
            })
            .collect()
    };

    MarketAverages {
        buy: side(&totals.buy),
        sell: side(&totals.sell),
    }
}
