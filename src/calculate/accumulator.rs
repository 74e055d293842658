//! Running aggregate for one pipeline run.

use indexmap::IndexMap;
use serde::Serialize;

use super::bump;
use crate::models::{Age, MarketAction, MatchSummary, PerAge};

/// A technology completed inside an age window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechCompletion {
    pub name: String,
    /// Seconds since match start
    pub abs_time: u32,
    /// Seconds since the age-up that opened the window
    pub rel_time: u32,
}

/// How the player's record was picked out of an analysis payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribution {
    /// A record carried the player's profile id
    #[default]
    ProfileMatch,
    /// No record matched; the first record was assumed to be the player
    FirstEntryFallback,
}

/// A market transaction attributed to an age.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSample {
    pub age: Age,
    pub action: MarketAction,
    pub resource: String,
    pub amount: f64,
}

/// Everything extracted from one match's analysis payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchObservation {
    pub civilization: Option<String>,
    pub opening: Option<String>,
    pub opponent_opening: Option<String>,
    pub my_age_ups: PerAge<Option<u32>>,
    pub opponent_age_ups: PerAge<Option<u32>>,
    /// Post-age-up completions; `None` for ages the player never reached
    pub techs: PerAge<Option<Vec<TechCompletion>>>,
    pub market: Vec<MarketSample>,
    pub eapm: Option<f64>,
    pub prefer_random: Option<bool>,
    pub wheelbarrow: Option<u32>,
    pub hand_cart: Option<u32>,
    pub attribution: Attribution,
}

/// Sum and count for one market resource.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceTally {
    pub sum: f64,
    pub count: u32,
}

/// Market totals for one age, keyed by resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketTotals {
    pub buy: IndexMap<String, ResourceTally>,
    pub sell: IndexMap<String, ResourceTally>,
}

impl MarketTotals {
    fn side_mut(&mut self, action: MarketAction) -> &mut IndexMap<String, ResourceTally> {
        match action {
            MarketAction::Buy => &mut self.buy,
            MarketAction::Sell => &mut self.sell,
        }
    }
}

/// Aggregate built across all matches of one run.
///
/// Sample lists only grow while folding; they are read once, by
/// [`StatsAccumulator::finalize`].
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    pub(super) total: u32,
    pub(super) analyzed: u32,
    pub(super) skipped: u32,
    pub(super) wins: u32,
    pub(super) low_confidence: u32,
    pub(super) player_name: Option<String>,

    pub(super) map_counts: IndexMap<String, u32>,
    pub(super) win_maps: IndexMap<String, u32>,
    pub(super) lose_maps: IndexMap<String, u32>,
    pub(super) civ_played: IndexMap<String, u32>,
    pub(super) openings: IndexMap<String, u32>,
    pub(super) lose_openings: IndexMap<String, u32>,

    pub(super) age_times: PerAge<Vec<u32>>,
    pub(super) opp_age_times: PerAge<Vec<u32>>,
    /// Number of post-age-up completions, one entry per match reaching the age
    pub(super) techs_per_match: PerAge<Vec<u32>>,
    pub(super) tech_completions: PerAge<Vec<TechCompletion>>,
    pub(super) market: PerAge<MarketTotals>,

    pub(super) eapm: Vec<f64>,
    pub(super) prefer_random: Vec<bool>,
    pub(super) wheelbarrow_times: Vec<u32>,
    pub(super) hand_cart_times: Vec<u32>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn analyzed(&self) -> u32 {
        self.analyzed
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Count a finished match before its analysis is attempted.
    pub fn record_listed(&mut self, summary: &MatchSummary) {
        self.total += 1;
        if summary.won {
            self.wins += 1;
        }
        if self.player_name.is_none() {
            self.player_name = summary.player_name.clone();
        }
    }

    /// Count a match whose analysis could not be obtained.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Fold one analysed match.
    pub fn record_analysis(&mut self, summary: &MatchSummary, obs: MatchObservation) {
        self.analyzed += 1;
        if obs.attribution == Attribution::FirstEntryFallback {
            self.low_confidence += 1;
        }

        if let Some(map) = summary.map_name.as_deref() {
            bump(&mut self.map_counts, map);
            if summary.won {
                bump(&mut self.win_maps, map);
            } else {
                bump(&mut self.lose_maps, map);
            }
        }

        if let Some(civ) = obs.civilization.as_deref().or(summary.player_civ.as_deref()) {
            bump(&mut self.civ_played, civ);
        }

        if let Some(opening) = obs.opening.as_deref() {
            bump(&mut self.openings, opening);
        }
        if !summary.won {
            if let Some(opening) = obs.opponent_opening.as_deref() {
                bump(&mut self.lose_openings, opening);
            }
        }

        for age in Age::ALL {
            if let Some(t) = *obs.my_age_ups.get(age) {
                self.age_times.get_mut(age).push(t);
            }
            if let Some(t) = *obs.opponent_age_ups.get(age) {
                self.opp_age_times.get_mut(age).push(t);
            }
        }

        let MatchObservation { techs, market, .. } = obs;
        for age in Age::ALL {
            if let Some(completions) = techs.get(age) {
                self.techs_per_match
                    .get_mut(age)
                    .push(completions.len() as u32);
                self.tech_completions
                    .get_mut(age)
                    .extend(completions.iter().cloned());
            }
        }

        for sample in market {
            let tally = self
                .market
                .get_mut(sample.age)
                .side_mut(sample.action)
                .entry(sample.resource)
                .or_default();
            tally.sum += sample.amount;
            tally.count += 1;
        }

        if let Some(eapm) = obs.eapm {
            self.eapm.push(eapm);
        }
        if let Some(prefer_random) = obs.prefer_random {
            self.prefer_random.push(prefer_random);
        }
        if let Some(t) = obs.wheelbarrow {
            self.wheelbarrow_times.push(t);
        }
        if let Some(t) = obs.hand_cart {
            self.hand_cart_times.push(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(map: Option<&str>, won: bool) -> MatchSummary {
        MatchSummary {
            match_id: 1,
            map_name: map.map(str::to_string),
            player_name: Some("Hera".to_string()),
            player_civ: Some("Mongols".to_string()),
            opponent_civ: Some("Franks".to_string()),
            won,
            started: None,
            finished: None,
        }
    }

    #[test]
    fn test_record_listed_counts_wins() {
        let mut acc = StatsAccumulator::new();
        acc.record_listed(&summary(Some("Arabia"), true));
        acc.record_listed(&summary(Some("Arabia"), false));

        assert_eq!(acc.total(), 2);
        assert_eq!(acc.wins, 1);
        assert_eq!(acc.player_name.as_deref(), Some("Hera"));
    }

    #[test]
    fn test_record_analysis_maps_and_openings() {
        let mut acc = StatsAccumulator::new();
        let obs = MatchObservation {
            opening: Some("scouts".to_string()),
            opponent_opening: Some("archers".to_string()),
            ..Default::default()
        };

        acc.record_analysis(&summary(Some("Arabia"), true), obs.clone());
        acc.record_analysis(&summary(Some("Arabia"), false), obs.clone());
        acc.record_analysis(&summary(None, false), obs);

        assert_eq!(acc.analyzed(), 3);
        assert_eq!(acc.map_counts["Arabia"], 2);
        assert_eq!(acc.win_maps["Arabia"], 1);
        assert_eq!(acc.lose_maps["Arabia"], 1);
        assert_eq!(acc.openings["scouts"], 3);
        // Opponent openings are only tracked in defeats.
        assert_eq!(acc.lose_openings["archers"], 2);
        // Falls back to the listed civilization.
        assert_eq!(acc.civ_played["Mongols"], 3);
    }

    #[test]
    fn test_record_analysis_partial_data() {
        let mut acc = StatsAccumulator::new();
        let obs = MatchObservation {
            my_age_ups: PerAge {
                feudal: Some(600),
                castle: None,
                imperial: None,
            },
            techs: PerAge {
                feudal: Some(vec![TechCompletion {
                    name: "Double-Bit Axe".to_string(),
                    abs_time: 700,
                    rel_time: 100,
                }]),
                castle: None,
                imperial: None,
            },
            market: vec![
                MarketSample {
                    age: Age::Feudal,
                    action: MarketAction::Buy,
                    resource: "food".to_string(),
                    amount: 100.0,
                },
                MarketSample {
                    age: Age::Feudal,
                    action: MarketAction::Buy,
                    resource: "food".to_string(),
                    amount: 50.0,
                },
            ],
            attribution: Attribution::FirstEntryFallback,
            ..Default::default()
        };

        acc.record_analysis(&summary(None, true), obs);

        assert_eq!(acc.age_times.feudal, vec![600]);
        assert!(acc.age_times.castle.is_empty());
        assert_eq!(acc.techs_per_match.feudal, vec![1]);
        assert!(acc.techs_per_match.castle.is_empty());
        assert_eq!(
            acc.market.feudal.buy["food"],
            ResourceTally {
                sum: 150.0,
                count: 2
            }
        );
        assert_eq!(acc.low_confidence, 1);
        assert!(acc.map_counts.is_empty());
    }

    #[test]
    fn test_record_skipped() {
        let mut acc = StatsAccumulator::new();
        acc.record_listed(&summary(None, true));
        acc.record_skipped();
        assert_eq!(acc.skipped(), 1);
        assert_eq!(acc.analyzed(), 0);
    }
}
