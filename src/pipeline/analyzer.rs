//! Match Analyzer: fetch per-match analyses and fold them.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::PipelineError;
use crate::calculate::{Attribution, MarketSample, MatchObservation, StatsAccumulator, TechCompletion};
use crate::fetch::FetchError;
use crate::models::{
    parse_clock, Age, AnalysisPayload, MarketAction, MatchSummary, PerAge, PlayerAnalysis,
};
use crate::retry::{CancelSignal, Retrier, RetryOutcome};
use crate::upstream::StatsSource;

const WHEELBARROW: &str = "wheelbarrow";
const HAND_CART: &str = "hand cart";

/// Result of fetching one match's analysis under the retry policy.
#[derive(Debug)]
pub enum AnalysisFetch {
    Payload(AnalysisPayload),
    /// Upstream has no analysis for this match
    NotFound,
    /// Attempts exhausted, or a non-retryable failure other than not-found
    Failed { attempts: u32 },
    Cancelled,
}

/// Fetches analyses with bounded retries and folds them into an accumulator.
pub struct MatchAnalyzer {
    source: Arc<dyn StatsSource>,
    retrier: Retrier,
    concurrency: usize,
}

impl MatchAnalyzer {
    /// `concurrency` caps in-flight analysis fetches; 1 is strictly serial.
    pub fn new(source: Arc<dyn StatsSource>, retrier: Retrier, concurrency: usize) -> Self {
        Self {
            source,
            retrier,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch one analysis. Not-found is terminal; other failures are retried.
    pub async fn fetch_analysis(&self, match_id: i64, cancel: &CancelSignal) -> AnalysisFetch {
        let label = format!("analysis {}", match_id);
        let outcome = self
            .retrier
            .run(&label, cancel, |attempt| {
                debug!("Fetching analysis for match {} (attempt {})", match_id, attempt);
                self.source.fetch_analysis(match_id)
            })
            .await;

        match outcome {
            RetryOutcome::Success { value, .. } => AnalysisFetch::Payload(value),
            RetryOutcome::Terminal {
                error: FetchError::NotFound(_),
                ..
            } => AnalysisFetch::NotFound,
            RetryOutcome::Terminal { error, attempts } | RetryOutcome::Exhausted { error, attempts } => {
                warn!(
                    "Match {}: analysis unavailable after {} attempt(s): {}",
                    match_id, attempts, error
                );
                AnalysisFetch::Failed { attempts }
            }
            RetryOutcome::Cancelled { .. } => AnalysisFetch::Cancelled,
        }
    }

    /// Fetch every analysis and fold the results in listing order.
    ///
    /// Fetches run at most `concurrency` at a time; folding is sequential so
    /// the aggregate does not depend on completion order.
    pub async fn analyze(
        &self,
        matches: &[MatchSummary],
        player_id: i64,
        cancel: &CancelSignal,
    ) -> Result<StatsAccumulator, PipelineError> {
        let semaphore = Semaphore::new(self.concurrency);
        let semaphore = &semaphore;

        let fetches = matches.iter().map(|summary| async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return AnalysisFetch::Cancelled,
            };
            self.fetch_analysis(summary.match_id, cancel).await
        });
        let results = join_all(fetches).await;

        let mut acc = StatsAccumulator::new();
        for (summary, fetched) in matches.iter().zip(results) {
            acc.record_listed(summary);
            match fetched {
                AnalysisFetch::Payload(payload) => {
                    let obs = observe(summary, &payload, player_id);
                    if obs.attribution == Attribution::FirstEntryFallback {
                        warn!(
                            "Match {}: no analysis record for player {}, assuming the first record (low confidence)",
                            summary.match_id, player_id
                        );
                    }
                    info!(
                        "Match {} analysed ({} on {})",
                        summary.match_id,
                        obs.civilization
                            .as_deref()
                            .or(summary.player_civ.as_deref())
                            .unwrap_or("unknown civ"),
                        summary.map_name.as_deref().unwrap_or("unknown map")
                    );
                    acc.record_analysis(summary, obs);
                }
                AnalysisFetch::NotFound => {
                    warn!("Match {}: no analysis available, skipping", summary.match_id);
                    acc.record_skipped();
                }
                AnalysisFetch::Failed { .. } => {
                    acc.record_skipped();
                }
                AnalysisFetch::Cancelled => return Err(PipelineError::Cancelled),
            }
        }

        info!(
            "Analysed {} of {} matches ({} skipped)",
            acc.analyzed(),
            acc.total(),
            acc.skipped()
        );
        Ok(acc)
    }
}

/// Extract everything the accumulator needs from one analysis payload.
///
/// The record carrying `player_id` is the player; any other record is the
/// opponent. Without a matching record the first one is used and the
/// observation is marked low confidence.
pub fn observe(summary: &MatchSummary, payload: &AnalysisPayload, player_id: i64) -> MatchObservation {
    let players = &payload.players;
    let (me, opponent, attribution) =
        match players.iter().position(|p| p.profile_id == Some(player_id)) {
            Some(index) => (
                players.get(index),
                players.iter().enumerate().find(|(i, _)| *i != index).map(|(_, p)| p),
                Attribution::ProfileMatch,
            ),
            None if !players.is_empty() => {
                (players.first(), players.get(1), Attribution::FirstEntryFallback)
            }
            None => (None, None, Attribution::ProfileMatch),
        };

    let Some(me) = me else {
        debug!("Match {}: analysis has no player records", summary.match_id);
        return MatchObservation::default();
    };

    let my_age_ups = age_ups(me);
    let opponent_age_ups = opponent.map(age_ups).unwrap_or_default();

    MatchObservation {
        civilization: non_empty(me.civilization.as_deref()),
        opening: non_empty(me.opening.as_deref()),
        opponent_opening: opponent.and_then(|p| non_empty(p.opening.as_deref())),
        techs: techs_by_age(me, &my_age_ups),
        market: market_samples(me, &my_age_ups),
        eapm: me.eapm,
        prefer_random: me.prefer_random,
        wheelbarrow: completion_time(me, WHEELBARROW),
        hand_cart: completion_time(me, HAND_CART),
        my_age_ups,
        opponent_age_ups,
        attribution,
    }
}

/// Age-up times in seconds. Imperial falls back to the queued
/// "Imperial Age" research when the uptime list lacks it.
pub fn age_ups(player: &PlayerAnalysis) -> PerAge<Option<u32>> {
    let mut ages: PerAge<Option<u32>> = PerAge::default();

    for uptime in &player.uptimes {
        let Some(age) = Age::from_key(&uptime.age) else {
            continue;
        };
        let slot = ages.get_mut(age);
        if slot.is_none() {
            *slot = uptime.timestamp.as_deref().and_then(parse_clock);
        }
    }

    if ages.imperial.is_none() {
        ages.imperial = player
            .queue
            .iter()
            .filter(|item| Age::from_advance_name(&item.unit) == Some(Age::Imperial))
            .find_map(|item| item.timestamp.as_deref().and_then(parse_clock));
    }

    ages
}

/// Completions strictly inside each reached age's window, in queue order.
/// Age advances themselves are left out.
pub fn techs_by_age(
    player: &PlayerAnalysis,
    age_ups: &PerAge<Option<u32>>,
) -> PerAge<Option<Vec<TechCompletion>>> {
    PerAge::from_fn(|age| {
        let start = (*age_ups.get(age))?;
        let end = age_ups.next_recorded_after(age);

        let completions = player
            .queue
            .iter()
            .filter(|item| !item.unit.trim().is_empty())
            .filter(|item| Age::from_advance_name(&item.unit).is_none())
            .filter_map(|item| {
                let time = item.timestamp.as_deref().and_then(parse_clock)?;
                let inside = time > start && end.map_or(true, |end| time < end);
                inside.then(|| TechCompletion {
                    name: item.unit.trim().to_string(),
                    abs_time: time,
                    rel_time: time - start,
                })
            })
            .collect();
        Some(completions)
    })
}

/// Market transactions attributed to the age interval containing them.
pub fn market_samples(player: &PlayerAnalysis, age_ups: &PerAge<Option<u32>>) -> Vec<MarketSample> {
    player
        .market
        .iter()
        .filter_map(|tx| {
            let action = MarketAction::parse(&tx.kind)?;
            let resource = tx.resource.trim();
            if resource.is_empty() {
                return None;
            }
            let amount = tx.amount.filter(|a| a.is_finite())?;
            let time = tx.timestamp.as_deref().and_then(parse_clock)?;
            let age = age_ups.age_containing(time)?;
            Some(MarketSample {
                age,
                action,
                resource: resource.to_lowercase(),
                amount,
            })
        })
        .collect()
}

/// Absolute completion time of the first queued item with this name.
fn completion_time(player: &PlayerAnalysis, name: &str) -> Option<u32> {
    player
        .queue
        .iter()
        .filter(|item| item.unit.trim().eq_ignore_ascii_case(name))
        .find_map(|item| item.timestamp.as_deref().and_then(parse_clock))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
