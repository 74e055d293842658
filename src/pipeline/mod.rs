//! Match-aggregation pipeline.
//!
//! One run serves one overlay request:
//! 1. Resolve civilization filters
//! 2. List matches ([`MatchLister`])
//! 3. Drop ongoing matches
//! 4. Fetch and fold analyses ([`MatchAnalyzer`])
//! 5. Finalize and attach the rating
//!
//! Nothing survives between runs.

mod analyzer;
mod lister;
mod report;

pub use analyzer::*;
pub use lister::*;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculate::{DerivedStats, StatsAccumulator, DEFAULT_MIN_CIV_PLAYS};
use crate::models::{normalize_civ_name, resolve_civ_number};
use crate::retry::{CancelSignal, Retrier};
use crate::upstream::StatsSource;

/// Errors that abort a pipeline run. Upstream trouble never does; it only
/// shrinks the result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline run cancelled")]
    Cancelled,

    #[error("pipeline run timed out after {0:?}")]
    TimedOut(Duration),
}

/// Defaults and bounds for pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub leaderboard: String,
    pub per_page: u32,
    /// Page size used while the requesting player is in a match
    pub ongoing_per_page: u32,
    pub pages: u32,
    pub limits: ListerLimits,
    pub analysis_concurrency: usize,
    pub overall_timeout: Duration,
    pub min_civ_plays: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            leaderboard: "rm_1v1".to_string(),
            per_page: 10,
            ongoing_per_page: 11,
            pages: 1,
            limits: ListerLimits::default(),
            analysis_concurrency: 1,
            overall_timeout: Duration::from_secs(30 * 60),
            min_civ_plays: DEFAULT_MIN_CIV_PLAYS,
        }
    }
}

/// One statistics request. Unset fields take the pipeline defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsRequest {
    pub player_id: i64,
    pub leaderboard: Option<String>,
    pub per_page: Option<u32>,
    pub pages: Option<u32>,
    pub played_civ: Option<String>,
    pub opponent_civ: Option<String>,
    /// Use the ongoing-match page size
    pub ongoing: bool,
}

impl StatsRequest {
    pub fn for_player(player_id: i64) -> Self {
        Self {
            player_id,
            ..Default::default()
        }
    }
}

/// Statistics for one player, ready for presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerReport {
    pub player_id: i64,
    pub leaderboard: String,
    pub rating: Option<i64>,
    pub played_civilization: Option<String>,
    pub played_civ_number: Option<u32>,
    pub opponent_civ: Option<String>,
    pub opponent_civ_number: Option<u32>,
    pub pages_fetched: u32,
    pub stop_reason: Option<StopReason>,
    /// Listed matches dropped because they had not finished
    pub ongoing_excluded: u32,
    #[serde(flatten)]
    pub stats: DerivedStats,
}

impl PlayerReport {
    /// A report with no matches behind it.
    pub fn empty(player_id: i64, leaderboard: &str) -> Self {
        Self {
            player_id,
            leaderboard: leaderboard.to_string(),
            stats: StatsAccumulator::new().finalize(DEFAULT_MIN_CIV_PLAYS),
            ..Default::default()
        }
    }
}

/// Why a run produced nothing to aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoMatches {
    /// Matches exist, but none passed the civilization filter
    ForCivilization {
        played_civ: Option<String>,
        opponent_civ: Option<String>,
    },
    /// The player has no finished matches on this leaderboard
    ForPlayer,
}

impl NoMatches {
    pub fn message(&self) -> String {
        match self {
            NoMatches::ForCivilization {
                played_civ,
                opponent_civ,
            } => {
                let mut parts = Vec::new();
                if let Some(civ) = played_civ {
                    parts.push(format!("playing {}", civ));
                }
                if let Some(civ) = opponent_civ {
                    parts.push(format!("against {}", civ));
                }
                format!("No matches found {}", parts.join(" "))
            }
            NoMatches::ForPlayer => "No finished matches found for this player".to_string(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Report(Box<PlayerReport>),
    NoMatches(NoMatches),
}

/// Runs the aggregation pipeline against a [`StatsSource`].
pub struct StatsPipeline {
    source: Arc<dyn StatsSource>,
    retrier: Retrier,
    settings: PipelineSettings,
}

impl StatsPipeline {
    pub fn new(source: Arc<dyn StatsSource>, retrier: Retrier, settings: PipelineSettings) -> Self {
        Self {
            source,
            retrier,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run once, bounded by the overall timeout and `cancel`.
    pub async fn run(
        &self,
        request: &StatsRequest,
        cancel: &CancelSignal,
    ) -> Result<PipelineOutcome, PipelineError> {
        let limit = self.settings.overall_timeout;
        match tokio::time::timeout(limit, self.run_inner(request, cancel)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Pipeline run for player {} timed out after {:?}",
                    request.player_id, limit
                );
                Err(PipelineError::TimedOut(limit))
            }
        }
    }

    async fn run_inner(
        &self,
        request: &StatsRequest,
        cancel: &CancelSignal,
    ) -> Result<PipelineOutcome, PipelineError> {
        let list_request = self.list_request(request);
        info!(
            "Collecting stats for player {} on {} via {}",
            request.player_id,
            list_request.leaderboard,
            self.source.name()
        );

        let played_civ_number = resolve_filter(list_request.played_civ.as_deref());
        let opponent_civ_number = resolve_filter(list_request.opponent_civ.as_deref());

        let lister = MatchLister::new(self.source.as_ref(), self.settings.limits);
        let listing = lister.list(&list_request, cancel).await;
        if listing.stop == StopReason::Cancelled || cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        debug!(
            "Listing stopped after {} page(s): {:?}",
            listing.pages_fetched, listing.stop
        );

        let listed = listing.matches.len();
        let finished: Vec<_> = listing
            .matches
            .into_iter()
            .filter(|m| m.is_finished())
            .collect();
        let ongoing_excluded = (listed - finished.len()) as u32;
        if ongoing_excluded > 0 {
            info!("Excluding {} ongoing match(es)", ongoing_excluded);
        }

        if finished.is_empty() {
            let outcome = if list_request.is_search() {
                NoMatches::ForCivilization {
                    played_civ: list_request.played_civ.clone(),
                    opponent_civ: list_request.opponent_civ.clone(),
                }
            } else {
                NoMatches::ForPlayer
            };
            info!("{}", outcome.message());
            return Ok(PipelineOutcome::NoMatches(outcome));
        }

        let analyzer = MatchAnalyzer::new(
            self.source.clone(),
            self.retrier.clone(),
            self.settings.analysis_concurrency,
        );
        let acc = analyzer
            .analyze(&finished, request.player_id, cancel)
            .await?;

        let rating = tokio::select! {
            rating = self.fetch_rating(request.player_id) => rating,
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        };

        Ok(PipelineOutcome::Report(Box::new(PlayerReport {
            player_id: request.player_id,
            leaderboard: list_request.leaderboard,
            rating,
            played_civilization: list_request.played_civ,
            played_civ_number,
            opponent_civ: list_request.opponent_civ,
            opponent_civ_number,
            pages_fetched: listing.pages_fetched,
            stop_reason: Some(listing.stop),
            ongoing_excluded,
            stats: acc.finalize(self.settings.min_civ_plays),
        })))
    }

    /// Current rating, or `None` on any failure.
    pub async fn fetch_rating(&self, player_id: i64) -> Option<i64> {
        match self.source.fetch_profile(player_id).await {
            Ok(profile) => profile.rating(),
            Err(e) => {
                warn!("Rating lookup failed for player {}: {}", player_id, e);
                None
            }
        }
    }

    fn list_request(&self, request: &StatsRequest) -> ListRequest {
        let default_per_page = if request.ongoing {
            self.settings.ongoing_per_page
        } else {
            self.settings.per_page
        };

        ListRequest {
            player_id: request.player_id,
            leaderboard: request
                .leaderboard
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| self.settings.leaderboard.clone()),
            per_page: request.per_page.unwrap_or(default_per_page),
            pages: request.pages.unwrap_or(self.settings.pages),
            played_civ: normalize_civ_name(request.played_civ.as_deref()),
            opponent_civ: normalize_civ_name(request.opponent_civ.as_deref()),
        }
    }
}

fn resolve_filter(civ: Option<&str>) -> Option<u32> {
    let civ = civ?;
    let number = resolve_civ_number(civ);
    if number.is_none() {
        warn!("Unknown civilization {:?}; filtering by name only", civ);
    }
    number
}
