//! Upstream statistics services.
//!
//! The pipeline talks to upstream only through [`StatsSource`], so a run
//! can be driven by the live HTTP client or by a scripted in-memory source.

mod companion;
#[cfg(test)]
pub mod memory;

pub use companion::*;

use async_trait::async_trait;
use serde::Deserialize;

use crate::fetch::FetchError;
use crate::models::AnalysisPayload;

/// One page request against the match-history endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub player_id: i64,
    pub leaderboard: String,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

/// Match-history page body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchesPage {
    #[serde(default)]
    pub matches: Vec<UpstreamMatch>,
}

/// A match as returned by the match-history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamMatch {
    /// Rows without an id are skipped by the lister
    #[serde(default)]
    pub match_id: Option<i64>,

    #[serde(default)]
    pub map_name: Option<String>,

    #[serde(default)]
    pub teams: Vec<UpstreamTeam>,

    #[serde(default)]
    pub started: Option<String>,

    #[serde(default)]
    pub finished: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamTeam {
    #[serde(default)]
    pub players: Vec<UpstreamPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPlayer {
    #[serde(default)]
    pub profile_id: Option<i64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub civ_name: Option<String>,

    #[serde(default)]
    pub won: Option<bool>,
}

/// Profile body from the profile service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub leaderboards: Vec<ProfileLeaderboard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileLeaderboard {
    #[serde(default)]
    pub rating: Option<i64>,
}

impl ProfileResponse {
    /// Rating on the first listed leaderboard.
    pub fn rating(&self) -> Option<i64> {
        self.leaderboards.first().and_then(|l| l.rating)
    }
}

/// Source of match listings, match analyses and ratings.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Source identifier for logging.
    fn name(&self) -> &'static str;

    /// Fetch one page of a player's match history.
    async fn fetch_match_page(&self, query: &PageQuery) -> Result<Vec<UpstreamMatch>, FetchError>;

    /// Fetch the detailed analysis of one match.
    async fn fetch_analysis(&self, match_id: i64) -> Result<AnalysisPayload, FetchError>;

    /// Fetch a player's profile.
    async fn fetch_profile(&self, player_id: i64) -> Result<ProfileResponse, FetchError>;
}
