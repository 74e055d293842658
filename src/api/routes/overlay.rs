use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::pipeline::{NoMatches, PipelineOutcome, PlayerReport, StatsRequest};
use crate::retry::CancelSignal;

#[derive(Debug, Default, Deserialize)]
pub struct OverlayParams {
    #[serde(rename = "matchId")]
    pub match_id: Option<String>,
    #[serde(rename = "rivalProfileId")]
    pub rival_profile_id: Option<String>,
    pub played_civilization: Option<String>,
    pub opponent_civ: Option<String>,
    pub leaderboard: Option<String>,
    pub pages: Option<u32>,
    pub per_page: Option<u32>,
    /// `true`/`false`, `1`/`0` or `yes`/`no`
    pub ongoing: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OverlayResponse {
    /// Player who requested the overlay
    pub player_id: i64,
    pub match_id: Option<i64>,
    /// Player the statistics describe
    pub rival_profile_id: Option<i64>,
    pub no_matches: Option<NoMatches>,
    pub message: Option<String>,
    pub report: PlayerReport,
}

pub async fn overlay(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    params: Result<Query<OverlayParams>, QueryRejection>,
) -> Result<Json<OverlayResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let ongoing = parse_flag("ongoing", params.ongoing.as_deref())?;
    let player_id = parse_id("player id", Some(&player_id))?
        .ok_or_else(|| ApiError::BadRequest("player id is required".to_string()))?;
    let match_id = parse_id("matchId", params.match_id.as_deref())?;
    let rival_profile_id = parse_id("rivalProfileId", params.rival_profile_id.as_deref())?;

    let settings = state.pipeline.settings();
    let leaderboard = params
        .leaderboard
        .clone()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| settings.leaderboard.clone());

    let (Some(match_id), Some(rival_id)) = (match_id, rival_profile_id) else {
        return Ok(Json(OverlayResponse {
            player_id,
            match_id,
            rival_profile_id,
            no_matches: None,
            message: None,
            report: PlayerReport::empty(rival_profile_id.unwrap_or(player_id), &leaderboard),
        }));
    };

    info!(
        "Overlay for player {}: match {} against {}",
        player_id, match_id, rival_id
    );

    let request = StatsRequest {
        player_id: rival_id,
        leaderboard: Some(leaderboard.clone()),
        per_page: params.per_page,
        pages: params.pages,
        played_civ: params.played_civilization,
        opponent_civ: params.opponent_civ,
        ongoing,
    };

    let outcome = state
        .pipeline
        .run(&request, &CancelSignal::never())
        .await?;

    let response = match outcome {
        PipelineOutcome::Report(report) => OverlayResponse {
            player_id,
            match_id: Some(match_id),
            rival_profile_id: Some(rival_id),
            no_matches: None,
            message: None,
            report: *report,
        },
        PipelineOutcome::NoMatches(none) => OverlayResponse {
            player_id,
            match_id: Some(match_id),
            rival_profile_id: Some(rival_id),
            message: Some(none.message()),
            no_matches: Some(none),
            report: PlayerReport::empty(rival_id, &leaderboard),
        },
    };

    Ok(Json(response))
}

/// Blank counts as absent; anything else must be an integer.
fn parse_id(name: &str, raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be an integer, got {:?}", name, s))),
    }
}

/// Absent or blank is `false`.
fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ApiError::BadRequest(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
