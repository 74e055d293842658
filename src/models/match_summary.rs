//! A match as listed by the match-history service.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One listed match, seen from the requested player's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Upstream match id
    pub match_id: i64,

    /// Map name, when the listing carries one
    pub map_name: Option<String>,

    /// Player display name
    pub player_name: Option<String>,

    /// Civilization the player used
    pub player_civ: Option<String>,

    /// Civilization of the opposing team's first player
    pub opponent_civ: Option<String>,

    /// Whether the player won
    pub won: bool,

    pub started: Option<DateTime<Utc>>,

    /// `None` while the match is still being played
    pub finished: Option<DateTime<Utc>>,
}

impl MatchSummary {
    /// A match without a finish time is ongoing and must not be aggregated.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// Parse an upstream timestamp (RFC 3339, or naive ISO 8601 taken as UTC).
pub fn parse_upstream_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}
