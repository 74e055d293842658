//! Match Lister: forward pagination over a player's match history.

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{parse_upstream_timestamp, MatchSummary};
use crate::retry::CancelSignal;
use crate::upstream::{PageQuery, StatsSource, UpstreamMatch, UpstreamPlayer};

/// What to list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub player_id: i64,
    pub leaderboard: String,
    pub per_page: u32,
    /// Page budget when no civilization filter is active
    pub pages: u32,
    /// Keep only matches where the player used this civilization
    pub played_civ: Option<String>,
    /// Keep only matches where the opponent used this civilization
    pub opponent_civ: Option<String>,
}

impl ListRequest {
    /// A civilization filter switches pagination to search mode.
    pub fn is_search(&self) -> bool {
        self.played_civ.is_some() || self.opponent_civ.is_some()
    }

    fn keeps(&self, summary: &MatchSummary) -> bool {
        civ_matches(self.played_civ.as_deref(), summary.player_civ.as_deref())
            && civ_matches(self.opponent_civ.as_deref(), summary.opponent_civ.as_deref())
    }
}

/// Bounds applied in search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListerLimits {
    pub max_search_pages: u32,
    /// Search stops once this many matches passed the filter
    pub civ_target_matches: usize,
}

impl Default for ListerLimits {
    fn default() -> Self {
        Self {
            max_search_pages: 10,
            civ_target_matches: 5,
        }
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Requested page budget consumed
    PageBudget,
    /// Search-mode page bound reached
    SearchBound,
    /// Upstream returned fewer rows than requested
    ShortPage,
    /// Enough filtered matches collected
    EnoughMatches,
    /// A page request failed; earlier pages are kept
    UpstreamError,
    Cancelled,
}

/// Result of one listing pass.
#[derive(Debug, Clone)]
pub struct Listing {
    pub matches: Vec<MatchSummary>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Paginates the match-history endpoint.
pub struct MatchLister<'a> {
    source: &'a dyn StatsSource,
    limits: ListerLimits,
}

impl<'a> MatchLister<'a> {
    pub fn new(source: &'a dyn StatsSource, limits: ListerLimits) -> Self {
        Self { source, limits }
    }

    /// List matches page by page until a stop condition fires.
    ///
    /// Never fails: an upstream error ends pagination and whatever was
    /// collected so far is returned.
    pub async fn list(&self, request: &ListRequest, cancel: &CancelSignal) -> Listing {
        let search = request.is_search();
        let page_bound = if search {
            self.limits.max_search_pages
        } else {
            request.pages
        }
        .max(1);
        let per_page = request.per_page.max(1);

        let mut matches = Vec::new();
        let mut page = 1;

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let query = PageQuery {
                player_id: request.player_id,
                leaderboard: request.leaderboard.clone(),
                page,
                per_page,
            };

            let fetched = tokio::select! {
                fetched = self.source.fetch_match_page(&query) => fetched,
                _ = cancel.cancelled() => break StopReason::Cancelled,
            };
            let rows = match fetched {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(
                        "Match listing failed on page {} for player {}: {}",
                        page, request.player_id, e
                    );
                    break StopReason::UpstreamError;
                }
            };

            let row_count = rows.len();
            let mut kept = 0;
            for row in &rows {
                let Some(summary) = summarize_match(row, request.player_id) else {
                    warn!(
                        "Page {}: skipping a row without a match id (map {:?})",
                        page, row.map_name
                    );
                    continue;
                };
                if request.keeps(&summary) {
                    matches.push(summary);
                    kept += 1;
                }
            }
            info!(
                "Page {}: {} rows, {} kept ({} total)",
                page,
                row_count,
                kept,
                matches.len()
            );

            if search && matches.len() >= self.limits.civ_target_matches {
                break StopReason::EnoughMatches;
            }
            if row_count < per_page as usize {
                break StopReason::ShortPage;
            }
            if page >= page_bound {
                break if search {
                    StopReason::SearchBound
                } else {
                    StopReason::PageBudget
                };
            }
            page += 1;
        };

        let pages_fetched = match stop {
            StopReason::Cancelled | StopReason::UpstreamError => page - 1,
            _ => page,
        };

        Listing {
            matches,
            pages_fetched,
            stop,
        }
    }
}

/// Project an upstream match onto the requested player's side.
///
/// The player's team is the one whose roster carries their profile id;
/// when none does, the second team is assumed. The other team's first
/// player is the opponent. Rows without a match id yield `None`.
pub fn summarize_match(row: &UpstreamMatch, player_id: i64) -> Option<MatchSummary> {
    let match_id = row.match_id?;
    let my_team = row
        .teams
        .iter()
        .position(|team| {
            team.players
                .iter()
                .any(|p| p.profile_id == Some(player_id))
        })
        .unwrap_or(if row.teams.len() > 1 { 1 } else { 0 });
    let opponent_team = if my_team == 0 { 1 } else { 0 };

    let me: Option<&UpstreamPlayer> = row.teams.get(my_team).and_then(|team| {
        team.players
            .iter()
            .find(|p| p.profile_id == Some(player_id))
            .or_else(|| team.players.first())
    });
    let opponent = row
        .teams
        .get(opponent_team)
        .and_then(|team| team.players.first());

    let finished = row.finished.as_deref().and_then(|raw| {
        let parsed = parse_upstream_timestamp(raw);
        if parsed.is_none() {
            warn!(
                "Match {}: unreadable finish time {:?}, treating as ongoing",
                match_id, raw
            );
        }
        parsed
    });

    Some(MatchSummary {
        match_id,
        map_name: row.map_name.clone().filter(|m| !m.trim().is_empty()),
        player_name: me.and_then(|p| p.name.clone()),
        player_civ: me.and_then(|p| p.civ_name.clone()),
        opponent_civ: opponent.and_then(|p| p.civ_name.clone()),
        won: me.and_then(|p| p.won).unwrap_or(false),
        started: row.started.as_deref().and_then(parse_upstream_timestamp),
        finished,
    })
}

fn civ_matches(filter: Option<&str>, civ: Option<&str>) -> bool {
    match (filter, civ) {
        (None, _) => true,
        (Some(wanted), Some(civ)) => wanted.trim().to_lowercase() == civ.trim().to_lowercase(),
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::cancel_pair;
    use crate::upstream::memory::{listed_match, InMemorySource, Scripted};
    use crate::fetch::FetchError;
    use crate::models::AnalysisPayload;
    use crate::upstream::{ProfileResponse, UpstreamTeam};
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowSource;

    #[async_trait]
    impl StatsSource for SlowSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch_match_page(&self, _query: &PageQuery) -> Result<Vec<UpstreamMatch>, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn fetch_analysis(&self, match_id: i64) -> Result<AnalysisPayload, FetchError> {
            Err(FetchError::NotFound(match_id.to_string()))
        }

        async fn fetch_profile(&self, player_id: i64) -> Result<ProfileResponse, FetchError> {
            Err(FetchError::NotFound(player_id.to_string()))
        }
    }

    const PLAYER: i64 = 8621659;

    fn request(pages: u32, per_page: u32) -> ListRequest {
        ListRequest {
            player_id: PLAYER,
            leaderboard: "rm_1v1".to_string(),
            per_page,
            pages,
            played_civ: None,
            opponent_civ: None,
        }
    }

    fn page(first_id: i64, civs: &[&str]) -> Scripted<Vec<UpstreamMatch>> {
        Scripted::Ok(
            civs.iter()
                .enumerate()
                .map(|(i, civ)| listed_match(first_id + i as i64, PLAYER, civ, "Arabia", true))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_page_budget() {
        let source = InMemorySource::new()
            .with_page(page(1, &["Franks", "Franks"]))
            .with_page(page(3, &["Franks", "Franks"]))
            .with_page(page(5, &["Franks", "Franks"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let listing = lister.list(&request(2, 2), &CancelSignal::never()).await;

        assert_eq!(listing.stop, StopReason::PageBudget);
        assert_eq!(listing.pages_fetched, 2);
        assert_eq!(listing.matches.len(), 4);
        assert_eq!(source.page_requests().len(), 2);
        assert_eq!(source.page_requests()[1].page, 2);
    }

    #[tokio::test]
    async fn test_short_page_stops() {
        let source = InMemorySource::new()
            .with_page(page(1, &["Franks", "Franks"]))
            .with_page(page(3, &["Franks"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let listing = lister.list(&request(5, 2), &CancelSignal::never()).await;

        assert_eq!(listing.stop, StopReason::ShortPage);
        assert_eq!(listing.pages_fetched, 2);
        assert_eq!(listing.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_civ_search_stops_after_enough_matches() {
        // 2 + 1 + 2 Mongols matches: the fifth arrives on page 3.
        let source = InMemorySource::new()
            .with_page(page(1, &["Mongols", "Franks", "Mongols", "Britons"]))
            .with_page(page(5, &["Franks", "Mongols", "Franks", "Franks"]))
            .with_page(page(9, &["Mongols", "Mongols", "Aztecs", "Franks"]))
            .with_page(page(13, &["Mongols", "Mongols", "Mongols", "Mongols"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let mut req = request(1, 4);
        req.played_civ = Some("mongols".to_string());
        let listing = lister.list(&req, &CancelSignal::never()).await;

        assert_eq!(listing.stop, StopReason::EnoughMatches);
        assert_eq!(listing.pages_fetched, 3);
        assert_eq!(source.page_requests().len(), 3);
        let ids: Vec<i64> = listing.matches.iter().map(|m| m.match_id).collect();
        assert_eq!(ids, vec![1, 3, 6, 9, 10]);
    }

    #[tokio::test]
    async fn test_civ_search_bound() {
        let mut source = InMemorySource::new();
        for i in 0..12 {
            source = source.with_page(page(i * 2 + 1, &["Franks", "Franks"]));
        }
        let lister = MatchLister::new(
            &source,
            ListerLimits {
                max_search_pages: 10,
                civ_target_matches: 5,
            },
        );

        let mut req = request(1, 2);
        req.played_civ = Some("Mongols".to_string());
        let listing = lister.list(&req, &CancelSignal::never()).await;

        assert_eq!(listing.stop, StopReason::SearchBound);
        assert_eq!(listing.pages_fetched, 10);
        assert!(listing.matches.is_empty());
    }

    #[tokio::test]
    async fn test_opponent_civ_filter() {
        // The rival in every scripted match plays Franks.
        let source = InMemorySource::new().with_page(page(1, &["Mongols", "Britons"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let mut req = request(1, 10);
        req.opponent_civ = Some(" FRANKS ".to_string());
        let listing = lister.list(&req, &CancelSignal::never()).await;
        assert_eq!(listing.matches.len(), 2);

        req.opponent_civ = Some("Aztecs".to_string());
        let listing = lister.list(&req, &CancelSignal::never()).await;
        assert!(listing.matches.is_empty());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_results() {
        let source = InMemorySource::new()
            .with_page(page(1, &["Franks", "Franks"]))
            .with_page(Scripted::Fail(503))
            .with_page(page(5, &["Franks", "Franks"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let listing = lister.list(&request(3, 2), &CancelSignal::never()).await;

        assert_eq!(listing.stop, StopReason::UpstreamError);
        assert_eq!(listing.pages_fetched, 1);
        assert_eq!(listing.matches.len(), 2);
        // The failed page is not retried.
        assert_eq!(source.page_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let source = InMemorySource::new().with_page(page(1, &["Franks"]));
        let lister = MatchLister::new(&source, ListerLimits::default());
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let listing = lister.list(&request(1, 10), &signal).await;

        assert_eq!(listing.stop, StopReason::Cancelled);
        assert_eq!(listing.pages_fetched, 0);
        assert!(source.page_requests().is_empty());
    }

    #[tokio::test]
    async fn test_row_without_id_is_skipped_but_counted() {
        let mut rows = match page(1, &["Franks", "Franks"]) {
            Scripted::Ok(rows) => rows,
            _ => unreachable!(),
        };
        rows[1].match_id = None;
        let source = InMemorySource::new()
            .with_page(Scripted::Ok(rows))
            .with_page(page(3, &["Franks", "Franks"]));
        let lister = MatchLister::new(&source, ListerLimits::default());

        let listing = lister.list(&request(2, 2), &CancelSignal::never()).await;

        // The bad row still fills the page, so pagination continues.
        assert_eq!(listing.stop, StopReason::PageBudget);
        assert_eq!(listing.pages_fetched, 2);
        let ids: Vec<i64> = listing.matches.iter().map(|m| m.match_id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_page_in_flight() {
        let (handle, signal) = cancel_pair();
        let source = SlowSource;
        let lister = MatchLister::new(&source, ListerLimits::default());

        let cancel_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let listing = tokio::time::timeout(Duration::from_secs(5), lister.list(&request(1, 10), &signal))
            .await
            .expect("cancellation should interrupt the page request");

        cancel_task.await.unwrap();
        assert_eq!(listing.stop, StopReason::Cancelled);
        assert_eq!(listing.pages_fetched, 0);
    }

    #[test]
    fn test_summarize_player_on_first_team() {
        let mut row = listed_match(7, PLAYER, "Mongols", "Arena", true);
        row.teams.swap(0, 1);

        let summary = summarize_match(&row, PLAYER).unwrap();
        assert_eq!(summary.player_civ.as_deref(), Some("Mongols"));
        assert_eq!(summary.opponent_civ.as_deref(), Some("Franks"));
        assert!(summary.won);
        assert!(summary.is_finished());
    }

    #[test]
    fn test_summarize_unknown_player_defaults_to_second_team() {
        let row = listed_match(7, 1234, "Mongols", "Arena", false);

        let summary = summarize_match(&row, PLAYER).unwrap();
        assert_eq!(summary.player_civ.as_deref(), Some("Mongols"));
        assert_eq!(summary.opponent_civ.as_deref(), Some("Franks"));
        assert!(!summary.won);
    }

    #[test]
    fn test_summarize_ongoing_and_sparse() {
        let mut row = listed_match(7, PLAYER, "Mongols", "", true);
        row.finished = None;
        let summary = summarize_match(&row, PLAYER).unwrap();
        assert!(!summary.is_finished());
        assert_eq!(summary.map_name, None);

        let empty = UpstreamMatch {
            match_id: Some(8),
            teams: vec![UpstreamTeam::default()],
            ..Default::default()
        };
        let summary = summarize_match(&empty, PLAYER).unwrap();
        assert_eq!(summary.player_civ, None);
        assert_eq!(summary.opponent_civ, None);
        assert!(!summary.won);
    }
}
