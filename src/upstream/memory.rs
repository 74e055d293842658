//! Scripted in-memory [`StatsSource`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{PageQuery, ProfileResponse, StatsSource, UpstreamMatch, UpstreamPlayer, UpstreamTeam};
use crate::fetch::FetchError;
use crate::models::AnalysisPayload;

/// A scripted upstream reply.
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Ok(T),
    NotFound,
    /// Non-success HTTP status
    Fail(u16),
}

impl<T: Clone> Scripted<T> {
    fn to_result(&self, what: &str) -> Result<T, FetchError> {
        match self {
            Scripted::Ok(value) => Ok(value.clone()),
            Scripted::NotFound => Err(FetchError::NotFound(what.to_string())),
            Scripted::Fail(status) => Err(FetchError::HttpStatus {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

/// In-memory upstream. Pages past the script are empty; analysis replies
/// are consumed in order per match and the last one repeats.
#[derive(Default)]
pub struct InMemorySource {
    pages: Vec<Scripted<Vec<UpstreamMatch>>>,
    analyses: HashMap<i64, Vec<Scripted<AnalysisPayload>>>,
    profile: Option<Scripted<ProfileResponse>>,
    page_requests: Mutex<Vec<PageQuery>>,
    analysis_requests: Mutex<HashMap<i64, usize>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: Scripted<Vec<UpstreamMatch>>) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_analysis(mut self, match_id: i64, replies: Vec<Scripted<AnalysisPayload>>) -> Self {
        self.analyses.insert(match_id, replies);
        self
    }

    pub fn with_profile(mut self, profile: Scripted<ProfileResponse>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Pages requested so far, in order.
    pub fn page_requests(&self) -> Vec<PageQuery> {
        self.page_requests.lock().unwrap().clone()
    }

    /// Number of analysis requests made for one match.
    pub fn analysis_requests(&self, match_id: i64) -> usize {
        self.analysis_requests
            .lock()
            .unwrap()
            .get(&match_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl StatsSource for InMemorySource {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    async fn fetch_match_page(&self, query: &PageQuery) -> Result<Vec<UpstreamMatch>, FetchError> {
        self.page_requests.lock().unwrap().push(query.clone());
        match self.pages.get(query.page as usize - 1) {
            Some(page) => page.to_result("page"),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_analysis(&self, match_id: i64) -> Result<AnalysisPayload, FetchError> {
        let attempt = {
            let mut requests = self.analysis_requests.lock().unwrap();
            let count = requests.entry(match_id).or_insert(0);
            *count += 1;
            *count
        };

        match self.analyses.get(&match_id) {
            Some(replies) if !replies.is_empty() => {
                let index = (attempt - 1).min(replies.len() - 1);
                replies[index].to_result("analysis")
            }
            _ => Err(FetchError::NotFound(format!("analysis {}", match_id))),
        }
    }

    async fn fetch_profile(&self, _player_id: i64) -> Result<ProfileResponse, FetchError> {
        match &self.profile {
            Some(profile) => profile.to_result("profile"),
            None => Err(FetchError::NotFound("profile".to_string())),
        }
    }
}

/// A finished 1v1 listing entry between `player_id` and profile 999.
pub fn listed_match(match_id: i64, player_id: i64, civ: &str, map: &str, won: bool) -> UpstreamMatch {
    UpstreamMatch {
        match_id: Some(match_id),
        map_name: Some(map.to_string()),
        teams: vec![
            UpstreamTeam {
                players: vec![UpstreamPlayer {
                    profile_id: Some(999),
                    name: Some("Rival".to_string()),
                    civ_name: Some("Franks".to_string()),
                    won: Some(!won),
                }],
            },
            UpstreamTeam {
                players: vec![UpstreamPlayer {
                    profile_id: Some(player_id),
                    name: Some("Player".to_string()),
                    civ_name: Some(civ.to_string()),
                    won: Some(won),
                }],
            },
        ],
        started: Some("2025-07-27T18:00:00.000Z".to_string()),
        finished: Some("2025-07-27T18:30:00.000Z".to_string()),
    }
}
