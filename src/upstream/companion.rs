//! HTTP client for the public match-history / analysis / profile API.
//!
//! All endpoint specifics live here so URL changes are easy to fix.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{MatchesPage, PageQuery, ProfileResponse, StatsSource, UpstreamMatch};
use crate::fetch::{FetchError, Fetcher};
use crate::models::AnalysisPayload;

/// Default API base.
pub const DEFAULT_API_BASE: &str = "https://data.aoe2companion.com/api";

/// Live upstream client.
pub struct CompanionClient {
    fetcher: Fetcher,
    api_base: String,
    language: String,
}

impl CompanionClient {
    /// Create a new client. A trailing slash on `api_base` is ignored.
    pub fn new(fetcher: Fetcher, api_base: &str, language: &str) -> Self {
        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let url_str = format!("{}/{}", self.api_base, path);
        Url::parse(&url_str).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url_str, e)))
    }

    /// Match-history page URL.
    pub fn matches_url(&self, query: &PageQuery) -> Result<Url, FetchError> {
        let mut url = self.endpoint("matches")?;
        url.query_pairs_mut()
            .append_pair("direction", "forward")
            .append_pair("profile_ids", &query.player_id.to_string())
            .append_pair("leaderboard_ids", &query.leaderboard)
            .append_pair("page", &query.page.to_string())
            .append_pair("per_page", &query.per_page.to_string());
        Ok(url)
    }

    /// Match-analysis URL.
    pub fn analysis_url(&self, match_id: i64) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&format!("matches/{}/analysis", match_id))?;
        url.query_pairs_mut().append_pair("language", &self.language);
        Ok(url)
    }

    /// Profile URL.
    pub fn profile_url(&self, player_id: i64) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&format!("profiles/{}", player_id))?;
        url.query_pairs_mut().append_pair("page", "1");
        Ok(url)
    }
}

#[async_trait]
impl StatsSource for CompanionClient {
    fn name(&self) -> &'static str {
        "companion"
    }

    async fn fetch_match_page(&self, query: &PageQuery) -> Result<Vec<UpstreamMatch>, FetchError> {
        let url = self.matches_url(query)?;
        let page: MatchesPage = self.fetcher.get_json(&url).await?;
        debug!("{} matches on page {}", page.matches.len(), query.page);
        Ok(page.matches)
    }

    async fn fetch_analysis(&self, match_id: i64) -> Result<AnalysisPayload, FetchError> {
        let url = self.analysis_url(match_id)?;
        self.fetcher.get_json(&url).await
    }

    async fn fetch_profile(&self, player_id: i64) -> Result<ProfileResponse, FetchError> {
        let url = self.profile_url(player_id)?;
        self.fetcher.get_json(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CompanionClient {
        CompanionClient::new(Fetcher::with_defaults().unwrap(), "https://example.com/api/", "es")
    }

    #[test]
    fn test_matches_url() {
        let url = client()
            .matches_url(&PageQuery {
                player_id: 8621659,
                leaderboard: "rm_1v1".to_string(),
                page: 2,
                per_page: 10,
            })
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://example.com/api/matches?direction=forward&profile_ids=8621659&leaderboard_ids=rm_1v1&page=2&per_page=10"
        );
    }

    #[test]
    fn test_analysis_url() {
        let url = client().analysis_url(381234567).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/api/matches/381234567/analysis?language=es"
        );
    }

    #[test]
    fn test_profile_url() {
        let url = client().profile_url(42).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/profiles/42?page=1");
    }

    #[test]
    fn test_invalid_base() {
        let client = CompanionClient::new(Fetcher::with_defaults().unwrap(), "not a url", "es");
        assert!(matches!(
            client.profile_url(1),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
