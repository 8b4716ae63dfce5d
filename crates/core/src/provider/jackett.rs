//! Jackett provider adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::JackettConfig;

use super::release::{parse_episode_span, parse_quality, parse_year, EpisodeSpan};
use super::{Provider, ProviderError, SearchOptions, SearchResult};

/// Jackett category id for TV.
const TV_CATEGORY: u32 = 5000;

/// Queries one Jackett indexer (or "all") through the JSON results API.
pub struct JackettProvider {
    name: String,
    client: Client,
    config: JackettConfig,
}

impl JackettProvider {
    pub fn new(name: impl Into<String>, config: JackettConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            client,
            config,
        })
    }

    fn build_search_url(&self, query: &str, options: &SearchOptions) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(query)
        );

        if options.season.is_some() {
            url.push_str(&format!("&Category[]={}", TV_CATEGORY));
        }

        url
    }
}

#[async_trait]
impl Provider for JackettProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let url = self.build_search_url(query, options);
        debug!(provider = %self.name, query = query, "Searching Jackett");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else if e.is_connect() {
                ProviderError::ConnectionFailed(e.to_string())
            } else {
                ProviderError::Api(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let jackett_response: JackettResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let results: Vec<SearchResult> = jackett_response
            .Results
            .into_iter()
            .filter_map(|r| to_search_result(&self.name, r, options.season))
            .collect();

        debug!(
            provider = %self.name,
            results = results.len(),
            "Jackett search complete"
        );

        Ok(results)
    }
}

/// Map one Jackett result; results without any link are dropped.
fn to_search_result(
    provider: &str,
    r: JackettResult,
    default_season: Option<u32>,
) -> Option<SearchResult> {
    let fetch_ref = r
        .MagnetUri
        .filter(|s| !s.is_empty())
        .or(r.Link.filter(|s| !s.is_empty()))
        .or(r.Details.filter(|s| !s.is_empty()))?;

    let seeders = r.Seeders.unwrap_or(0).max(0);
    let leechers = r.Peers.unwrap_or(0).saturating_sub(seeders).max(0);

    let mut result = SearchResult::new(r.Title.clone(), provider, fetch_ref);
    result.year = parse_year(&r.Title);
    result.quality = parse_quality(&r.Title);
    result.size_bytes = r.Size.filter(|s| *s > 0).map(|s| s as u64);
    result.seeders = Some(seeders as u32);
    result.leechers = Some(leechers as u32);
    result.poster_url = r.Poster;

    match parse_episode_span(&r.Title, default_season) {
        Some(EpisodeSpan::Single { season, episode }) => {
            result.season = Some(season);
            result.episode = Some(episode);
        }
        Some(span) => result.season = Some(span.season()),
        None => {}
    }

    Some(result)
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
    Details: Option<String>,
    Poster: Option<String>,
}
