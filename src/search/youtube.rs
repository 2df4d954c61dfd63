//! YouTube Data API v3 search client.
//!
//! API Documentation: https://developers.google.com/youtube/v3/docs/search/list

use super::{SearchProvider, SearchResult};
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YouTubeSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_results: u32,
}

impl YouTubeSearch {
    const DEFAULT_BASE_URL: &'static str = "https://www.googleapis.com/youtube/v3";

    pub fn new(api_key: Option<String>, max_results: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_results: max_results.clamp(1, 50),
        })
    }
}

impl SearchProvider for YouTubeSearch {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str) -> SearchResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return SearchResult::TransportError("YouTube API key missing".into());
        };

        let url = format!(
            "{}/search?part=snippet&type=video&maxResults={}&q={}&key={}",
            self.base_url,
            self.max_results,
            urlencoding::encode(query),
            urlencoding::encode(api_key)
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return SearchResult::TransportError(format!("send search request: {e}")),
        };
        if !response.status().is_success() {
            return SearchResult::TransportError(format!(
                "YouTube API error: {}",
                response.status()
            ));
        }

        match response.json::<SearchResponse>().await {
            Ok(body) => collect_video_ids(body),
            Err(e) => SearchResult::TransportError(format!("parse search json: {e}")),
        }
    }
}

/// Channels and playlists carry no `videoId` and are skipped.
fn collect_video_ids(body: SearchResponse) -> SearchResult {
    let ids = body
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .filter(|id| !id.is_empty())
        .collect();
    SearchResult::from_ids(ids)
}
