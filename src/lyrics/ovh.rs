//! lyrics.ovh: plain lyrics only, last in the chain.

use super::lrclib::LyricsRecord;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct OvhResponse {
    #[serde(default)]
    lyrics: String,
}

#[derive(Debug, Clone)]
pub struct OvhClient {
    client: reqwest::Client,
    base_url: String,
}

impl OvhClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.lyrics.ovh";

    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get(&self, artist: &str, track: &str) -> anyhow::Result<Option<LyricsRecord>> {
        let url = format!(
            "{}/v1/{}/{}",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(track)
        );

        let response = self.client.get(&url).send().await.context("send lyrics.ovh request")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("lyrics.ovh error: {}", response.status());
        }
        let body: OvhResponse = response.json().await.context("decode lyrics.ovh body")?;
        if body.lyrics.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(LyricsRecord::plain(artist, track, body.lyrics)))
    }
}
