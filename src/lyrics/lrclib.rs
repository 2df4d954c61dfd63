//! LRCLIB API client
//!
//! LRCLIB is a free lyrics API that provides synchronized (LRC format) lyrics.
//! API Documentation: https://lrclib.net/docs

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LyricsRecord {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub duration: Option<f64>,
    pub instrumental: bool,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

impl LyricsRecord {
    /// Plain text from a provider that has no timing.
    pub fn plain(artist: &str, track: &str, lyrics: String) -> Self {
        Self {
            track_name: track.to_string(),
            artist_name: artist.to_string(),
            plain_lyrics: Some(lyrics),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";

    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exact match on track, artist and, when known, album and duration.
    pub async fn get_exact(
        &self,
        track_name: &str,
        artist_name: &str,
        album_name: Option<&str>,
        duration_secs: Option<u32>,
    ) -> anyhow::Result<Option<LyricsRecord>> {
        let mut url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );
        if let Some(album) = album_name {
            url.push_str(&format!("&album_name={}", urlencoding::encode(album)));
        }
        if let Some(duration) = duration_secs {
            url.push_str(&format!("&duration={duration}"));
        }

        let response = self.client.get(&url).send().await.context("send LRCLIB get")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("LRCLIB API error: {}", response.status());
        }
        let record = response.json().await.context("decode LRCLIB record")?;
        Ok(Some(record))
    }

    /// Free-text search; the first hit with synced lyrics, else the first hit.
    pub async fn search(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LyricsRecord>> {
        let query = format!("{track_name} {artist_name}");
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(&query));

        let response = self.client.get(&url).send().await.context("send LRCLIB search")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("LRCLIB search error: {}", response.status());
        }
        let mut results: Vec<LyricsRecord> =
            response.json().await.context("decode LRCLIB search")?;

        let best = results
            .iter()
            .position(|r| r.synced_lyrics.as_deref().is_some_and(|s| !s.is_empty()))
            .unwrap_or(0);
        if best < results.len() {
            Ok(Some(results.swap_remove(best)))
        } else {
            Ok(None)
        }
    }
}
