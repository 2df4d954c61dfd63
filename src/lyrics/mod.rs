//! Lyrics for the current track.
//!
//! Providers are tried in order: LRCLIB exact match, LRCLIB search, then
//! lyrics.ovh. A failing provider is logged and skipped.

pub mod lrclib;
pub mod ovh;
pub mod parser;

use anyhow::Context;
use lrclib::{LrclibClient, LyricsRecord};
use ovh::OvhClient;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, warn};

pub use parser::ParsedLyrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricsProvider {
    /// LRCLIB `/get`
    Strict,
    /// LRCLIB `/search`
    Fuzzy,
    Ovh,
}

impl LyricsProvider {
    pub const CHAIN: [LyricsProvider; 3] = [Self::Strict, Self::Fuzzy, Self::Ovh];
}

impl FromStr for LyricsProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "fuzzy" => Ok(Self::Fuzzy),
            "ovh" => Ok(Self::Ovh),
            other => anyhow::bail!("unknown lyrics provider {other:?}"),
        }
    }
}

/// Whatever the display should show for a record: synced lines first, plain
/// text second.
pub fn to_parsed(record: &LyricsRecord) -> Option<ParsedLyrics> {
    if record.instrumental {
        return Some(ParsedLyrics::instrumental());
    }
    if let Some(synced) = record.synced_lyrics.as_deref()
        && !synced.trim().is_empty()
    {
        return Some(ParsedLyrics::parse(synced, true));
    }
    if let Some(plain) = record.plain_lyrics.as_deref()
        && !plain.trim().is_empty()
    {
        return Some(ParsedLyrics::parse(plain, false));
    }
    None
}

/// Where the session gets lyrics from.
pub trait LyricsSource: Send + Sync + 'static {
    fn lyrics(
        &self,
        artist: &str,
        track: &str,
    ) -> impl Future<Output = Option<ParsedLyrics>> + Send;
}

/// `None` when lyrics are turned off.
impl<L: LyricsSource> LyricsSource for Option<L> {
    async fn lyrics(&self, artist: &str, track: &str) -> Option<ParsedLyrics> {
        match self {
            Some(source) => source.lyrics(artist, track).await,
            None => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LyricsClient {
    lrclib: LrclibClient,
    ovh: OvhClient,
}

impl LyricsClient {
    const USER_AGENT: &'static str = concat!("backdrop/", env!("CARGO_PKG_VERSION"));

    pub fn new(lrclib_url: &str, ovh_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            lrclib: LrclibClient::new(client.clone(), lrclib_url),
            ovh: OvhClient::new(client, ovh_url),
        })
    }

    /// First usable record from `providers`, in order.
    pub async fn find(
        &self,
        artist: &str,
        track: &str,
        providers: &[LyricsProvider],
    ) -> Option<(LyricsProvider, LyricsRecord)> {
        for &provider in providers {
            let result = match provider {
                LyricsProvider::Strict => self.lrclib.get_exact(track, artist, None, None).await,
                LyricsProvider::Fuzzy => self.lrclib.search(track, artist).await,
                LyricsProvider::Ovh => self.ovh.get(artist, track).await,
            };
            match result {
                Ok(Some(record)) => {
                    debug!("lyrics for {artist} - {track} from {provider:?}");
                    return Some((provider, record));
                }
                Ok(None) => {}
                Err(e) => warn!("lyrics provider {provider:?} failed: {e:#}"),
            }
        }
        None
    }
}

impl LyricsSource for LyricsClient {
    async fn lyrics(&self, artist: &str, track: &str) -> Option<ParsedLyrics> {
        let (_, record) = self.find(artist, track, &LyricsProvider::CHAIN).await?;
        to_parsed(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    /// Local stand-in for LRCLIB (`/api/...`) and lyrics.ovh (`/v1/...`).
    /// Exact lookups for "Known" succeed, searches for anything with "Fuzzy"
    /// in it succeed, and lyrics.ovh knows every artist except "Nobody".
    async fn mock_providers() -> LyricsClient {
        async fn exact(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
            if q.get("track_name").map(String::as_str) == Some("Known") {
                let body = json!({
                    "id": 1,
                    "trackName": "Known",
                    "artistName": "Band",
                    "instrumental": false,
                    "plainLyrics": "hello",
                    "syncedLyrics": "[00:01.00]hello"
                });
                return (StatusCode::OK, Json(body));
            }
            (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })))
        }

        async fn search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
            let hits = if q.get("q").is_some_and(|s| s.contains("Fuzzy")) {
                json!([
                    { "trackName": "Fuzzy", "plainLyrics": "plain only", "syncedLyrics": null },
                    { "trackName": "Fuzzy", "plainLyrics": "x", "syncedLyrics": "[00:02.00]x" }
                ])
            } else {
                json!([])
            };
            Json(hits)
        }

        async fn plain(
            Path((artist, _track)): Path<(String, String)>,
        ) -> (StatusCode, Json<Value>) {
            if artist == "Nobody" {
                return (StatusCode::NOT_FOUND, Json(json!({ "error": "No lyrics found" })));
            }
            (StatusCode::OK, Json(json!({ "lyrics": "line one\nline two" })))
        }

        let app = Router::new()
            .route("/api/get", get(exact))
            .route("/api/search", get(search))
            .route("/v1/{artist}/{track}", get(plain));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        LyricsClient::new(&format!("http://{addr}/api"), &format!("http://{addr}")).unwrap()
    }

    #[test]
    fn test_provider_names() {
        assert_eq!("strict".parse::<LyricsProvider>().unwrap(), LyricsProvider::Strict);
        assert_eq!(" Fuzzy ".parse::<LyricsProvider>().unwrap(), LyricsProvider::Fuzzy);
        assert_eq!("ovh".parse::<LyricsProvider>().unwrap(), LyricsProvider::Ovh);
        assert!("netease".parse::<LyricsProvider>().is_err());
    }

    #[test]
    fn test_to_parsed_prefers_synced() {
        let record = LyricsRecord {
            plain_lyrics: Some("a".into()),
            synced_lyrics: Some("[00:01.00]a".into()),
            ..Default::default()
        };
        let parsed = to_parsed(&record).unwrap();
        assert!(parsed.synced);
        assert_eq!(parsed.lines[0].time_ms, 1000);

        let blank_synced = LyricsRecord {
            plain_lyrics: Some("a".into()),
            synced_lyrics: Some("  ".into()),
            ..Default::default()
        };
        assert!(!to_parsed(&blank_synced).unwrap().synced);

        let instrumental = LyricsRecord {
            instrumental: true,
            ..Default::default()
        };
        assert!(to_parsed(&instrumental).unwrap().instrumental);
        assert_eq!(to_parsed(&LyricsRecord::default()), None);
    }

    #[tokio::test]
    async fn test_chain_stops_at_exact_match() {
        let client = mock_providers().await;
        let (provider, record) = client
            .find("Band", "Known", &LyricsProvider::CHAIN)
            .await
            .unwrap();
        assert_eq!(provider, LyricsProvider::Strict);
        assert_eq!(record.track_name, "Known");
    }

    #[tokio::test]
    async fn test_chain_falls_back_to_search_then_ovh() {
        let client = mock_providers().await;

        let (provider, record) = client
            .find("Band", "Fuzzy", &LyricsProvider::CHAIN)
            .await
            .unwrap();
        assert_eq!(provider, LyricsProvider::Fuzzy);
        assert_eq!(record.synced_lyrics.as_deref(), Some("[00:02.00]x"));

        let (provider, record) = client
            .find("Band", "Unheard", &LyricsProvider::CHAIN)
            .await
            .unwrap();
        assert_eq!(provider, LyricsProvider::Ovh);
        assert_eq!(record.plain_lyrics.as_deref(), Some("line one\nline two"));

        assert!(client.find("Nobody", "Unheard", &LyricsProvider::CHAIN).await.is_none());
    }

    #[tokio::test]
    async fn test_single_provider_and_unreachable_host() {
        let client = mock_providers().await;
        assert!(client
            .find("Band", "Fuzzy", &[LyricsProvider::Strict])
            .await
            .is_none());

        // Connection refused on every step is swallowed.
        let offline = LyricsClient::new("http://127.0.0.1:9/api", "http://127.0.0.1:9").unwrap();
        assert_eq!(offline.lyrics("Band", "Known").await, None);

        let parsed = client.lyrics("Band", "Unheard").await.unwrap();
        assert!(!parsed.synced);
        assert_eq!(parsed.lines.len(), 2);
    }
}
