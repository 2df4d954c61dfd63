//! Last.fm `user.getrecenttracks` client.

use super::{NowPlaying, NowPlayingSource};
use anyhow::Context;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct LastfmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    username: String,
}

impl LastfmClient {
    const DEFAULT_BASE_URL: &'static str = "https://ws.audioscrobbler.com/2.0/";

    pub fn new(api_key: &str, username: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            username: username.to_string(),
        })
    }

    /// Most recent scrobble, if it is marked as playing right now.
    pub async fn recent_track(&self) -> anyhow::Result<Option<NowPlaying>> {
        let url = format!(
            "{}?method=user.getrecenttracks&user={}&api_key={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.api_key)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Last.fm API error: {status}");
        }
        let v: Value = response.json().await.context("decode Last.fm response")?;
        parse_recent_tracks(&v)
    }
}

impl NowPlayingSource for LastfmClient {
    async fn now_playing(&self) -> anyhow::Result<Option<NowPlaying>> {
        self.recent_track().await
    }
}

pub fn parse_recent_tracks(v: &Value) -> anyhow::Result<Option<NowPlaying>> {
    if v.get("error").is_some() {
        let message = v
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("Last.fm API error: {message}");
    }

    // A single track comes back as an object instead of a one-element array.
    let track = match v.pointer("/recenttracks/track") {
        Some(Value::Array(items)) => items.first(),
        Some(obj @ Value::Object(_)) => Some(obj),
        _ => None,
    };
    let Some(track) = track else {
        return Ok(None);
    };

    let playing = track
        .pointer("/@attr/nowplaying")
        .and_then(|x| x.as_str())
        == Some("true");
    if !playing {
        return Ok(None);
    }

    let name = track.get("name").and_then(|x| x.as_str()).unwrap_or("").trim();
    let artist = track
        .pointer("/artist/#text")
        .or_else(|| track.pointer("/artist/name"))
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .trim();
    if name.is_empty() || artist.is_empty() {
        return Ok(None);
    }
    Ok(Some(NowPlaying {
        artist: artist.to_string(),
        track: name.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_now_playing() {
        let v = json!({"recenttracks": {"track": [
            {"name": "Bohemian Rhapsody - Remastered 2011", "artist": {"#text": "Queen"},
             "@attr": {"nowplaying": "true"}},
            {"name": "Older", "artist": {"#text": "Queen"}}
        ]}});
        assert_eq!(
            parse_recent_tracks(&v).unwrap(),
            Some(NowPlaying {
                artist: "Queen".into(),
                track: "Bohemian Rhapsody - Remastered 2011".into(),
            })
        );
    }

    #[test]
    fn test_parse_not_playing() {
        let old = json!({"name": "Old", "artist": {"#text": "Queen"}});
        let v = json!({"recenttracks": {"track": [old.clone()]}});
        assert_eq!(parse_recent_tracks(&v).unwrap(), None);

        let single = json!({"recenttracks": {"track": old}});
        assert_eq!(parse_recent_tracks(&single).unwrap(), None);

        let empty = json!({"recenttracks": {"track": []}});
        assert_eq!(parse_recent_tracks(&empty).unwrap(), None);
    }

    #[test]
    fn test_parse_api_error() {
        let v = json!({"error": 6, "message": "User not found"});
        let err = parse_recent_tracks(&v).unwrap_err();
        assert!(err.to_string().contains("User not found"));
    }
}
