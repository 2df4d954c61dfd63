//! Per-track video candidates: the shared search cache, the community
//! verified/failed sets and per-user preferences.

pub mod resolver;
pub mod title;

use crate::store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub use resolver::{ResolveError, Resolver};

/// Cached search value meaning "the provider had nothing for this track".
pub const NOT_FOUND_MARKER: &str = "not_found";
pub const SEARCH_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);
pub const NOT_FOUND_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Queue request sent by the player side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub artist: String,
    pub track: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub video_ids: Vec<String>,
    #[serde(default)]
    pub preferred_video_id: Option<String>,
    #[serde(default)]
    pub is_discovery_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Playback outcome for one video. A missing `status` means success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub artist: String,
    pub track: String,
    pub video_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OutcomeStatus>,
}

impl OutcomeReport {
    pub fn success(request: &QueueRequest, video_id: &str) -> Self {
        Self {
            artist: request.artist.clone(),
            track: request.track.clone(),
            video_id: video_id.to_string(),
            user_id: request.user_id.clone(),
            status: None,
        }
    }

    pub fn failure(request: &QueueRequest, video_id: &str) -> Self {
        Self {
            status: Some(OutcomeStatus::Failed),
            ..Self::success(request, video_id)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == Some(OutcomeStatus::Failed)
    }
}

pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Case-insensitive identity of an (artist, track) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    artist: String,
    track: String,
}

impl TrackKey {
    pub fn new(artist: &str, track: &str) -> Self {
        Self {
            artist: normalize(artist),
            track: normalize(track),
        }
    }

    fn search_key(&self) -> String {
        format!("video:search:{}:{}", self.artist, self.track)
    }

    fn verified_key(&self) -> String {
        format!("video:verified:{}:{}", self.artist, self.track)
    }

    fn failed_key(&self) -> String {
        format!("video:failed:{}:{}", self.artist, self.track)
    }

    fn pref_key(&self, user_id: &str) -> String {
        format!("video:pref:{}:{}:{}", normalize(user_id), self.artist, self.track)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCache {
    Missing,
    NotFound,
    Ids(Vec<String>),
}

/// Everything the resolver reads before deciding whether to search.
#[derive(Debug, Clone)]
pub struct CandidateSnapshot {
    pub preferred: Option<String>,
    pub verified: Vec<String>,
    pub failed: HashSet<String>,
    pub search: SearchCache,
}

pub struct CandidateStore<'a, S> {
    kv: &'a S,
}

impl<'a, S: KvStore> CandidateStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    pub fn preference(&self, user_id: &str, key: &TrackKey) -> Result<Option<String>, StoreError> {
        self.kv.get_string(&key.pref_key(user_id))
    }

    pub fn verified(&self, key: &TrackKey) -> Result<Vec<String>, StoreError> {
        self.kv.set_members(&key.verified_key())
    }

    pub fn failed(&self, key: &TrackKey) -> Result<Vec<String>, StoreError> {
        self.kv.set_members(&key.failed_key())
    }

    pub fn search_cache(&self, key: &TrackKey) -> Result<SearchCache, StoreError> {
        let Some(raw) = self.kv.get_string(&key.search_key())? else {
            return Ok(SearchCache::Missing);
        };
        if raw == NOT_FOUND_MARKER {
            return Ok(SearchCache::NotFound);
        }
        if !raw.starts_with('[') {
            // Older entries held a single bare id.
            return Ok(SearchCache::Ids(vec![raw]));
        }
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(SearchCache::Ids(ids)),
            Err(e) => {
                tracing::warn!("unreadable search cache for {}: {e}", key.search_key());
                Ok(SearchCache::Missing)
            }
        }
    }

    /// Empty results are remembered as "not found" for a shorter time.
    pub fn cache_search(&self, key: &TrackKey, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            self.kv
                .set_string(&key.search_key(), NOT_FOUND_MARKER, Some(NOT_FOUND_TTL))
        } else {
            let raw = serde_json::to_string(ids).unwrap_or_else(|_| "[]".into());
            self.kv.set_string(&key.search_key(), &raw, Some(SEARCH_TTL))
        }
    }

    pub fn snapshot(
        &self,
        key: &TrackKey,
        user_id: Option<&str>,
    ) -> Result<CandidateSnapshot, StoreError> {
        let preferred = match user_id {
            Some(user) => self.preference(user, key)?,
            None => None,
        };
        Ok(CandidateSnapshot {
            preferred,
            verified: self.verified(key)?,
            failed: self.failed(key)?.into_iter().collect(),
            search: self.search_cache(key)?,
        })
    }

    /// Failure marks the video failed. Success stores the user's preference,
    /// verifies the video and forgives any earlier failure, all at once.
    pub fn record(&self, report: &OutcomeReport) -> Result<(), StoreError> {
        let key = TrackKey::new(&report.artist, &report.track);
        if report.is_failure() {
            return self.kv.set_add(&key.failed_key(), &report.video_id);
        }
        self.kv.atomically(|kv| {
            if let Some(user) = report.user_id.as_deref().filter(|u| !u.trim().is_empty()) {
                kv.set_string(&key.pref_key(user), &report.video_id, None)?;
            }
            kv.set_add(&key.verified_key(), &report.video_id)?;
            kv.set_remove(&key.failed_key(), &report.video_id)
        })
    }
}
