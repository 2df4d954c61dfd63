use super::{
    CandidateSnapshot, CandidateStore, OutcomeReport, QueueRequest, QueueResponse, SearchCache,
    TrackKey, normalize, title,
};
use crate::search::{SearchProvider, SearchResult};
use crate::store::{StoreError, StoreHandle};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("search provider unavailable: {0}")]
    ProviderTransport(String),
    #[error("search provider is not configured")]
    MissingApiKey,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds ranked candidate queues and records playback outcomes.
pub struct Resolver<P> {
    store: StoreHandle,
    provider: P,
}

impl<P: SearchProvider> Resolver<P> {
    pub fn new(store: StoreHandle, provider: P) -> Self {
        Self { store, provider }
    }

    pub async fn resolve(&self, request: &QueueRequest) -> Result<QueueResponse, ResolveError> {
        let key = TrackKey::new(&request.artist, &request.track);
        let user = request
            .user_id
            .as_deref()
            .map(normalize)
            .filter(|u| !u.is_empty());

        let snapshot = self
            .store
            .with({
                let key = key.clone();
                move |kv| CandidateStore::new(kv).snapshot(&key, user.as_deref())
            })
            .await?;
        debug!(
            "candidates for {} / {}: verified={} failed={} pref={:?}",
            request.artist,
            request.track,
            snapshot.verified.len(),
            snapshot.failed.len(),
            snapshot.preferred
        );

        let search_ids = match &snapshot.search {
            SearchCache::NotFound => {
                return Ok(QueueResponse {
                    video_ids: Vec::new(),
                    preferred_video_id: snapshot.preferred,
                    is_discovery_complete: false,
                });
            }
            SearchCache::Ids(ids) if !ids.is_empty() => ids.clone(),
            _ => {
                let ids = self.discover(&request.artist, &request.track).await?;
                self.store
                    .with({
                        let ids = ids.clone();
                        move |kv| CandidateStore::new(kv).cache_search(&key, &ids)
                    })
                    .await?;
                ids
            }
        };

        Ok(merge(snapshot, &search_ids))
    }

    pub async fn record(&self, report: OutcomeReport) -> Result<(), StoreError> {
        debug!(
            "outcome {} for {} / {}: {}",
            report.video_id,
            report.artist,
            report.track,
            if report.is_failure() { "failed" } else { "ok" }
        );
        self.store
            .with(move |kv| CandidateStore::new(kv).record(&report))
            .await
    }

    /// Cleaned title first; the original title only if that found nothing.
    async fn discover(&self, artist: &str, track: &str) -> Result<Vec<String>, ResolveError> {
        if !self.provider.is_configured() {
            return Err(ResolveError::MissingApiKey);
        }

        let cleaned = title::clean_track_title(track);
        let mut result = self.provider.search(&format!("{artist} {cleaned}")).await;

        if cleaned != track && !result.is_found() {
            info!("clean title found nothing, retrying with original: {track}");
            let retry = self.provider.search(&format!("{artist} {track}")).await;
            if retry.is_found() {
                result = retry;
            }
        }

        match result {
            SearchResult::Found(ids) => Ok(ids),
            SearchResult::Empty => Ok(Vec::new()),
            SearchResult::TransportError(e) => {
                warn!("search failed for {artist} / {track}: {e}");
                Err(ResolveError::ProviderTransport(e))
            }
        }
    }
}

/// Verified first, then search order, then the preference; failed ids never
/// make it in and each id appears once.
fn merge(snapshot: CandidateSnapshot, search_ids: &[String]) -> QueueResponse {
    let CandidateSnapshot {
        preferred,
        verified,
        failed,
        ..
    } = snapshot;

    let mut seen = HashSet::new();
    let video_ids: Vec<String> = verified
        .iter()
        .chain(search_ids)
        .chain(preferred.iter())
        .filter(|id| !failed.contains(*id))
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let is_discovery_complete = !search_ids.is_empty()
        && search_ids
            .iter()
            .all(|id| failed.contains(id) || verified.contains(id));

    QueueResponse {
        video_ids,
        preferred_video_id: preferred,
        is_discovery_complete,
    }
}
