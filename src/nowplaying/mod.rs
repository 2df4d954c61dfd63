//! Where the current track comes from.

pub mod lastfm;

use crate::app::events::Event;
use crate::playback::TrackIdentity;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use lastfm::LastfmClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub artist: String,
    pub track: String,
}

pub trait NowPlayingSource: Send + Sync + 'static {
    /// `Ok(None)` means the user is not listening to anything right now.
    fn now_playing(&self) -> impl Future<Output = anyhow::Result<Option<NowPlaying>>> + Send;
}

/// Polls `source` and forwards a [`Event::NowPlaying`] whenever the track changes.
/// Failed polls keep the last known track.
pub fn spawn_poller<N: NowPlayingSource>(
    source: N,
    interval: Duration,
    user_id: Option<String>,
    tx: mpsc::Sender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Option<Option<NowPlaying>> = None;
        loop {
            match source.now_playing().await {
                Ok(current) => {
                    if last.as_ref() != Some(&current) {
                        if let Some(np) = &current {
                            tracing::info!("now playing: {} - {}", np.artist, np.track);
                        }
                        let identity = current.clone().map(|np| TrackIdentity {
                            artist: np.artist,
                            track: np.track,
                            user_id: user_id.clone(),
                        });
                        if tx.send(Event::NowPlaying(identity)).await.is_err() {
                            break;
                        }
                        last = Some(current);
                    }
                }
                Err(e) => tracing::warn!("now playing poll failed: {e:#}"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}
