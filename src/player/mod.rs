pub mod mpv;

use std::future::Future;

/// Something that can show one video at a time.
pub trait Player {
    fn load(&self, video_id: &str) -> impl Future<Output = anyhow::Result<()>>;

    /// Start the loaded video again from the beginning.
    fn replay(&self) -> impl Future<Output = anyhow::Result<()>>;

    fn stop(&self) -> impl Future<Output = anyhow::Result<()>>;
}

/// Playback signals, attributed to the video that was loaded when they fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Started { video_id: String },
    Ended { video_id: String },
    Error { video_id: String, message: String },
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
