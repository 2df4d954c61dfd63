use super::machine::{Effect, LoadStatus, PlaybackEvent, PlaybackMachine, Progress};
use super::source::QueueSource;
use crate::lyrics::{LyricsSource, ParsedLyrics};
use crate::player::Player;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What the display layer gets told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Status(LoadStatus),
    Progress(Progress),
    Error(String),
    Lyrics(Option<ParsedLyrics>),
}

/// Owns the state machine and carries out its effects.
///
/// Fetch results and debounce timers come back through `events`, so every
/// state change happens inside [`Controller::handle`], one event at a time.
pub struct Controller<S, P, L> {
    machine: PlaybackMachine,
    source: Arc<S>,
    player: P,
    lyrics: Arc<L>,
    events: mpsc::Sender<PlaybackEvent>,
    notices: mpsc::UnboundedSender<Notice>,
    inflight: Option<CancellationToken>,
    lyrics_inflight: Option<CancellationToken>,
}

impl<S: QueueSource, P: Player, L: LyricsSource> Controller<S, P, L> {
    pub fn new(
        machine: PlaybackMachine,
        source: Arc<S>,
        player: P,
        lyrics: Arc<L>,
        events: mpsc::Sender<PlaybackEvent>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            machine,
            source,
            player,
            lyrics,
            events,
            notices,
            inflight: None,
            lyrics_inflight: None,
        }
    }

    pub fn machine(&self) -> &PlaybackMachine {
        &self.machine
    }

    pub async fn handle(&mut self, event: PlaybackEvent) {
        debug!("playback event: {event:?}");
        for effect in self.machine.handle(event) {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleFetch { token, delay } => {
                let cancel = self.begin_inflight();
                let tx = self.events.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = tx.send(PlaybackEvent::FetchDue(token)).await;
                        }
                    }
                });
            }
            Effect::FetchQueue { token, request } => {
                let cancel = match &self.inflight {
                    Some(t) => t.clone(),
                    None => self.begin_inflight(),
                };
                let source = self.source.clone();
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        r = source.fetch_queue(&request) => r,
                    };
                    let event = match result {
                        Ok(response) => PlaybackEvent::QueueLoaded { token, response },
                        Err(e) => {
                            let (artist, track) = (&request.artist, &request.track);
                            warn!("queue fetch for {artist} / {track} failed: {e}");
                            PlaybackEvent::QueueFailed {
                                token,
                                message: e.to_string(),
                            }
                        }
                    };
                    let _ = tx.send(event).await;
                });
            }
            Effect::CancelFetch => {
                if let Some(token) = self.inflight.take() {
                    token.cancel();
                }
            }
            Effect::Load { video_id } => {
                if let Err(e) = self.player.load(&video_id).await {
                    warn!("player load {video_id} failed: {e:#}");
                    self.notify(Notice::Error(format!("player: {e:#}")));
                }
            }
            Effect::Replay { video_id } => {
                if let Err(e) = self.player.replay().await {
                    warn!("player replay {video_id} failed: {e:#}");
                }
            }
            Effect::Stop => {
                if let Err(e) = self.player.stop().await {
                    warn!("player stop failed: {e:#}");
                }
            }
            Effect::Report(report) => {
                // Fire and forget: playback never waits on persistence.
                let source = self.source.clone();
                tokio::spawn(async move {
                    if let Err(e) = source.report(&report).await {
                        warn!("reporting {} failed: {e}", report.video_id);
                    }
                });
            }
            Effect::Status(status) => self.notify(Notice::Status(status)),
            Effect::Progress(progress) => self.notify(Notice::Progress(progress)),
            Effect::NotifyError(message) => self.notify(Notice::Error(message)),
            Effect::FetchLyrics {
                token,
                artist,
                track,
            } => {
                if let Some(old) = self.lyrics_inflight.take() {
                    old.cancel();
                }
                let cancel = CancellationToken::new();
                self.lyrics_inflight = Some(cancel.clone());
                let lyrics = self.lyrics.clone();
                let tx = self.events.clone();
                tokio::spawn(async move {
                    let lyrics = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        l = lyrics.lyrics(&artist, &track) => l,
                    };
                    let _ = tx.send(PlaybackEvent::LyricsLoaded { token, lyrics }).await;
                });
            }
            Effect::CancelLyrics => {
                if let Some(token) = self.lyrics_inflight.take() {
                    token.cancel();
                }
            }
            Effect::ShowLyrics(lyrics) => self.notify(Notice::Lyrics(lyrics)),
        }
    }

    fn begin_inflight(&mut self) -> CancellationToken {
        if let Some(old) = self.inflight.take() {
            old.cancel();
        }
        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        token
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{OutcomeReport, QueueRequest, QueueResponse};
    use crate::playback::machine::TrackIdentity;
    use crate::playback::source::SourceError;
    use crate::store::StoreError;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        queue: Vec<String>,
        fail_reports: bool,
        requests: Mutex<Vec<QueueRequest>>,
        reports: Mutex<Vec<OutcomeReport>>,
    }

    impl QueueSource for FakeSource {
        async fn fetch_queue(&self, request: &QueueRequest) -> Result<QueueResponse, SourceError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(QueueResponse {
                video_ids: self.queue.clone(),
                preferred_video_id: None,
                is_discovery_complete: false,
            })
        }

        async fn report(&self, report: &OutcomeReport) -> Result<(), SourceError> {
            self.reports.lock().unwrap().push(report.clone());
            if self.fail_reports {
                return Err(StoreError::Task("offline".into()).into());
            }
            Ok(())
        }
    }

    /// Synced single-line lyrics naming the track.
    struct EchoLyrics;

    impl LyricsSource for EchoLyrics {
        async fn lyrics(&self, _artist: &str, track: &str) -> Option<ParsedLyrics> {
            Some(ParsedLyrics::parse(&format!("[00:01.00]{track}"), true))
        }
    }

    #[derive(Default, Clone)]
    struct RecordingPlayer {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Player for RecordingPlayer {
        async fn load(&self, video_id: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("load {video_id}"));
            Ok(())
        }

        async fn replay(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("replay".into());
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("stop".into());
            Ok(())
        }
    }

    struct Harness {
        controller: Controller<FakeSource, RecordingPlayer, EchoLyrics>,
        events: mpsc::Receiver<PlaybackEvent>,
        notices: mpsc::UnboundedReceiver<Notice>,
        player: RecordingPlayer,
        source: Arc<FakeSource>,
    }

    fn harness(source: FakeSource) -> Harness {
        let (tx, events) = mpsc::channel(16);
        let (ntx, notices) = mpsc::unbounded_channel();
        let source = Arc::new(source);
        let player = RecordingPlayer::default();
        let controller = Controller::new(
            PlaybackMachine::new(Duration::ZERO),
            source.clone(),
            player.clone(),
            Arc::new(EchoLyrics),
            tx,
            ntx,
        );
        Harness {
            controller,
            events,
            notices,
            player,
            source,
        }
    }

    impl Harness {
        /// Feed loop-back events into the controller until `n` queue events
        /// (timers and fetch results) have been handled. Lyrics results are
        /// handled along the way but not counted.
        async fn pump(&mut self, n: usize) {
            let mut handled = 0;
            while handled < n {
                let ev = self.next_event().await;
                if !matches!(ev, PlaybackEvent::LyricsLoaded { .. }) {
                    handled += 1;
                }
                self.controller.handle(ev).await;
            }
        }

        async fn next_event(&mut self) -> PlaybackEvent {
            tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("loop-back event")
                .expect("channel open")
        }

        fn drain_notices(&mut self) -> Vec<Notice> {
            let mut out = Vec::new();
            while let Ok(n) = self.notices.try_recv() {
                out.push(n);
            }
            out
        }
    }

    fn identity(track: &str) -> TrackIdentity {
        TrackIdentity {
            artist: "Queen".into(),
            track: track.into(),
            user_id: Some("alice".into()),
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_track_change_fetches_and_loads() {
        let mut h = harness(FakeSource {
            queue: ids(&["A", "B"]),
            ..Default::default()
        });
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("Song"))))
            .await;
        // FetchDue, then QueueLoaded.
        h.pump(2).await;

        assert_eq!(h.controller.machine().current_video(), Some("A"));
        assert_eq!(*h.player.calls.lock().unwrap(), vec!["stop", "load A"]);
        assert_eq!(h.source.requests.lock().unwrap()[0].track, "Song");

        let notices = h.drain_notices();
        assert!(notices.contains(&Notice::Status(LoadStatus::Searching)));
        assert!(notices.contains(&Notice::Progress(Progress {
            current: 1,
            total: 2,
            is_discovery_complete: false
        })));
    }

    #[tokio::test]
    async fn test_superseded_track_never_fetches() {
        let mut h = harness(FakeSource {
            queue: ids(&["A"]),
            ..Default::default()
        });
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("Old"))))
            .await;
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("New"))))
            .await;
        h.pump(2).await;

        let requests = h.source.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].track, "New");
    }

    #[tokio::test]
    async fn test_error_recovery_reports_and_advances() {
        let mut h = harness(FakeSource {
            queue: ids(&["A", "B"]),
            fail_reports: true,
            ..Default::default()
        });
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("Song"))))
            .await;
        h.pump(2).await;

        h.controller
            .handle(PlaybackEvent::PlayerFailed {
                video_id: "A".into(),
                reason: "embed disabled".into(),
            })
            .await;
        assert_eq!(h.controller.machine().current_video(), Some("B"));
        assert_eq!(h.player.calls.lock().unwrap().last().unwrap(), "load B");

        // The failed report is attempted even though persistence is down.
        for _ in 0..50 {
            if !h.source.reports.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let reports = h.source.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_failure());
    }

    #[tokio::test]
    async fn test_ended_replays() {
        let mut h = harness(FakeSource {
            queue: ids(&["A"]),
            ..Default::default()
        });
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("Song"))))
            .await;
        h.pump(2).await;
        h.controller
            .handle(PlaybackEvent::PlayerEnded {
                video_id: "A".into(),
            })
            .await;
        assert_eq!(h.player.calls.lock().unwrap().last().unwrap(), "replay");
    }

    #[tokio::test]
    async fn test_lyrics_follow_the_current_track() {
        let mut h = harness(FakeSource {
            queue: ids(&["A"]),
            ..Default::default()
        });
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("Old"))))
            .await;
        h.controller
            .handle(PlaybackEvent::TrackChanged(Some(identity("New"))))
            .await;

        loop {
            let ev = h.next_event().await;
            let done = matches!(ev, PlaybackEvent::LyricsLoaded { .. });
            h.controller.handle(ev).await;
            if done {
                break;
            }
        }

        let shown: Vec<ParsedLyrics> = h
            .drain_notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Lyrics(l) => l,
                _ => None,
            })
            .collect();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].lines[0].text, "New");
    }
}
