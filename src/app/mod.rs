pub mod events;

use crate::config::Config;
use crate::input;
use crate::lyrics::{LyricsClient, ParsedLyrics};
use crate::nowplaying::{self, LastfmClient};
use crate::playback::machine::{LoadStatus, Phase, Progress};
use crate::playback::{
    Controller, Notice, PlaybackEvent, PlaybackMachine, QueueSource, TrackIdentity,
};
use crate::player::PlayerEvent;
use crate::player::mpv::MpvHandle;
use anyhow::Context;
use events::{Event, InputEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Where the session learns what is playing.
pub enum TrackFeed {
    /// One fixed track, given on the command line.
    Fixed(TrackIdentity),
    Lastfm(LastfmClient),
}

/// Lyrics for the song on screen, and when that song started.
///
/// Last.fm gives no playback position, so synced lines are timed from the
/// moment the track change was seen.
#[derive(Debug, Default)]
struct LyricsView {
    lyrics: Option<ParsedLyrics>,
    since: Option<Instant>,
    shown: Option<usize>,
}

impl LyricsView {
    fn restart(&mut self, now: Instant) {
        *self = Self {
            since: Some(now),
            ..Default::default()
        };
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    /// Takes new lyrics; returns what to print right away.
    fn set(&mut self, lyrics: Option<ParsedLyrics>) -> Vec<String> {
        self.shown = None;
        self.lyrics = lyrics;
        match &self.lyrics {
            Some(l) if l.instrumental => vec!["(instrumental)".to_string()],
            Some(l) if !l.synced => l.lines.iter().map(|line| line.text.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// The synced line due at `now`, once per line.
    fn tick(&mut self, now: Instant) -> Option<String> {
        let lyrics = self.lyrics.as_ref()?;
        let elapsed = now.saturating_duration_since(self.since?);
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let index = lyrics.line_index_at(elapsed_ms)?;
        if self.shown == Some(index) {
            return None;
        }
        self.shown = Some(index);
        let text = &lyrics.lines[index].text;
        (!text.is_empty()).then(|| text.clone())
    }
}

/// Interactive playback session.
pub struct App<S> {
    cfg: Config,
    source: Arc<S>,
    skips: u64,
    lyrics: LyricsView,
}

impl<S: QueueSource> App<S> {
    pub fn new(cfg: Config, source: S) -> Self {
        Self {
            cfg,
            source: Arc::new(source),
            skips: 0,
            lyrics: LyricsView::default(),
        }
    }

    pub async fn run(&mut self, feed: TrackFeed) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(256);
        let (playback_tx, mut playback_rx) = mpsc::channel::<PlaybackEvent>(64);
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();

        input::spawn_input_task(tx.clone());

        std::fs::create_dir_all(&self.cfg.paths.data_dir)
            .with_context(|| format!("create dir {}", self.cfg.paths.data_dir.display()))?;
        let mpv_log = self.cfg.paths.data_dir.join("mpv.log");
        let mpv = MpvHandle::spawn(
            tx.clone(),
            self.cfg.player.mute,
            self.cfg.player.audio_device.as_deref(),
            Some(&mpv_log),
        )
        .await
        .context("start mpv")?;

        let lyrics = if self.cfg.lyrics.enabled {
            Some(LyricsClient::new(
                &self.cfg.lyrics.lrclib_url,
                &self.cfg.lyrics.ovh_url,
            )?)
        } else {
            None
        };

        let mut controller = Controller::new(
            PlaybackMachine::new(self.cfg.fetch_debounce()),
            self.source.clone(),
            mpv,
            Arc::new(lyrics),
            playback_tx,
            notice_tx,
        );
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let poller = match feed {
            TrackFeed::Fixed(identity) => {
                tx.send(Event::NowPlaying(Some(identity)))
                    .await
                    .context("queue initial track")?;
                None
            }
            TrackFeed::Lastfm(client) => Some(nowplaying::spawn_poller(
                client,
                self.cfg.poll_interval(),
                self.cfg.playback.user_id.clone(),
                tx.clone(),
            )),
        };
        println!("commands: n (next video), r (retry search), q (quit)");

        loop {
            tokio::select! {
                Some(ev) = rx.recv() => {
                    let Some(pe) = self.on_event(ev) else {
                        break;
                    };
                    controller.handle(pe).await;
                }
                Some(pe) = playback_rx.recv() => controller.handle(pe).await,
                Some(notice) = notice_rx.recv() => {
                    render(&notice, controller.machine(), &mut self.lyrics);
                }
                _ = tick.tick() => {
                    if let Some(line) = self.lyrics.tick(Instant::now()) {
                        println!("  ♪ {line}");
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        if let Some(p) = poller {
            p.abort();
        }
        Ok(())
    }

    /// `None` ends the session.
    fn on_event(&mut self, ev: Event) -> Option<PlaybackEvent> {
        let pe = match ev {
            Event::Input(InputEvent::Quit) => return None,
            Event::Input(InputEvent::Skip) => {
                self.skips += 1;
                PlaybackEvent::Skip {
                    trigger: self.skips,
                }
            }
            Event::Input(InputEvent::Retry) => PlaybackEvent::Refetch,
            Event::Player(pe) => from_player(pe),
            Event::NowPlaying(identity) => {
                match &identity {
                    Some(_) => self.lyrics.restart(Instant::now()),
                    None => {
                        self.lyrics.clear();
                        println!("nothing playing");
                    }
                }
                PlaybackEvent::TrackChanged(identity)
            }
        };
        Some(pe)
    }
}

fn render(notice: &Notice, machine: &PlaybackMachine, lyrics: &mut LyricsView) {
    match notice {
        Notice::Status(status) => {
            let label = match status {
                LoadStatus::Searching => "searching",
                LoadStatus::Playing => "playing",
                LoadStatus::Error => "error",
            };
            let video = machine
                .current_video()
                .map(|id| format!(" ({})", crate::player::watch_url(id)))
                .unwrap_or_default();
            match machine.track() {
                Some(t) => println!("[{label}] {} - {}{video}", t.artist, t.track),
                None => println!("[{label}]"),
            }
        }
        Notice::Progress(progress) => {
            if let Some(line) = progress_line(progress) {
                println!("{line}");
            }
        }
        Notice::Error(message) => {
            if machine.phase() == Phase::Exhausted {
                println!("! {message}; press r to search again");
            } else {
                println!("! {message}");
            }
        }
        Notice::Lyrics(l) => {
            for line in lyrics.set(l.clone()) {
                println!("  {line}");
            }
        }
    }
}

fn from_player(pe: PlayerEvent) -> PlaybackEvent {
    match pe {
        PlayerEvent::Started { video_id } => PlaybackEvent::PlayerStarted { video_id },
        PlayerEvent::Ended { video_id } => PlaybackEvent::PlayerEnded { video_id },
        PlayerEvent::Error { video_id, message } => PlaybackEvent::PlayerFailed {
            video_id,
            reason: message,
        },
    }
}

/// "video 2/5", with a trailing "+" while more candidates may still turn up.
fn progress_line(progress: &Progress) -> Option<String> {
    if progress.total == 0 {
        return None;
    }
    let more = if progress.is_discovery_complete { "" } else { "+" };
    Some(format!("video {}/{}{more}", progress.current, progress.total))
}
