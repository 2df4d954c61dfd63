//! Playback recovery state machine.
//!
//! The machine owns the candidate queue for the current track and turns every
//! input (track change, fetch result, skip, player signal) into a list of
//! [`Effect`]s. It performs no I/O itself; the controller executes the effects.

use crate::candidates::{OutcomeReport, QueueRequest, QueueResponse};
use crate::lyrics::ParsedLyrics;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Who is listening to what. A change of any field starts a fresh queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    pub artist: String,
    pub track: String,
    pub user_id: Option<String>,
}

impl TrackIdentity {
    pub fn request(&self) -> QueueRequest {
        QueueRequest {
            artist: self.artist.clone(),
            track: self.track.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Ties asynchronous results to the track load that asked for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Searching,
    Playing,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 1-based; 0 while nothing is queued.
    pub current: usize,
    pub total: usize,
    pub is_discovery_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Searching,
    Playing,
    /// The queue could not be fetched or came back empty.
    Error,
    /// Every candidate failed.
    Exhausted,
}

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    TrackChanged(Option<TrackIdentity>),
    /// Reload the queue for the current track.
    Refetch,
    FetchDue(FetchToken),
    QueueLoaded {
        token: FetchToken,
        response: QueueResponse,
    },
    QueueFailed {
        token: FetchToken,
        message: String,
    },
    /// `trigger` grows by one per user skip request.
    Skip { trigger: u64 },
    PlayerStarted { video_id: String },
    PlayerFailed { video_id: String, reason: String },
    PlayerEnded { video_id: String },
    LyricsLoaded {
        token: FetchToken,
        lyrics: Option<ParsedLyrics>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ScheduleFetch { token: FetchToken, delay: Duration },
    FetchQueue { token: FetchToken, request: QueueRequest },
    CancelFetch,
    Load { video_id: String },
    Replay { video_id: String },
    Stop,
    Report(OutcomeReport),
    Status(LoadStatus),
    Progress(Progress),
    NotifyError(String),
    FetchLyrics {
        token: FetchToken,
        artist: String,
        track: String,
    },
    CancelLyrics,
    /// `None` clears whatever is shown.
    ShowLyrics(Option<ParsedLyrics>),
}

#[derive(Debug)]
pub struct PlaybackMachine {
    debounce: Duration,
    track: Option<TrackIdentity>,
    generation: u64,
    /// Survives a queue refetch; only a new song invalidates lyrics.
    lyrics_token: Option<FetchToken>,
    queue: Vec<String>,
    current_index: usize,
    attempted: HashSet<String>,
    manually_skipped: bool,
    remote_discovery_complete: bool,
    last_reported: Option<String>,
    last_skip_trigger: u64,
    phase: Phase,
}

impl PlaybackMachine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            track: None,
            generation: 0,
            lyrics_token: None,
            queue: Vec::new(),
            current_index: 0,
            attempted: HashSet::new(),
            manually_skipped: false,
            remote_discovery_complete: false,
            last_reported: None,
            last_skip_trigger: 0,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn track(&self) -> Option<&TrackIdentity> {
        self.track.as_ref()
    }

    pub fn current_video(&self) -> Option<&str> {
        self.queue.get(self.current_index).map(String::as_str)
    }

    /// Server completeness, or locally every queued id has been tried.
    pub fn is_discovery_complete(&self) -> bool {
        self.remote_discovery_complete
            || (!self.queue.is_empty() && self.queue.iter().all(|id| self.attempted.contains(id)))
    }

    pub fn progress(&self) -> Progress {
        if self.queue.is_empty() {
            return Progress {
                current: 0,
                total: 0,
                is_discovery_complete: self.remote_discovery_complete,
            };
        }
        Progress {
            current: self.current_index + 1,
            total: self.queue.len(),
            is_discovery_complete: self.is_discovery_complete(),
        }
    }

    pub fn handle(&mut self, event: PlaybackEvent) -> Vec<Effect> {
        match event {
            PlaybackEvent::TrackChanged(Some(identity)) => {
                if self.track.as_ref() == Some(&identity) {
                    return Vec::new();
                }
                let same_song = self
                    .track
                    .as_ref()
                    .is_some_and(|t| t.artist == identity.artist && t.track == identity.track);
                let (artist, track) = (identity.artist.clone(), identity.track.clone());
                let mut effects = self.begin(identity);
                if !same_song {
                    let token = FetchToken(self.generation);
                    self.lyrics_token = Some(token);
                    effects.extend([
                        Effect::CancelLyrics,
                        Effect::ShowLyrics(None),
                        Effect::FetchLyrics {
                            token,
                            artist,
                            track,
                        },
                    ]);
                }
                effects
            }
            PlaybackEvent::TrackChanged(None) => {
                if self.track.is_none() {
                    return Vec::new();
                }
                self.reset();
                self.track = None;
                self.lyrics_token = None;
                self.phase = Phase::Idle;
                vec![
                    Effect::CancelFetch,
                    Effect::CancelLyrics,
                    Effect::Stop,
                    Effect::Progress(self.progress()),
                    Effect::ShowLyrics(None),
                ]
            }
            PlaybackEvent::Refetch => match self.track.clone() {
                Some(identity) => self.begin(identity),
                None => Vec::new(),
            },
            PlaybackEvent::FetchDue(token) => match &self.track {
                Some(identity) if self.is_current(token) => vec![Effect::FetchQueue {
                    token,
                    request: identity.request(),
                }],
                _ => Vec::new(),
            },
            PlaybackEvent::QueueLoaded { token, response } => {
                if !self.is_current(token) {
                    return Vec::new();
                }
                self.load_queue(response)
            }
            PlaybackEvent::QueueFailed { token, message } => {
                if !self.is_current(token) {
                    return Vec::new();
                }
                self.phase = Phase::Error;
                vec![
                    Effect::Status(LoadStatus::Error),
                    Effect::NotifyError(message),
                ]
            }
            PlaybackEvent::Skip { trigger } => self.skip(trigger),
            PlaybackEvent::PlayerStarted { video_id } => self.started(&video_id),
            PlaybackEvent::PlayerFailed { video_id, reason } => self.failed(&video_id, reason),
            PlaybackEvent::PlayerEnded { video_id } => {
                if self.current_video() == Some(video_id.as_str()) {
                    vec![Effect::Replay { video_id }]
                } else {
                    Vec::new()
                }
            }
            PlaybackEvent::LyricsLoaded { token, lyrics } => {
                if self.track.is_none() || self.lyrics_token != Some(token) {
                    return Vec::new();
                }
                vec![Effect::ShowLyrics(lyrics)]
            }
        }
    }

    fn is_current(&self, token: FetchToken) -> bool {
        self.track.is_some() && token == FetchToken(self.generation)
    }

    fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.queue.clear();
        self.current_index = 0;
        self.attempted.clear();
        self.manually_skipped = false;
        self.remote_discovery_complete = false;
        self.last_reported = None;
    }

    fn begin(&mut self, identity: TrackIdentity) -> Vec<Effect> {
        self.reset();
        self.track = Some(identity);
        self.phase = Phase::Searching;
        vec![
            Effect::CancelFetch,
            Effect::Stop,
            Effect::Status(LoadStatus::Searching),
            Effect::Progress(self.progress()),
            Effect::ScheduleFetch {
                token: FetchToken(self.generation),
                delay: self.debounce,
            },
        ]
    }

    fn load_queue(&mut self, response: QueueResponse) -> Vec<Effect> {
        let mut seen = HashSet::new();
        self.queue = response
            .video_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        self.remote_discovery_complete = response.is_discovery_complete;
        self.attempted.clear();

        if self.queue.is_empty() {
            self.phase = Phase::Error;
            return vec![
                Effect::Status(LoadStatus::Error),
                Effect::NotifyError("no videos found for this track".into()),
            ];
        }

        self.current_index = response
            .preferred_video_id
            .and_then(|pref| self.queue.iter().position(|id| *id == pref))
            .unwrap_or(0);
        let video_id = self.queue[self.current_index].clone();
        self.attempted.insert(video_id.clone());
        self.phase = Phase::Searching;

        vec![
            Effect::Load { video_id },
            Effect::Status(LoadStatus::Searching),
            Effect::Progress(self.progress()),
        ]
    }

    fn skip(&mut self, trigger: u64) -> Vec<Effect> {
        if trigger <= self.last_skip_trigger {
            return Vec::new();
        }
        self.last_skip_trigger = trigger;
        // Nothing else to move to.
        if self.queue.len() < 2 {
            return Vec::new();
        }

        self.manually_skipped = true;
        self.current_index = (self.current_index + 1) % self.queue.len();
        self.select_current()
    }

    fn started(&mut self, video_id: &str) -> Vec<Effect> {
        if self.current_video() != Some(video_id) {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.phase != Phase::Playing {
            self.phase = Phase::Playing;
            effects.push(Effect::Status(LoadStatus::Playing));
        }

        // An untouched first candidate is a default, not a choice.
        let is_new = self.last_reported.as_deref() != Some(video_id);
        let chosen = self.current_index != 0 || self.manually_skipped;
        if is_new
            && chosen
            && let Some(identity) = &self.track
        {
            self.last_reported = Some(video_id.to_string());
            effects.push(Effect::Report(OutcomeReport::success(
                &identity.request(),
                video_id,
            )));
        }
        effects
    }

    fn failed(&mut self, video_id: &str, reason: String) -> Vec<Effect> {
        if self.current_video() != Some(video_id) {
            return Vec::new();
        }
        let Some(identity) = &self.track else {
            return Vec::new();
        };

        let mut effects = vec![Effect::Report(OutcomeReport::failure(
            &identity.request(),
            video_id,
        ))];
        self.queue.retain(|id| id != video_id);

        if self.queue.is_empty() {
            self.phase = Phase::Exhausted;
            self.current_index = 0;
            effects.extend([
                Effect::Stop,
                Effect::Status(LoadStatus::Error),
                Effect::Progress(self.progress()),
                Effect::NotifyError(format!("every candidate failed (last: {reason})")),
            ]);
            return effects;
        }

        if self.current_index >= self.queue.len() {
            self.current_index = 0;
        }
        effects.extend(self.select_current());
        effects
    }

    fn select_current(&mut self) -> Vec<Effect> {
        let video_id = self.queue[self.current_index].clone();
        self.attempted.insert(video_id.clone());
        self.phase = Phase::Searching;
        vec![
            Effect::Load { video_id },
            Effect::Status(LoadStatus::Searching),
            Effect::Progress(self.progress()),
        ]
    }
}

#[cfg(test)]
impl PlaybackMachine {
    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn manually_skipped(&self) -> bool {
        self.manually_skipped
    }

    pub fn was_attempted(&self, video_id: &str) -> bool {
        self.attempted.contains(video_id)
    }
}
