use crate::playback::machine::TrackIdentity;
use crate::player::PlayerEvent;

#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Player(PlayerEvent),
    /// `None` when nothing is playing any more.
    NowPlaying(Option<TrackIdentity>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Skip,
    Retry,
    Quit,
}
