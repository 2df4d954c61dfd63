//! Client side of video selection: which candidate to show, and what to do
//! when it plays, fails or ends.

pub mod controller;
pub mod machine;
pub mod source;

pub use controller::{Controller, Notice};
pub use machine::{PlaybackEvent, PlaybackMachine, TrackIdentity};
pub use source::{HttpQueueSource, QueueSource};
