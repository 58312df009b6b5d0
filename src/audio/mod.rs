//! Ambient audio: playlist resolution and the shared playback resource.

mod output;
mod player;
mod playlist;

pub use output::LogOutput;
pub use player::{AudioOutput, PlaybackHub, PlaybackResource, PlaybackState, PlaybackSynchronizer};
pub use playlist::{resolve_playlist, PlaylistResolution, SourceKey};
