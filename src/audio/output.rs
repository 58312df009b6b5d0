//! Speakerless audio output for the terminal client.

use async_trait::async_trait;
use log::info;

use crate::errors::PlaybackError;
use crate::logutil::escape_log;

use super::player::AudioOutput;

/// Output used by the terminal client: it has no speaker, so it records and logs what
/// would be playing.
#[derive(Debug, Default)]
pub struct LogOutput {
    loaded: Option<String>,
    playing: bool,
    volume: f32,
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed() -> Box<dyn AudioOutput> {
        Box::new(Self::new())
    }

    pub fn now_playing(&self) -> Option<&str> {
        self.loaded.as_deref().filter(|_| self.playing)
    }
}

#[async_trait]
impl AudioOutput for LogOutput {
    fn load(&mut self, track: &str) {
        self.playing = false;
        self.loaded = Some(track.to_string());
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        let track = self
            .loaded
            .as_deref()
            .ok_or_else(|| PlaybackError::Media("no track loaded".to_string()))?;
        info!(
            target: "mudlink::audio",
            "now playing {} at volume {:.2}",
            escape_log(track),
            self.volume
        );
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_requires_a_loaded_track() {
        let mut out = LogOutput::new();
        assert!(matches!(out.play().await, Err(PlaybackError::Media(_))));
        out.load("a.ogg");
        assert_eq!(out.now_playing(), None);
        out.play().await.unwrap();
        assert_eq!(out.now_playing(), Some("a.ogg"));
        out.pause();
        assert_eq!(out.now_playing(), None);
    }
}
