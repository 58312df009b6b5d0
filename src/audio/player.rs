//! The single shared playback resource and the synchronizers that drive it.
//!
//! A [`PlaybackHub`] owns two process-wide things: a weak slot holding the one
//! [`PlaybackResource`], and a `watch` signal carrying [`PlaybackState`]. Every UI surface
//! gets its own [`PlaybackSynchronizer`]; they share the resource by reference count and
//! observe enable/disable through the signal rather than through each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::errors::PlaybackError;
use crate::metrics;

use super::playlist::{PlaylistResolution, SourceKey};

/// A media sink able to play one track at a time.
#[async_trait]
pub trait AudioOutput: Send {
    fn load(&mut self, track: &str);
    /// Start the loaded track; resolves once media is ready and playing.
    async fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub enabled: bool,
    pub current_track_index: usize,
    pub volume: f32,
    /// Playback stopped by an error or a refused start, not by the user.
    pub paused: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            enabled: true,
            current_track_index: 0,
            volume: 0.6,
            paused: false,
        }
    }
}

struct Deck {
    output: Box<dyn AudioOutput>,
    tracks: Vec<String>,
    source: Option<SourceKey>,
}

/// The one playback resource. Only reachable through [`PlaybackHub::acquire`].
pub struct PlaybackResource {
    deck: tokio::sync::Mutex<Deck>,
    play_in_flight: AtomicBool,
    permission_reported: AtomicBool,
}

impl std::fmt::Debug for PlaybackResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackResource")
            .field("play_in_flight", &self.play_in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Resets the reentrancy flag when a play attempt finishes, however it finishes.
struct PlayGuard<'a>(&'a AtomicBool);

impl<'a> PlayGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(PlayGuard(flag))
        }
    }
}

impl Drop for PlayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct PlaybackHub {
    signal: watch::Sender<PlaybackState>,
    slot: Mutex<Weak<PlaybackResource>>,
}

static GLOBAL_HUB: OnceLock<Arc<PlaybackHub>> = OnceLock::new();

impl PlaybackHub {
    pub fn new(initial: PlaybackState) -> Arc<Self> {
        let (signal, _) = watch::channel(initial);
        Arc::new(Self {
            signal,
            slot: Mutex::new(Weak::new()),
        })
    }

    /// The process-wide hub.
    pub fn global() -> Arc<Self> {
        GLOBAL_HUB
            .get_or_init(|| PlaybackHub::new(PlaybackState::default()))
            .clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.signal.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.signal.borrow().clone()
    }

    /// Apply configured defaults without touching track position.
    pub fn configure(&self, enabled: bool, volume: f32) {
        self.update(|s| {
            s.enabled = enabled;
            s.volume = volume.clamp(0.0, 1.0);
        });
    }

    fn update(&self, f: impl FnOnce(&mut PlaybackState)) {
        self.signal.send_modify(f);
    }

    /// Return the existing resource, or build one with `make` if none is alive.
    pub fn acquire<F>(&self, make: F) -> Arc<PlaybackResource>
    where
        F: FnOnce() -> Box<dyn AudioOutput>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slot.upgrade() {
            debug!(target: "mudlink::audio", "reusing playback resource");
            return existing;
        }
        let mut output = make();
        output.set_volume(self.state().volume);
        let resource = Arc::new(PlaybackResource {
            deck: tokio::sync::Mutex::new(Deck {
                output,
                tracks: Vec::new(),
                source: None,
            }),
            play_in_flight: AtomicBool::new(false),
            permission_reported: AtomicBool::new(false),
        });
        *slot = Arc::downgrade(&resource);
        debug!(target: "mudlink::audio", "created playback resource");
        resource
    }
}

/// One UI surface's handle on shared playback.
pub struct PlaybackSynchronizer {
    hub: Arc<PlaybackHub>,
    resource: Arc<PlaybackResource>,
    state_rx: watch::Receiver<PlaybackState>,
}

impl std::fmt::Debug for PlaybackSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSynchronizer")
            .field("state", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl PlaybackSynchronizer {
    pub fn attach<F>(hub: Arc<PlaybackHub>, make_output: F) -> Self
    where
        F: FnOnce() -> Box<dyn AudioOutput>,
    {
        let resource = hub.acquire(make_output);
        let state_rx = hub.subscribe();
        Self {
            hub,
            resource,
            state_rx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    /// Wait until another surface (or this one) changes the shared state.
    pub async fn changed(&mut self) -> Option<PlaybackState> {
        self.state_rx.changed().await.ok()?;
        Some(self.state_rx.borrow_and_update().clone())
    }

    pub fn shares_resource_with(&self, other: &PlaybackSynchronizer) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }

    pub async fn source(&self) -> Option<SourceKey> {
        self.resource.deck.lock().await.source.clone()
    }

    pub async fn current_track(&self) -> Option<String> {
        let deck = self.resource.deck.lock().await;
        deck.tracks
            .get(self.hub.state().current_track_index)
            .cloned()
    }

    /// Install a resolved playlist. Only a change of source key resets to track 0;
    /// resolving the same key again leaves playback untouched.
    pub async fn sync(&self, resolution: PlaylistResolution) -> Result<(), PlaybackError> {
        {
            let mut deck = self.resource.deck.lock().await;
            if deck.source.as_ref() == Some(&resolution.source) {
                debug!(target: "mudlink::audio", "playlist {} unchanged", resolution.source);
                return Ok(());
            }
            info!(
                target: "mudlink::audio",
                "playlist switched to {} ({} tracks)",
                resolution.source,
                resolution.tracks.len()
            );
            deck.tracks = resolution.tracks;
            deck.source = Some(resolution.source);
            self.hub.update(|s| s.current_track_index = 0);
            match deck.tracks.first().cloned() {
                Some(first) => deck.output.load(&first),
                None => {
                    deck.output.pause();
                    return Ok(());
                }
            }
        }
        if self.hub.state().enabled {
            self.play().await
        } else {
            Ok(())
        }
    }

    /// Advance after the current track ends, wrapping to the first.
    pub async fn on_track_end(&self) -> Result<(), PlaybackError> {
        {
            let mut deck = self.resource.deck.lock().await;
            if deck.tracks.is_empty() {
                return Ok(());
            }
            let next = (self.hub.state().current_track_index + 1) % deck.tracks.len();
            self.hub.update(|s| s.current_track_index = next);
            let track = deck.tracks[next].clone();
            deck.output.load(&track);
        }
        if self.hub.state().enabled {
            self.play().await
        } else {
            Ok(())
        }
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), PlaybackError> {
        self.hub.update(|s| {
            s.enabled = enabled;
            if enabled {
                s.paused = false;
            }
        });
        if enabled {
            self.resource
                .permission_reported
                .store(false, Ordering::Relaxed);
            self.play().await
        } else {
            self.resource.deck.lock().await.output.pause();
            Ok(())
        }
    }

    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.hub.update(|s| s.volume = volume);
        self.resource.deck.lock().await.output.set_volume(volume);
    }

    /// Start the loaded track. Overlapping attempts are skipped, aborted attempts are
    /// ignored, and a refused start is reported only once until playback is re-enabled.
    async fn play(&self) -> Result<(), PlaybackError> {
        let Some(_guard) = PlayGuard::try_acquire(&self.resource.play_in_flight) else {
            debug!(target: "mudlink::audio", "play already in flight; skipping");
            return Ok(());
        };
        let result = {
            let mut deck = self.resource.deck.lock().await;
            if deck.tracks.is_empty() {
                return Ok(());
            }
            deck.output.play().await
        };
        match result {
            Ok(()) => {
                metrics::inc_playback_starts();
                self.hub.update(|s| s.paused = false);
                Ok(())
            }
            Err(PlaybackError::Aborted) => {
                debug!(target: "mudlink::audio", "play aborted by a newer load");
                Ok(())
            }
            Err(PlaybackError::PermissionDenied) => {
                metrics::inc_playback_errors();
                self.hub.update(|s| s.paused = true);
                if self
                    .resource
                    .permission_reported
                    .swap(true, Ordering::Relaxed)
                {
                    Ok(())
                } else {
                    warn!(target: "mudlink::audio", "playback blocked pending user interaction");
                    Err(PlaybackError::PermissionDenied)
                }
            }
            Err(other) => {
                metrics::inc_playback_errors();
                self.hub.update(|s| s.paused = true);
                warn!(target: "mudlink::audio", "playback failed: {}", other);
                Err(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{resolve_playlist, LogOutput};
    use crate::services::Region;

    fn region(name: &str, tracks: &[&str]) -> PlaylistResolution {
        let region = Region {
            name: name.into(),
            tracks: tracks.iter().map(|t| t.to_string()).collect(),
        };
        resolve_playlist("room", &[], Some(&region))
    }

    #[test]
    fn enabled_state_survives_playlist_switches() {
        let hub = PlaybackHub::new(PlaybackState::default());
        let sync = PlaybackSynchronizer::attach(hub.clone(), LogOutput::boxed);

        tokio_test::block_on(async {
            sync.set_enabled(false).await.unwrap();
            sync.sync(region("forest", &["a.ogg", "b.ogg"])).await.unwrap();
            sync.on_track_end().await.unwrap();
        });
        let state = hub.state();
        assert!(!state.enabled);
        assert_eq!(state.current_track_index, 1);

        tokio_test::block_on(sync.sync(region("coast", &["waves.ogg"]))).unwrap();
        assert_eq!(hub.state().current_track_index, 0);
        assert!(!hub.state().enabled);
        assert_eq!(
            tokio_test::block_on(sync.current_track()).as_deref(),
            Some("waves.ogg")
        );
    }

    #[test]
    fn configure_clamps_volume_without_moving_the_track() {
        let hub = PlaybackHub::new(PlaybackState::default());
        let sync = PlaybackSynchronizer::attach(hub.clone(), LogOutput::boxed);
        tokio_test::block_on(async {
            sync.sync(region("forest", &["a.ogg", "b.ogg"])).await.unwrap();
            sync.on_track_end().await.unwrap();
        });
        hub.configure(true, -2.0);
        assert_eq!(hub.state().volume, 0.0);
        assert_eq!(sync.state().current_track_index, 1);
    }
}
