//! Seams to the remote authority: command execution, realtime channels, the world store,
//! and authentication. The engine only ever talks to these traits; `backend::LocalWorld`
//! is the in-process implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::conversation::ConversationTurn;

/// Failure reported by an external collaborator, carrying its detail text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(detail: impl Into<String>) -> Self {
        ServiceError(detail.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Wire-level kind of a room message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Say,
    NpcSpeech,
    NpcWhisper,
    NpcTyping,
    Whisper,
    System,
    #[serde(other)]
    Other,
}

/// Inbound realtime event record. `target_character_id = None` means public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub target_character_id: Option<String>,
    pub kind: MessageKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Row-change notification: an actor's room field changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationChange {
    pub actor_id: String,
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetails {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Room-specific ambient tracks; when non-empty they replace the region default.
    #[serde(default)]
    pub audio_tracks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub direction: String,
    pub to_room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub portrait: Option<String>,
}

impl Npc {
    /// The handle players type to address this NPC.
    pub fn handle(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Case-insensitive match against alias or name.
    pub fn answers_to(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query)
            || self
                .alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(query))
    }
}

/// A character (or the lightweight observer identity) as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: String,
    pub name: String,
    pub current_room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub email: String,
}

/// A world action handed to the command-execution service.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub text: String,
    /// Acting character; `None` while acting as the observer.
    pub character_id: Option<String>,
    pub observer_id: Option<String>,
    pub room_id: String,
    pub conversation: Option<Vec<ConversationTurn>>,
}

/// Open realtime subscription to one room. Dropping it closes the transport channel.
#[derive(Debug)]
pub struct RoomFeed {
    pub room_id: String,
    rx: broadcast::Receiver<RoomMessage>,
}

impl RoomFeed {
    pub fn new(room_id: impl Into<String>, rx: broadcast::Receiver<RoomMessage>) -> Self {
        Self {
            room_id: room_id.into(),
            rx,
        }
    }

    /// Next message in arrival order; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<RoomMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "mudlink::channel", "room {} feed lagged; skipped {} messages", self.room_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Stream of actor location changes.
#[derive(Debug)]
pub struct LocationFeed {
    rx: broadcast::Receiver<LocationChange>,
}

impl LocationFeed {
    pub fn new(rx: broadcast::Receiver<LocationChange>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<LocationChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "mudlink::channel", "location feed lagged; skipped {} changes", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait CommandService: Send + Sync {
    /// Enqueue a world action. Results arrive on the realtime channel, not here.
    async fn submit(&self, request: SubmitRequest) -> ServiceResult<()>;
}

#[async_trait]
pub trait RealtimeService: Send + Sync {
    async fn subscribe_room(&self, room_id: &str) -> ServiceResult<RoomFeed>;
    async fn watch_locations(&self) -> ServiceResult<LocationFeed>;
}

#[async_trait]
pub trait WorldStore: Send + Sync {
    async fn room(&self, room_id: &str) -> ServiceResult<RoomDetails>;
    async fn exits(&self, room_id: &str) -> ServiceResult<Vec<Exit>>;
    async fn npcs(&self, room_id: &str) -> ServiceResult<Vec<Npc>>;
    async fn characters_in_room(&self, room_id: &str) -> ServiceResult<Vec<CharacterRecord>>;
    async fn characters_for(&self, user_id: &str) -> ServiceResult<Vec<CharacterRecord>>;
    async fn create_character(&self, user_id: &str, name: &str) -> ServiceResult<CharacterRecord>;
    async fn observer_for(&self, user_id: &str) -> ServiceResult<CharacterRecord>;
    async fn region(&self, name: &str) -> ServiceResult<Option<Region>>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Account>;
    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<Account>;
    async fn request_password_reset(&self, email: &str) -> ServiceResult<()>;
    async fn sign_out(&self, user_id: &str) -> ServiceResult<()>;
}

/// The collaborators a session talks to.
#[derive(Clone)]
pub struct Services {
    pub commands: Arc<dyn CommandService>,
    pub realtime: Arc<dyn RealtimeService>,
    pub store: Arc<dyn WorldStore>,
    pub auth: Arc<dyn AuthService>,
}

impl Services {
    /// Use one backend object for every seam.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CommandService + RealtimeService + WorldStore + AuthService + 'static,
    {
        Self {
            commands: backend.clone(),
            realtime: backend.clone(),
            store: backend.clone(),
            auth: backend,
        }
    }
}
