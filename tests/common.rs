//! Test utilities & fixtures.
//! Builds sessions against the in-process world with cheap password hashing, and records
//! every submission so tests can assert on what reached the command service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use argon2::Params;
use async_trait::async_trait;
use chrono::Utc;
use mudlink::audio::{LogOutput, PlaybackHub, PlaybackState, PlaybackSynchronizer};
use mudlink::backend::{LocalWorld, WorldSeed};
use mudlink::config::SessionConfig;
use mudlink::services::{
    CommandService, MessageKind, RoomMessage, ServiceResult, Services, SubmitRequest,
};
use mudlink::session::Session;

/// Forwards to the world after remembering the request.
pub struct RecordingCommands {
    inner: Arc<LocalWorld>,
    sent: Mutex<Vec<SubmitRequest>>,
}

#[allow(dead_code)]
impl RecordingCommands {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.text.clone()).collect()
    }

    pub fn sent(&self) -> Vec<SubmitRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SubmitRequest> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CommandService for RecordingCommands {
    async fn submit(&self, request: SubmitRequest) -> ServiceResult<()> {
        self.sent.lock().unwrap().push(request.clone());
        self.inner.submit(request).await
    }
}

pub fn world() -> Arc<LocalWorld> {
    let params = Params::new(1024, 1, 1, None).expect("argon2 params");
    Arc::new(LocalWorld::with_params(WorldSeed::sample(), params).expect("sample world"))
}

#[allow(dead_code)]
pub fn services_for(world: &Arc<LocalWorld>) -> (Services, Arc<RecordingCommands>) {
    let recorder = Arc::new(RecordingCommands {
        inner: world.clone(),
        sent: Mutex::new(Vec::new()),
    });
    let mut services = Services::from_backend(world.clone());
    services.commands = recorder.clone();
    (services, recorder)
}

#[allow(dead_code)]
pub fn session_for(world: &Arc<LocalWorld>) -> (Session, Arc<RecordingCommands>) {
    let (services, recorder) = services_for(world);
    let playback =
        PlaybackSynchronizer::attach(PlaybackHub::new(PlaybackState::default()), LogOutput::boxed);
    (Session::new(SessionConfig::default(), services, playback), recorder)
}

#[allow(dead_code)]
pub async fn settle(session: &mut Session) {
    session.settle(Duration::from_millis(150)).await;
}

/// Register a fresh account and wait for the observer's room to load.
#[allow(dead_code)]
pub async fn register(session: &mut Session, email: &str, password: &str) {
    for line in ["register", email, password, password] {
        session.handle_input(line).await;
    }
    settle(session).await;
}

/// Register, create a character and take control of it.
#[allow(dead_code)]
pub async fn play_as(session: &mut Session, email: &str, name: &str) {
    register(session, email, "secret1").await;
    session.handle_input(&format!("create {}", name)).await;
    session.handle_input(&format!("enter {}", name)).await;
    settle(session).await;
}

#[allow(dead_code)]
pub fn texts(session: &Session) -> Vec<String> {
    session.display().iter().map(|l| l.text.clone()).collect()
}

#[allow(dead_code)]
pub fn message(id: &str, room: &str, body: &str) -> RoomMessage {
    RoomMessage {
        id: id.to_string(),
        room_id: room.to_string(),
        character_id: None,
        character_name: None,
        target_character_id: None,
        kind: MessageKind::System,
        body: body.to_string(),
        created_at: Utc::now(),
    }
}
