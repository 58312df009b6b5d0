//! In-process world authority: accounts, characters, and a minimal command handler that
//! answers through per-room broadcast buses, the same way a remote service would.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, trace};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::logutil::{escape_log, mask_email};
use crate::services::{
    Account, AuthService, CharacterRecord, CommandService, Exit, LocationChange, LocationFeed,
    MessageKind, Npc, RealtimeService, Region, RoomDetails, RoomFeed, RoomMessage, ServiceError,
    ServiceResult, SubmitRequest, WorldStore,
};
use crate::validation::is_plausible_email;

use super::seed::{RoomSeed, WorldSeed};

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct AccountRecord {
    user_id: String,
    email: String,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct CharacterState {
    record: CharacterRecord,
    user_id: String,
}

#[derive(Debug, Default)]
struct WorldState {
    /// Keyed by lowercased email.
    accounts: HashMap<String, AccountRecord>,
    characters: HashMap<String, CharacterState>,
    /// Keyed by user id.
    observers: HashMap<String, CharacterRecord>,
    /// Next reply index per NPC id.
    npc_turns: HashMap<String, usize>,
}

/// Who is acting on a submission, resolved against world state.
#[derive(Debug, Clone)]
struct Acting {
    id: String,
    name: String,
    room: String,
    is_character: bool,
}

pub struct LocalWorld {
    start_room: String,
    rooms: HashMap<String, RoomSeed>,
    regions: HashMap<String, Region>,
    argon2: Argon2<'static>,
    state: Mutex<WorldState>,
    buses: Mutex<HashMap<String, broadcast::Sender<RoomMessage>>>,
    locations: broadcast::Sender<LocationChange>,
}

impl std::fmt::Debug for LocalWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWorld")
            .field("start_room", &self.start_room)
            .field("rooms", &self.rooms.len())
            .finish_non_exhaustive()
    }
}

impl LocalWorld {
    pub fn new(seed: WorldSeed) -> Result<Self> {
        Self::build(seed, Argon2::default())
    }

    /// Use explicit Argon2id parameters (tests use cheap ones).
    pub fn with_params(seed: WorldSeed, params: Params) -> Result<Self> {
        Self::build(seed, Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn build(seed: WorldSeed, argon2: Argon2<'static>) -> Result<Self> {
        seed.validate()?;
        let (locations, _) = broadcast::channel(BUS_CAPACITY);
        Ok(Self {
            start_room: seed.start_room,
            rooms: seed.rooms.into_iter().map(|r| (r.id.clone(), r)).collect(),
            regions: seed.regions.into_iter().map(|r| (r.name.clone(), r)).collect(),
            argon2,
            state: Mutex::new(WorldState::default()),
            buses: Mutex::new(HashMap::new()),
            locations,
        })
    }

    pub async fn from_file(path: &str) -> Result<Self> {
        Self::new(WorldSeed::load(path).await?)
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bus(&self, room_id: &str) -> broadcast::Sender<RoomMessage> {
        let mut buses = self.buses.lock().unwrap_or_else(|e| e.into_inner());
        buses
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(BUS_CAPACITY).0)
            .clone()
    }

    /// Publish a message on its room's bus. Messages with no listener are dropped.
    pub fn broadcast(&self, msg: RoomMessage) {
        trace!("publish {:?} in {}: {}", msg.kind, msg.room_id, escape_log(&msg.body));
        let bus = self.bus(&msg.room_id);
        if bus.send(msg).is_err() {
            trace!("no listeners");
        }
    }

    fn room_seed(&self, room_id: &str) -> ServiceResult<&RoomSeed> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| ServiceError::new(format!("No such room '{}'", room_id)))
    }

    fn hash_password(&self, password: &str) -> ServiceResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ServiceError::new(format!("Password hash failure: {e}")))
    }

    fn resolve_actor(&self, request: &SubmitRequest) -> ServiceResult<Acting> {
        let state = self.state();
        if let Some(id) = request.character_id.as_deref() {
            let ch = state
                .characters
                .get(id)
                .ok_or_else(|| ServiceError::new("Unknown character"))?;
            return Ok(Acting {
                id: ch.record.id.clone(),
                name: ch.record.name.clone(),
                room: ch.record.current_room.clone(),
                is_character: true,
            });
        }
        let id = request
            .observer_id
            .as_deref()
            .ok_or_else(|| ServiceError::new("No acting identity"))?;
        state
            .observers
            .values()
            .find(|o| o.id == id)
            .map(|o| Acting {
                id: o.id.clone(),
                name: o.name.clone(),
                room: o.current_room.clone(),
                is_character: false,
            })
            .ok_or_else(|| ServiceError::new("Unknown observer"))
    }

    fn characters_here(&self, room_id: &str) -> Vec<CharacterRecord> {
        let mut here: Vec<CharacterRecord> = self
            .state()
            .characters
            .values()
            .filter(|c| c.record.current_room == room_id)
            .map(|c| c.record.clone())
            .collect();
        here.sort_by(|a, b| a.name.cmp(&b.name));
        here
    }

    fn message(room_id: &str, kind: MessageKind, body: impl Into<String>) -> RoomMessage {
        RoomMessage {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            character_id: None,
            character_name: None,
            target_character_id: None,
            kind,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    fn tell(&self, actor: &Acting, body: impl Into<String>) {
        let mut msg = Self::message(&actor.room, MessageKind::System, body);
        msg.target_character_id = Some(actor.id.clone());
        self.broadcast(msg);
    }

    fn describe(&self, room: &RoomSeed) -> String {
        let mut out = String::new();
        if let Some(image) = &room.image {
            out.push_str(&format!("[IMAGE:{}]", image));
        }
        out.push_str(&format!("[LOCATION:{}]\n{}", room.name, room.description));
        let exits: Vec<&str> = room.exits.iter().map(|e| e.direction.as_str()).collect();
        if !exits.is_empty() {
            out.push_str(&format!("\n[EXITS]\n{}", exits.join(", ")));
        }
        if !room.npcs.is_empty() {
            let names: Vec<&str> = room.npcs.iter().map(|n| n.name.as_str()).collect();
            out.push_str(&format!("\n[NPCs]\n{}", names.join(", ")));
        }
        let here = self.characters_here(&room.id);
        if !here.is_empty() {
            let names: Vec<&str> = here.iter().map(|c| c.name.as_str()).collect();
            out.push_str(&format!("\n[CHARACTERS]\n{}", names.join(", ")));
        }
        out
    }

    fn do_move(&self, actor: &Acting, direction: &str) -> ServiceResult<()> {
        let room = self.room_seed(&actor.room)?;
        let Some(exit) = room
            .exits
            .iter()
            .find(|e| e.direction.eq_ignore_ascii_case(direction))
        else {
            self.tell(actor, "You can't go that way.");
            return Ok(());
        };
        let destination = exit.to_room.clone();
        {
            let mut state = self.state();
            if actor.is_character {
                if let Some(ch) = state.characters.get_mut(&actor.id) {
                    ch.record.current_room = destination.clone();
                }
            } else if let Some(obs) = state.observers.values_mut().find(|o| o.id == actor.id) {
                obs.current_room = destination.clone();
            }
        }
        debug!("{} moved {} to {}", actor.name, exit.direction, destination);
        if actor.is_character {
            self.broadcast(Self::message(
                &actor.room,
                MessageKind::System,
                format!("{} leaves {}.", actor.name, exit.direction),
            ));
            self.broadcast(Self::message(
                &destination,
                MessageKind::System,
                format!("{} arrives.", actor.name),
            ));
        }
        if self
            .locations
            .send(LocationChange {
                actor_id: actor.id.clone(),
                room_id: destination,
            })
            .is_err()
        {
            trace!("no location listeners");
        }
        Ok(())
    }

    fn do_talk(&self, actor: &Acting, rest: &str) -> ServiceResult<()> {
        let room = self.room_seed(&actor.room)?;
        let (target, _message) = rest.split_once(' ').unwrap_or((rest, ""));
        let Some(npc) = room.npcs.iter().find(|n| n.npc().answers_to(target)) else {
            self.tell(actor, format!("There is no one called {} here.", target));
            return Ok(());
        };
        let reply = {
            let mut state = self.state();
            let turn = state.npc_turns.entry(npc.id.clone()).or_insert(0);
            let reply = npc
                .replies
                .get(*turn % npc.replies.len().max(1))
                .cloned()
                .unwrap_or_else(|| "...".to_string());
            *turn += 1;
            reply
        };
        let mut typing = Self::message(&actor.room, MessageKind::NpcTyping, "");
        typing.character_name = Some(npc.name.clone());
        self.broadcast(typing);
        let mut speech = Self::message(
            &actor.room,
            MessageKind::NpcSpeech,
            format!("{}: {}", npc.name, reply),
        );
        speech.character_name = Some(npc.name.clone());
        self.broadcast(speech);
        Ok(())
    }

    fn do_whisper(&self, actor: &Acting, rest: &str) -> ServiceResult<()> {
        let (target, body) = rest.split_once(' ').unwrap_or((rest, ""));
        let recipient = self
            .characters_here(&actor.room)
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(target));
        let Some(recipient) = recipient else {
            self.tell(actor, format!("{} is not here.", target));
            return Ok(());
        };
        for target_id in [recipient.id.clone(), actor.id.clone()] {
            let mut msg = Self::message(&actor.room, MessageKind::Whisper, body.trim());
            msg.character_id = Some(actor.id.clone());
            msg.character_name = Some(actor.name.clone());
            msg.target_character_id = Some(target_id);
            self.broadcast(msg);
        }
        Ok(())
    }

    fn do_inspect(&self, actor: &Acting, target: &str) -> ServiceResult<()> {
        let room = self.room_seed(&actor.room)?;
        if let Some(npc) = room.npcs.iter().find(|n| n.npc().answers_to(target)) {
            let mut text = String::new();
            if let Some(portrait) = &npc.portrait {
                text.push_str(&format!("[IMAGE:{}]", portrait));
            }
            text.push_str(&format!("{}: {}", npc.name, npc.description));
            self.tell(actor, text);
            return Ok(());
        }
        match self
            .characters_here(&actor.room)
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(target))
        {
            Some(c) => self.tell(actor, format!("You see {}, going about their business.", c.name)),
            None => self.tell(actor, "You don't see that here."),
        }
        Ok(())
    }
}

#[async_trait]
impl CommandService for LocalWorld {
    async fn submit(&self, request: SubmitRequest) -> ServiceResult<()> {
        let actor = self.resolve_actor(&request)?;
        let text = request.text.trim();
        let (verb, rest) = match text.split_once(' ') {
            Some((verb, rest)) => (verb.to_lowercase(), rest.trim()),
            None => (text.to_lowercase(), ""),
        };
        debug!("{} submits '{}'", actor.name, escape_log(text));

        match verb.as_str() {
            "say" => {
                if !actor.is_character {
                    self.tell(&actor, "Observers cannot speak. ENTER a character first.");
                    return Ok(());
                }
                let mut msg = Self::message(&actor.room, MessageKind::Say, rest);
                msg.character_id = Some(actor.id.clone());
                msg.character_name = Some(actor.name.clone());
                self.broadcast(msg);
            }
            "look" => {
                let description = self.describe(self.room_seed(&actor.room)?);
                self.tell(&actor, description);
            }
            "exits" => {
                let room = self.room_seed(&actor.room)?;
                let exits: Vec<&str> = room.exits.iter().map(|e| e.direction.as_str()).collect();
                self.tell(&actor, format!("Exits: {}", exits.join(", ")));
            }
            "go" => self.do_move(&actor, rest)?,
            "who" => {
                let names: Vec<String> = self
                    .characters_here(&actor.room)
                    .into_iter()
                    .map(|c| c.name)
                    .collect();
                if names.is_empty() {
                    self.tell(&actor, "No one else is here.");
                } else {
                    self.tell(&actor, format!("Here: {}", names.join(", ")));
                }
            }
            "inspect" => self.do_inspect(&actor, rest)?,
            "talk" => self.do_talk(&actor, rest)?,
            "pet" => {
                let mut msg = Self::message(
                    &actor.room,
                    MessageKind::System,
                    format!("{} pets {}.", actor.name, rest),
                );
                msg.character_id = Some(actor.id.clone());
                self.broadcast(msg);
            }
            "whisper" => self.do_whisper(&actor, rest)?,
            _ => {
                let mut msg = Self::message(
                    &actor.room,
                    MessageKind::Other,
                    format!("{} {}", actor.name, text),
                );
                msg.character_id = Some(actor.id.clone());
                msg.character_name = Some(actor.name.clone());
                self.broadcast(msg);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeService for LocalWorld {
    async fn subscribe_room(&self, room_id: &str) -> ServiceResult<RoomFeed> {
        self.room_seed(room_id)?;
        Ok(RoomFeed::new(room_id, self.bus(room_id).subscribe()))
    }

    async fn watch_locations(&self) -> ServiceResult<LocationFeed> {
        Ok(LocationFeed::new(self.locations.subscribe()))
    }
}

#[async_trait]
impl WorldStore for LocalWorld {
    async fn room(&self, room_id: &str) -> ServiceResult<RoomDetails> {
        Ok(self.room_seed(room_id)?.details())
    }

    async fn exits(&self, room_id: &str) -> ServiceResult<Vec<Exit>> {
        Ok(self.room_seed(room_id)?.exits.clone())
    }

    async fn npcs(&self, room_id: &str) -> ServiceResult<Vec<Npc>> {
        Ok(self.room_seed(room_id)?.npcs.iter().map(|n| n.npc()).collect())
    }

    async fn characters_in_room(&self, room_id: &str) -> ServiceResult<Vec<CharacterRecord>> {
        Ok(self.characters_here(room_id))
    }

    async fn characters_for(&self, user_id: &str) -> ServiceResult<Vec<CharacterRecord>> {
        let mut mine: Vec<CharacterRecord> = self
            .state()
            .characters
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.record.clone())
            .collect();
        mine.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(mine)
    }

    async fn create_character(&self, user_id: &str, name: &str) -> ServiceResult<CharacterRecord> {
        let mut state = self.state();
        if state
            .characters
            .values()
            .any(|c| c.record.name.eq_ignore_ascii_case(name))
        {
            return Err(ServiceError::new(format!("The name {} is taken.", name)));
        }
        let record = CharacterRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            current_room: self.start_room.clone(),
        };
        state.characters.insert(
            record.id.clone(),
            CharacterState {
                record: record.clone(),
                user_id: user_id.to_string(),
            },
        );
        Ok(record)
    }

    async fn observer_for(&self, user_id: &str) -> ServiceResult<CharacterRecord> {
        let mut state = self.state();
        let observer = state
            .observers
            .entry(user_id.to_string())
            .or_insert_with(|| CharacterRecord {
                id: Uuid::new_v4().to_string(),
                name: "Observer".to_string(),
                current_room: self.start_room.clone(),
            });
        Ok(observer.clone())
    }

    async fn region(&self, name: &str) -> ServiceResult<Option<Region>> {
        Ok(self.regions.get(name).cloned())
    }
}

#[async_trait]
impl AuthService for LocalWorld {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Account> {
        let record = self.state().accounts.get(&email.to_lowercase()).cloned();
        let invalid = || ServiceError::new("Invalid email or password.");
        let record = record.ok_or_else(invalid)?;
        let parsed = PasswordHash::new(&record.password_hash)
            .map_err(|e| ServiceError::new(format!("Corrupt password hash: {e}")))?;
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| invalid())?;
        Ok(Account {
            user_id: record.user_id,
            email: record.email,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<Account> {
        if !is_plausible_email(email) {
            return Err(ServiceError::new("That doesn't look like an email address."));
        }
        let key = email.to_lowercase();
        if self.state().accounts.contains_key(&key) {
            return Err(ServiceError::new("An account with that email already exists."));
        }
        let password_hash = self.hash_password(password)?;
        let record = AccountRecord {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
        };
        let mut state = self.state();
        if state.accounts.contains_key(&key) {
            return Err(ServiceError::new("An account with that email already exists."));
        }
        state.accounts.insert(key, record.clone());
        info!("registered account {}", mask_email(email));
        Ok(Account {
            user_id: record.user_id,
            email: record.email,
        })
    }

    async fn request_password_reset(&self, email: &str) -> ServiceResult<()> {
        let known = self.state().accounts.contains_key(&email.to_lowercase());
        info!(
            "password reset requested for {} (known: {})",
            mask_email(email),
            known
        );
        Ok(())
    }

    async fn sign_out(&self, user_id: &str) -> ServiceResult<()> {
        debug!("signed out {}", user_id);
        Ok(())
    }
}
