//! The acting identity: a full character, or the lightweight observer used before a
//! character is chosen.

use crate::services::{Account, CharacterRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Character {
        id: String,
        name: String,
        current_room: String,
    },
    Observer {
        id: String,
        name: String,
        current_room: String,
    },
}

impl Actor {
    pub fn character(record: CharacterRecord) -> Self {
        Actor::Character {
            id: record.id,
            name: record.name,
            current_room: record.current_room,
        }
    }

    pub fn observer(record: CharacterRecord) -> Self {
        Actor::Observer {
            id: record.id,
            name: record.name,
            current_room: record.current_room,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Character { id, .. } | Actor::Observer { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Actor::Character { name, .. } | Actor::Observer { name, .. } => name,
        }
    }

    pub fn current_room(&self) -> &str {
        match self {
            Actor::Character { current_room, .. } | Actor::Observer { current_room, .. } => {
                current_room
            }
        }
    }

    pub fn is_observer(&self) -> bool {
        matches!(self, Actor::Observer { .. })
    }

    /// Id to send as the acting character; observers act without one.
    pub fn character_id(&self) -> Option<&str> {
        match self {
            Actor::Character { id, .. } => Some(id),
            Actor::Observer { .. } => None,
        }
    }

    pub fn observer_id(&self) -> Option<&str> {
        match self {
            Actor::Observer { id, .. } => Some(id),
            Actor::Character { .. } => None,
        }
    }

    fn set_room(&mut self, room: String) {
        match self {
            Actor::Character { current_room, .. } | Actor::Observer { current_room, .. } => {
                *current_room = room
            }
        }
    }
}

/// Holds the logged-in account and decides which identity is acting.
/// A selected character always wins over the observer.
#[derive(Debug, Default)]
pub struct ActorResolver {
    account: Option<Account>,
    observer: Option<Actor>,
    character: Option<Actor>,
}

impl ActorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a logged-in session acting as the account's observer.
    pub fn establish(&mut self, account: Account, observer: CharacterRecord) {
        self.account = Some(account);
        self.observer = Some(Actor::observer(observer));
        self.character = None;
    }

    pub fn select_character(&mut self, record: CharacterRecord) {
        self.character = Some(Actor::character(record));
    }

    /// Drop the selected character and fall back to the observer. Returns whether a
    /// character was active.
    pub fn disengage(&mut self) -> bool {
        self.character.take().is_some()
    }

    pub fn clear(&mut self) {
        self.account = None;
        self.observer = None;
        self.character = None;
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    pub fn active(&self) -> Option<&Actor> {
        self.character.as_ref().or(self.observer.as_ref())
    }

    /// Apply a location notification. Returns `true` when it moved the active actor.
    pub fn apply_location(&mut self, actor_id: &str, room_id: &str) -> bool {
        let active_id = match self.active() {
            Some(actor) => actor.id().to_string(),
            None => return false,
        };
        for slot in [&mut self.character, &mut self.observer] {
            if let Some(actor) = slot.as_mut().filter(|a| a.id() == actor_id) {
                actor.set_room(room_id.to_string());
            }
        }
        active_id == actor_id
    }
}
