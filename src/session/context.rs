//! What the session knows about the room it is standing in.

use crate::audio::{resolve_playlist, PlaylistResolution};
use crate::services::{
    CharacterRecord, Exit, Npc, Region, RoomDetails, ServiceResult, WorldStore,
};

#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room: RoomDetails,
    pub exits: Vec<Exit>,
    pub npcs: Vec<Npc>,
    pub characters_here: Vec<CharacterRecord>,
    pub region: Option<Region>,
}

/// Result of a background context load, tagged with what was current when it started.
#[derive(Debug)]
pub struct ContextLoaded {
    pub room_id: String,
    pub actor_id: String,
    /// Submit the arrival `look` once applied.
    pub announce: bool,
    pub result: ServiceResult<RoomContext>,
}

impl RoomContext {
    /// Fetch everything about a room. Each lookup is a suspension point; the caller decides
    /// whether the result is still relevant once it resolves.
    pub async fn load(store: &dyn WorldStore, room_id: &str) -> ServiceResult<Self> {
        let room = store.room(room_id).await?;
        let exits = store.exits(room_id).await?;
        let npcs = store.npcs(room_id).await?;
        let characters_here = store.characters_in_room(room_id).await?;
        let region = match room.region.as_deref() {
            Some(name) => store.region(name).await?,
            None => None,
        };
        Ok(Self {
            room,
            exits,
            npcs,
            characters_here,
            region,
        })
    }

    pub fn exit_names(&self) -> Vec<String> {
        self.exits.iter().map(|e| e.direction.clone()).collect()
    }

    /// Names of everyone present except `self_id`.
    pub fn others_here(&self, self_id: Option<&str>) -> Vec<String> {
        self.characters_here
            .iter()
            .filter(|c| Some(c.id.as_str()) != self_id)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn find_npc(&self, query: &str) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.answers_to(query))
    }

    pub fn playlist(&self) -> PlaylistResolution {
        resolve_playlist(&self.room.id, &self.room.audio_tracks, self.region.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RoomContext {
        RoomContext {
            room: RoomDetails {
                id: "square".into(),
                name: "Town Square".into(),
                description: String::new(),
                image: None,
                region: Some("town".into()),
                audio_tracks: vec![],
            },
            exits: vec![Exit {
                direction: "north".into(),
                to_room: "gate".into(),
            }],
            npcs: vec![Npc {
                id: "n1".into(),
                name: "Mira".into(),
                alias: Some("baker".into()),
                description: String::new(),
                portrait: None,
            }],
            characters_here: vec![
                CharacterRecord {
                    id: "c1".into(),
                    name: "Aria".into(),
                    current_room: "square".into(),
                },
                CharacterRecord {
                    id: "c2".into(),
                    name: "Bram".into(),
                    current_room: "square".into(),
                },
            ],
            region: Some(Region {
                name: "town".into(),
                tracks: vec!["town.ogg".into()],
            }),
        }
    }

    #[test]
    fn lookups_and_playlist() {
        let ctx = context();
        assert_eq!(ctx.exit_names(), vec!["north"]);
        assert_eq!(ctx.others_here(Some("c1")), vec!["Bram"]);
        assert_eq!(ctx.find_npc("BAKER").map(|n| n.id.as_str()), Some("n1"));
        assert!(ctx.find_npc("odo").is_none());
        assert_eq!(ctx.playlist().source.to_string(), "region:town");
    }
}
