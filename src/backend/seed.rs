//! JSON world seed for the local backend.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::services::{Exit, Npc, Region, RoomDetails};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSeed {
    /// Where observers and new characters appear.
    pub start_room: String,
    #[serde(default)]
    pub regions: Vec<Region>,
    pub rooms: Vec<RoomSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_tracks: Vec<String>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npcs: Vec<NpcSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcSeed {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<String>,
    /// Replies used in turn when someone talks to this NPC.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<String>,
}

impl RoomSeed {
    pub fn details(&self) -> RoomDetails {
        RoomDetails {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            region: self.region.clone(),
            audio_tracks: self.audio_tracks.clone(),
        }
    }
}

impl NpcSeed {
    pub fn npc(&self) -> Npc {
        Npc {
            id: self.id.clone(),
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            portrait: self.portrait.clone(),
        }
    }
}

impl WorldSeed {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read world file {}: {}", path, e))?;
        Self::from_json(&content).map_err(|e| anyhow!("{}: {}", path, e))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let seed: WorldSeed =
            serde_json::from_str(content).map_err(|e| anyhow!("invalid world JSON: {}", e))?;
        seed.validate()?;
        Ok(seed)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write world file {}: {}", path, e))?;
        Ok(())
    }

    /// Check referential integrity: unique ids, known start room, exits and regions that
    /// point somewhere, and no room with two exits in the same direction.
    pub fn validate(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        for room in &self.rooms {
            if room.id.trim().is_empty() {
                bail!("room with empty id");
            }
            if !ids.insert(room.id.as_str()) {
                bail!("duplicate room id '{}'", room.id);
            }
        }
        if !ids.contains(self.start_room.as_str()) {
            bail!("start_room '{}' is not a room", self.start_room);
        }
        let regions: HashSet<&str> = self.regions.iter().map(|r| r.name.as_str()).collect();
        let mut npc_ids: HashSet<&str> = HashSet::new();
        for room in &self.rooms {
            if let Some(region) = room.region.as_deref() {
                if !regions.contains(region) {
                    bail!("room '{}' names unknown region '{}'", room.id, region);
                }
            }
            let mut directions: HashMap<String, &str> = HashMap::new();
            for exit in &room.exits {
                if !ids.contains(exit.to_room.as_str()) {
                    bail!(
                        "exit '{}' of room '{}' leads to unknown room '{}'",
                        exit.direction,
                        room.id,
                        exit.to_room
                    );
                }
                if directions
                    .insert(exit.direction.to_lowercase(), &exit.to_room)
                    .is_some()
                {
                    bail!("room '{}' has two '{}' exits", room.id, exit.direction);
                }
            }
            for npc in &room.npcs {
                if !npc_ids.insert(npc.id.as_str()) {
                    bail!("duplicate npc id '{}'", npc.id);
                }
            }
        }
        Ok(())
    }

    /// A small three-room world used by `mudlink init`.
    pub fn sample() -> Self {
        let exit = |direction: &str, to_room: &str| Exit {
            direction: direction.to_string(),
            to_room: to_room.to_string(),
        };
        WorldSeed {
            start_room: "square".into(),
            regions: vec![
                Region {
                    name: "town".into(),
                    tracks: vec!["audio/town-day.ogg".into(), "audio/town-bustle.ogg".into()],
                },
                Region {
                    name: "wilds".into(),
                    tracks: vec!["audio/wind.ogg".into()],
                },
            ],
            rooms: vec![
                RoomSeed {
                    id: "square".into(),
                    name: "Town Square".into(),
                    description: "Cobblestones ring a dry fountain. A bakery steams to the north."
                        .into(),
                    image: Some("images/square.png".into()),
                    region: Some("town".into()),
                    audio_tracks: vec![],
                    exits: vec![exit("north", "bakery"), exit("northwest", "orchard")],
                    npcs: vec![NpcSeed {
                        id: "crier".into(),
                        name: "Odo the Crier".into(),
                        alias: Some("odo".into()),
                        description: "A hoarse man with a brass bell.".into(),
                        portrait: None,
                        replies: vec![
                            "Hear ye! The orchard gate is open again.".into(),
                            "Mind the fountain, it bites.".into(),
                        ],
                    }],
                },
                RoomSeed {
                    id: "bakery".into(),
                    name: "Mira's Bakery".into(),
                    description: "Warm bread and a counter dusted with flour.".into(),
                    image: None,
                    region: Some("town".into()),
                    audio_tracks: vec!["audio/bakery-hearth.ogg".into()],
                    exits: vec![exit("south", "square")],
                    npcs: vec![NpcSeed {
                        id: "mira".into(),
                        name: "Mira".into(),
                        alias: Some("baker".into()),
                        description: "A flour-dusted baker with quick hands.".into(),
                        portrait: Some("images/mira.png".into()),
                        replies: vec![
                            "Fresh loaves at dawn, dear.".into(),
                            "The orchard apples make the best tarts.".into(),
                        ],
                    }],
                },
                RoomSeed {
                    id: "orchard".into(),
                    name: "Old Orchard".into(),
                    description: "Gnarled trees lean over a broken wall.".into(),
                    image: None,
                    region: Some("wilds".into()),
                    audio_tracks: vec![],
                    exits: vec![exit("southeast", "square")],
                    npcs: vec![],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_world_is_valid_and_round_trips() {
        let sample = WorldSeed::sample();
        sample.validate().unwrap();
        let json = serde_json::to_string(&sample).unwrap();
        let back = WorldSeed::from_json(&json).unwrap();
        assert_eq!(back.rooms.len(), 3);
    }

    #[test]
    fn rejects_dangling_exits_and_unknown_regions() {
        let mut seed = WorldSeed::sample();
        seed.rooms[0].exits.push(Exit {
            direction: "down".into(),
            to_room: "cellar".into(),
        });
        let err = seed.validate().unwrap_err().to_string();
        assert!(err.contains("cellar"), "{err}");

        let mut seed = WorldSeed::sample();
        seed.rooms[2].region = Some("sea".into());
        assert!(seed.validate().is_err());

        let mut seed = WorldSeed::sample();
        seed.start_room = "nowhere".into();
        assert!(seed.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_directions() {
        let mut seed = WorldSeed::sample();
        seed.rooms[1].exits.push(Exit {
            direction: "SOUTH".into(),
            to_room: "orchard".into(),
        });
        assert!(seed.validate().is_err());
    }
}
