//! In-process implementation of every service seam, seeded from a JSON world file.

mod local;
mod seed;

pub use local::LocalWorld;
pub use seed::{NpcSeed, RoomSeed, WorldSeed};
