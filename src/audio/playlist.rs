//! Ambient playlist resolution: a room override beats the region default.

use std::fmt;

use crate::services::Region;

/// Where a resolved track list came from. Playback restarts only when this changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Override(String),
    Region(String),
    Silent,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKey::Override(room) => write!(f, "override:{}", room),
            SourceKey::Region(name) => write!(f, "region:{}", name),
            SourceKey::Silent => f.write_str("silent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistResolution {
    pub tracks: Vec<String>,
    pub source: SourceKey,
}

impl PlaylistResolution {
    pub fn silent() -> Self {
        Self {
            tracks: Vec::new(),
            source: SourceKey::Silent,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Resolve the tracks for a room: a non-empty override always wins, otherwise the
/// region's defaults, otherwise silence.
pub fn resolve_playlist(
    room_id: &str,
    override_tracks: &[String],
    region: Option<&Region>,
) -> PlaylistResolution {
    if !override_tracks.is_empty() {
        return PlaylistResolution {
            tracks: override_tracks.to_vec(),
            source: SourceKey::Override(room_id.to_string()),
        };
    }
    match region {
        Some(region) if !region.tracks.is_empty() => PlaylistResolution {
            tracks: region.tracks.clone(),
            source: SourceKey::Region(region.name.clone()),
        },
        _ => PlaylistResolution::silent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forest() -> Region {
        Region {
            name: "forest".into(),
            tracks: vec!["forest/a.ogg".into(), "forest/b.ogg".into(), "forest/c.ogg".into()],
        }
    }

    #[test]
    fn override_wins_even_when_shorter() {
        let over = vec!["glade.ogg".to_string()];
        let res = resolve_playlist("glade", &over, Some(&forest()));
        assert_eq!(res.tracks, over);
        assert_eq!(res.source.to_string(), "override:glade");
    }

    #[test]
    fn region_default_then_silence() {
        let res = resolve_playlist("path", &[], Some(&forest()));
        assert_eq!(res.source, SourceKey::Region("forest".into()));
        assert_eq!(res.tracks.len(), 3);

        let empty_region = Region {
            name: "void".into(),
            tracks: vec![],
        };
        assert!(resolve_playlist("x", &[], Some(&empty_region)).is_silent());
        assert_eq!(resolve_playlist("x", &[], None).source, SourceKey::Silent);
    }
}
