//! Turns inbound room messages into display lines.
//!
//! Rendering is pure: the same message and NPC roster always yield the same line (apart
//! from its fresh id). Marker text embedded by the server (`[IMAGE:...]`, `[PORTRAIT:...]`,
//! `[NPCALIAS:...]`, and the `[LOCATION:...]`/`[EXITS]`/`[NPCs]`/`[CHARACTERS]` section
//! headers) is lifted into [`Directive`]s and [`Section`]s.

use crate::services::{MessageKind, Npc, RoomMessage};

use super::display::{Directive, DisplayLine, LineKind, RenderHints, Section, SectionKind};

const WHISPER_MARKER: &str = " whispers to you:";

/// What the renderer needs to know about the viewer and the room.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub self_id: Option<&'a str>,
    pub npcs: &'a [Npc],
}

pub fn render(msg: &RoomMessage, ctx: &RenderContext<'_>) -> DisplayLine {
    let own = match (ctx.self_id, msg.character_id.as_deref()) {
        (Some(me), Some(author)) => me == author,
        _ => false,
    };
    let author = msg.character_name.as_deref().unwrap_or("Someone");

    match msg.kind {
        MessageKind::Say => {
            let (directives, body) = extract_directives(&msg.body);
            let hints = RenderHints {
                directives,
                speaker: Some(author.to_string()),
                own,
                ..RenderHints::default()
            };
            DisplayLine::new(LineKind::Dialogue, format!("{}: {}", author, body)).with_hints(hints)
        }
        MessageKind::NpcSpeech | MessageKind::NpcWhisper => render_npc_speech(msg, ctx),
        MessageKind::NpcTyping => {
            let name = msg
                .character_name
                .clone()
                .unwrap_or_else(|| msg.body.trim().to_string());
            let hints = RenderHints {
                speaker: Some(name.clone()),
                transient: true,
                ..RenderHints::default()
            };
            DisplayLine::new(LineKind::Dialogue, format!("{} is thinking", name)).with_hints(hints)
        }
        MessageKind::Whisper => {
            let (directives, body) = extract_directives(&msg.body);
            let text = if own {
                format!("You whisper: {}", body)
            } else {
                format!("{} whispers to you: {}", author, body)
            };
            let hints = RenderHints {
                directives,
                speaker: Some(author.to_string()),
                own,
                private: true,
                ..RenderHints::default()
            };
            DisplayLine::new(LineKind::Dialogue, text).with_hints(hints)
        }
        MessageKind::System => {
            let (directives, body) = extract_directives(&msg.body);
            let (preamble, sections) = parse_sections(&body);
            let hints = RenderHints {
                directives,
                sections,
                private: msg.target_character_id.is_some(),
                ..RenderHints::default()
            };
            DisplayLine::new(LineKind::System, preamble).with_hints(hints)
        }
        MessageKind::Other => {
            let (directives, body) = extract_directives(&msg.body);
            let hints = RenderHints {
                directives,
                speaker: msg.character_name.clone(),
                own,
                ..RenderHints::default()
            };
            DisplayLine::new(LineKind::Relay, body).with_hints(hints)
        }
    }
}

fn render_npc_speech(msg: &RoomMessage, ctx: &RenderContext<'_>) -> DisplayLine {
    let (mut directives, body) = extract_directives(&msg.body);
    let speaker = speaker_segment(&body, msg.kind == MessageKind::NpcWhisper)
        .or(msg.character_name.as_deref())
        .map(str::trim)
        .map(str::to_string);

    let npc = speaker
        .as_deref()
        .and_then(|name| ctx.npcs.iter().find(|npc| npc.answers_to(name)));
    if let Some(npc) = npc {
        if let Some(portrait) = npc.portrait.as_deref() {
            let mut prefix = vec![
                Directive::Portrait(portrait.to_string()),
                Directive::NpcAlias(npc.handle().to_string()),
            ];
            prefix.append(&mut directives);
            directives = prefix;
        }
    }

    let hints = RenderHints {
        directives,
        speaker: npc.map(|n| n.name.clone()).or(speaker),
        private: msg.kind == MessageKind::NpcWhisper,
        ..RenderHints::default()
    };
    DisplayLine::new(LineKind::Dialogue, body).with_hints(hints)
}

/// Name preceding `whispers to you:` (whispers) or the first colon.
fn speaker_segment(body: &str, whisper: bool) -> Option<&str> {
    if whisper {
        if let Some(idx) = body.find(WHISPER_MARKER) {
            return Some(&body[..idx]);
        }
    }
    body.split_once(':')
        .map(|(name, _)| name)
        .filter(|name| !name.trim().is_empty())
}

/// Pull inline image/portrait/alias markers out of text, returning them in order of
/// appearance along with the remaining text.
pub fn extract_directives(text: &str) -> (Vec<Directive>, String) {
    let mut directives = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('[') {
        let candidate = &rest[start..];
        let parsed = candidate.find(']').and_then(|end| {
            let inner = &candidate[1..end];
            let (tag, value) = inner.split_once(':')?;
            let value = value.trim().to_string();
            let directive = match tag {
                "IMAGE" => Directive::Image(value),
                "PORTRAIT" => Directive::Portrait(value),
                "NPCALIAS" => Directive::NpcAlias(value),
                _ => return None,
            };
            Some((directive, end))
        });
        match parsed {
            Some((directive, end)) => {
                out.push_str(&rest[..start]);
                directives.push(directive);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push_str(&rest[..=start]);
                rest = &rest[start + 1..];
            }
        }
    }
    out.push_str(rest);
    (directives, out.trim().to_string())
}

fn section_marker(line: &str) -> Option<(SectionKind, &str)> {
    let line = line.trim_start();
    if let Some(after) = line.strip_prefix("[LOCATION:") {
        let end = after.find(']')?;
        return Some((
            SectionKind::Location(after[..end].trim().to_string()),
            &after[end + 1..],
        ));
    }
    for (marker, kind) in [
        ("[EXITS]", SectionKind::Exits),
        ("[NPCs]", SectionKind::Npcs),
        ("[NPCS]", SectionKind::Npcs),
        ("[CHARACTERS]", SectionKind::Characters),
    ] {
        if let Some(after) = line.strip_prefix(marker) {
            return Some((kind, after));
        }
    }
    None
}

/// Split a system body into its leading plain text and any marked sections.
pub fn parse_sections(body: &str) -> (String, Vec<Section>) {
    let mut preamble: Vec<&str> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();

    for line in body.lines() {
        if let Some((kind, trailing)) = section_marker(line) {
            let mut section = Section::new(kind);
            let trailing = trailing.trim();
            if !trailing.is_empty() {
                section.lines.push(trailing.to_string());
            }
            sections.push(section);
            continue;
        }
        match sections.last_mut() {
            Some(section) => {
                if !line.trim().is_empty() {
                    section.lines.push(line.trim().to_string());
                }
            }
            None => preamble.push(line),
        }
    }

    (preamble.join("\n").trim().to_string(), sections)
}
