//! Display lines and the bounded, ordered transcript they are appended to.
//!
//! Embedded presentation directives are kept as tagged values ([`Directive`], [`Section`])
//! while inside the engine and only serialised to `[IMAGE:...]`-style markers by
//! [`DisplayLine::to_markup`] at the presentation boundary.

use std::collections::VecDeque;
use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    System,
    Input,
    Help,
    Error,
    Dialogue,
    Relay,
}

/// Inline presentation directive attached to a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Image(String),
    Portrait(String),
    NpcAlias(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Image(url) => write!(f, "[IMAGE:{}]", url),
            Directive::Portrait(url) => write!(f, "[PORTRAIT:{}]", url),
            Directive::NpcAlias(alias) => write!(f, "[NPCALIAS:{}]", alias),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Location(String),
    Exits,
    Npcs,
    Characters,
}

/// A decorated block of a system message (room name, exit list, and so on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            lines: Vec::new(),
        }
    }

    fn marker(&self) -> String {
        match &self.kind {
            SectionKind::Location(name) => format!("[LOCATION:{}]", name),
            SectionKind::Exits => "[EXITS]".to_string(),
            SectionKind::Npcs => "[NPCs]".to_string(),
            SectionKind::Characters => "[CHARACTERS]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderHints {
    pub directives: Vec<Directive>,
    pub sections: Vec<Section>,
    /// Who produced the line, when there is a speaker.
    pub speaker: Option<String>,
    /// Produced by the local actor.
    pub own: bool,
    /// Visible only to this actor.
    pub private: bool,
    /// Indicator with no persistence guarantee (typing ellipsis).
    pub transient: bool,
    /// Echo of a password step.
    pub masked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub id: Uuid,
    pub kind: LineKind,
    pub text: String,
    pub hints: RenderHints,
}

impl DisplayLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            text: text.into(),
            hints: RenderHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: RenderHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(LineKind::System, text)
    }

    pub fn help(text: impl Into<String>) -> Self {
        Self::new(LineKind::Help, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LineKind::Error, text)
    }

    pub fn input(text: impl Into<String>) -> Self {
        Self::new(LineKind::Input, text)
    }

    /// Echo line whose visible text is a fixed placeholder.
    pub fn masked_input(mask: &str) -> Self {
        let mut line = Self::new(LineKind::Input, mask);
        line.hints.masked = true;
        line
    }

    /// Serialise directives and sections back into the marker text the presenter expects.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for directive in &self.hints.directives {
            out.push_str(&directive.to_string());
        }
        out.push_str(&self.text);
        for section in &self.hints.sections {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&section.marker());
            for line in &section.lines {
                out.push('\n');
                out.push_str(line);
            }
        }
        out
    }
}

/// Bounded, append-ordered transcript. Every stored line carries a sequence number so
/// presenters can ask for what arrived after their last read.
#[derive(Debug)]
pub struct DisplayLog {
    lines: VecDeque<(u64, DisplayLine)>,
    cap: usize,
    next_seq: u64,
}

impl DisplayLog {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap.min(1024)),
            cap: cap.max(1),
            next_seq: 1,
        }
    }

    /// Append a line, evicting the oldest past the cap. A dialogue line replaces any
    /// pending typing indicator from the same speaker.
    pub fn push(&mut self, line: DisplayLine) {
        if line.kind == LineKind::Dialogue && !line.hints.transient {
            if let Some(speaker) = line.hints.speaker.as_deref() {
                self.lines.retain(|(_, l)| {
                    !(l.hints.transient && l.hints.speaker.as_deref() == Some(speaker))
                });
            }
        }
        self.lines.push_back((self.next_seq, line));
        self.next_seq += 1;
        while self.lines.len() > self.cap {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayLine> {
        self.lines.iter().map(|(_, l)| l)
    }

    pub fn last(&self) -> Option<&DisplayLine> {
        self.lines.back().map(|(_, l)| l)
    }

    /// Sequence number of the most recently appended line (0 before any append).
    pub fn head_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Lines appended after `seq` that are still retained.
    pub fn lines_since(&self, seq: u64) -> Vec<&DisplayLine> {
        self.lines
            .iter()
            .filter(|(s, _)| *s > seq)
            .map(|(_, l)| l)
            .collect()
    }
}
