//! Conversation mode: while active, plain input is addressed to one NPC and a bounded
//! dialogue history travels with every submission.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::display::DisplayLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Npc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTarget {
    pub npc_name: String,
    pub npc_alias: String,
}

#[derive(Debug)]
pub struct ConversationController {
    target: Option<ConversationTarget>,
    history: VecDeque<ConversationTurn>,
    cap: usize,
}

impl ConversationController {
    pub fn new(cap: usize) -> Self {
        Self {
            target: None,
            history: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&ConversationTarget> {
        self.target.as_ref()
    }

    /// Start talking to an NPC. History always starts empty.
    pub fn enter(&mut self, npc_name: &str, npc_alias: &str) -> DisplayLine {
        self.target = Some(ConversationTarget {
            npc_name: npc_name.to_string(),
            npc_alias: npc_alias.to_string(),
        });
        self.history.clear();
        DisplayLine::system(format!(
            "You are now talking to {}. Type EXIT to end the conversation.",
            npc_name
        ))
    }

    /// Append a turn, keeping only the most recent `cap` turns.
    pub fn add_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.push_back(ConversationTurn {
            role,
            content: content.into(),
        });
        while self.history.len() > self.cap {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.iter().cloned().collect()
    }

    /// The history as it would be after appending one more turn, without changing it.
    pub fn history_with(&self, role: Role, content: &str) -> Vec<ConversationTurn> {
        let skip = (self.history.len() + 1).saturating_sub(self.cap);
        self.history
            .iter()
            .cloned()
            .chain(std::iter::once(ConversationTurn {
                role,
                content: content.to_string(),
            }))
            .skip(skip)
            .collect()
    }

    /// Leave conversation mode. Returns the closing line, or `None` if nothing was active.
    pub fn exit(&mut self) -> Option<DisplayLine> {
        let target = self.target.take()?;
        self.history.clear();
        Some(DisplayLine::system(format!(
            "You end your conversation with {}.",
            target.npc_name
        )))
    }

    /// Drop any conversation without a closing line (room changes, logout).
    pub fn force_clear(&mut self) {
        self.target = None;
        self.history.clear();
    }

    /// Whether a speaker name belongs to the NPC currently being talked to.
    pub fn is_partner(&self, speaker: &str) -> bool {
        self.target.as_ref().is_some_and(|t| {
            t.npc_name.eq_ignore_ascii_case(speaker) || t.npc_alias.eq_ignore_ascii_case(speaker)
        })
    }
}
