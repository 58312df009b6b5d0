//! Context-sensitive completion of partially typed commands.
//!
//! [`complete`] is pure and returns full reconstructed command strings. [`Autocompleter`]
//! adds cycling: asking again without typing anything new steps to the next candidate.

use std::collections::BTreeSet;

use crate::services::Npc;

use super::commands::{Direction, MOVEMENT_ALIASES, VERBS};

/// Room and account knowledge used to complete arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionContext<'a> {
    /// Exit names of the current room.
    pub exits: &'a [String],
    pub npcs: &'a [Npc],
    /// Other characters in the current room.
    pub characters_here: &'a [String],
    /// Characters owned by the logged-in account.
    pub roster: &'a [String],
}

pub fn complete(partial: &str, ctx: &CompletionContext<'_>) -> Vec<String> {
    let partial = partial.trim_start();
    if partial.is_empty() {
        return Vec::new();
    }
    let (head, rest) = match partial.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, Some(rest.trim_start())),
        None => (partial, None),
    };
    let verb = head.to_lowercase();

    let Some(arg) = rest else {
        let moves = movement_candidates(&verb, ctx.exits);
        if !moves.is_empty() {
            return moves;
        }
        return sort_candidates(
            VERBS
                .iter()
                .filter(|v| v.len() > 1 && v.starts_with(verb.as_str()))
                .map(|v| v.to_string())
                .collect(),
        );
    };

    let single_token = !arg.contains(char::is_whitespace);
    let arg_lower = arg.to_lowercase();
    let names: Vec<String> = match verb.as_str() {
        "go" if single_token => {
            return movement_candidates(&arg_lower, ctx.exits)
                .into_iter()
                .map(|dir| format!("go {}", dir))
                .collect()
        }
        "enter" => prefixed(ctx.roster.iter().map(String::as_str), &arg_lower),
        "inspect" => {
            let mut names: Vec<String> = ctx
                .npcs
                .iter()
                .filter(|n| npc_matches_prefix(n, &arg_lower))
                .map(|n| n.name.clone())
                .collect();
            for name in prefixed(ctx.characters_here.iter().map(String::as_str), &arg_lower) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names
        }
        "talk" | "pet" if single_token => npc_handles(ctx.npcs, &arg_lower),
        "whisper" if single_token => {
            prefixed(ctx.characters_here.iter().map(String::as_str), &arg_lower)
        }
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(|name| format!("{} {}", verb, name))
        .collect()
}

/// Directions reachable from the typed prefix. Exit names are matched directly; aliases
/// contribute their canonical direction, which collapses into the exit-name match when
/// both produce the same direction. With no known exits the alias table alone is used.
fn movement_candidates(prefix: &str, exits: &[String]) -> Vec<String> {
    if prefix.is_empty() {
        return Vec::new();
    }
    let exits_lower: Vec<String> = exits.iter().map(|e| e.to_lowercase()).collect();
    let mut found: BTreeSet<String> = BTreeSet::new();

    for exit in exits_lower.iter().filter(|e| e.starts_with(prefix)) {
        found.insert(exit.clone());
    }
    for (alias, dir) in MOVEMENT_ALIASES {
        if !alias.starts_with(prefix) {
            continue;
        }
        let canonical = dir.as_str();
        if exits_lower.is_empty() || exits_lower.iter().any(|e| e == canonical) {
            found.insert(canonical.to_string());
        }
    }
    sort_candidates(found.into_iter().collect())
}

/// Alias-or-name prefix match, case-insensitive.
fn npc_matches_prefix(npc: &Npc, prefix: &str) -> bool {
    npc.name.to_lowercase().starts_with(prefix)
        || npc
            .alias
            .as_deref()
            .is_some_and(|a| a.to_lowercase().starts_with(prefix))
}

fn npc_handles(npcs: &[Npc], prefix: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for npc in npcs {
        if npc_matches_prefix(npc, prefix) {
            let handle = npc.handle().to_string();
            if !out.contains(&handle) {
                out.push(handle);
            }
        }
    }
    out
}

fn prefixed<'a>(names: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names.filter(|n| n.to_lowercase().starts_with(prefix)) {
        if !out.iter().any(|o| o == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Shortest first, then lexicographic (`north` before `northwest`).
fn sort_candidates(mut candidates: Vec<String>) -> Vec<String> {
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates
}

/// Resolve a typed movement token against the room's exits. Exact exit names win over
/// alias expansion.
pub fn resolve_exit(token: &str, exits: &[String]) -> Option<String> {
    let token = token.trim().to_lowercase();
    if let Some(exit) = exits.iter().find(|e| e.to_lowercase() == token) {
        return Some(exit.to_lowercase());
    }
    Direction::resolve(&token).map(|d| d.as_str().to_string())
}

#[derive(Debug, Default)]
struct Cycle {
    /// The typed text the candidates were computed from.
    partial: String,
    candidates: Vec<String>,
    index: usize,
}

/// Completion with cycling across repeated requests.
#[derive(Debug, Default)]
pub struct Autocompleter {
    cycle: Option<Cycle>,
}

impl Autocompleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the replacement for `input`, or `None` when nothing matches.
    ///
    /// If `input` is the text that started the current cycle, or the candidate returned
    /// last time, the next candidate is returned (wrapping). Otherwise candidates are
    /// recomputed; a single candidate is returned without starting a cycle.
    pub fn next(&mut self, input: &str, ctx: &CompletionContext<'_>) -> Option<String> {
        if let Some(cycle) = self.cycle.as_mut() {
            let current = cycle.candidates.get(cycle.index).map(String::as_str);
            if cycle.partial == input || current == Some(input) {
                cycle.index = (cycle.index + 1) % cycle.candidates.len();
                return cycle.candidates.get(cycle.index).cloned();
            }
        }
        self.cycle = None;
        let mut candidates = complete(input, ctx);
        match candidates.len() {
            0 => None,
            1 => candidates.pop(),
            _ => {
                let first = candidates[0].clone();
                self.cycle = Some(Cycle {
                    partial: input.to_string(),
                    candidates,
                    index: 0,
                });
                Some(first)
            }
        }
    }

    pub fn reset(&mut self) {
        self.cycle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exits(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn npc(name: &str, alias: Option<&str>) -> Npc {
        Npc {
            id: name.to_lowercase(),
            name: name.into(),
            alias: alias.map(str::to_string),
            description: String::new(),
            portrait: None,
        }
    }

    #[test]
    fn north_sorts_before_northwest() {
        let exits = exits(&["northwest", "north"]);
        let ctx = CompletionContext {
            exits: &exits,
            ..Default::default()
        };
        assert_eq!(complete("n", &ctx), vec!["north", "northwest"]);
        assert_eq!(complete("go n", &ctx), vec!["go north", "go northwest"]);
    }

    #[test]
    fn alias_expands_only_to_existing_exits() {
        let exits = exits(&["north", "northwest"]);
        let ctx = CompletionContext {
            exits: &exits,
            ..Default::default()
        };
        assert_eq!(complete("nw", &ctx), vec!["northwest"]);
        assert!(complete("se", &ctx).is_empty());
    }

    #[test]
    fn without_exits_the_alias_table_is_used() {
        let ctx = CompletionContext::default();
        assert_eq!(complete("so", &ctx), vec!["south", "southeast", "southwest"]);
    }

    #[test]
    fn non_direction_prefix_completes_verbs() {
        let ctx = CompletionContext::default();
        assert_eq!(complete("wh", &ctx), vec!["who", "whoami", "whisper"]);
    }

    #[test]
    fn entity_arguments_complete_to_full_commands() {
        let npcs = vec![npc("Mira", Some("baker")), npc("Old Tom", None)];
        let here = exits(&["Bram", "Beatrix"]);
        let roster = exits(&["Aria", "Anselm"]);
        let ctx = CompletionContext {
            npcs: &npcs,
            characters_here: &here,
            roster: &roster,
            ..Default::default()
        };
        assert_eq!(complete("talk ba", &ctx), vec!["talk baker"]);
        assert_eq!(complete("talk mi", &ctx), vec!["talk baker"]);
        assert_eq!(complete("pet old", &ctx), vec!["pet Old Tom"]);
        assert_eq!(complete("whisper b", &ctx), vec!["whisper Bram", "whisper Beatrix"]);
        assert_eq!(complete("ENTER a", &ctx), vec!["enter Aria", "enter Anselm"]);
        assert_eq!(complete("inspect m", &ctx), vec!["inspect Mira"]);
        assert_eq!(complete("inspect BAK", &ctx), vec!["inspect Mira"]);
        assert_eq!(
            complete("inspect b", &ctx),
            vec!["inspect Mira", "inspect Bram", "inspect Beatrix"]
        );
        assert!(complete("whisper Bram hi", &ctx).is_empty());
    }

    #[test]
    fn cycling_wraps_and_single_candidates_apply_directly() {
        let exits = exits(&["north", "northeast", "northwest"]);
        let ctx = CompletionContext {
            exits: &exits,
            ..Default::default()
        };
        let mut ac = Autocompleter::new();
        let first = ac.next("n", &ctx).unwrap();
        assert_eq!(first, "north");
        let second = ac.next(&first, &ctx).unwrap();
        assert_eq!(second, "northeast");
        let third = ac.next(&second, &ctx).unwrap();
        assert_eq!(third, "northwest");
        assert_eq!(ac.next(&third, &ctx).unwrap(), "north");

        // Asking again with the same typed text keeps cycling.
        assert_eq!(ac.next("n", &ctx).unwrap(), "northeast");
        assert_eq!(ac.next("n", &ctx).unwrap(), "northwest");
        assert_eq!(ac.next("n", &ctx).unwrap(), "north");

        // New typing restarts completion.
        assert_eq!(ac.next("northw", &ctx).unwrap(), "northwest");
        assert_eq!(ac.next("northwest", &ctx).unwrap(), "northwest");
    }

    #[test]
    fn exact_exit_names_win_over_aliases() {
        let exits = exits(&["Up", "portal"]);
        assert_eq!(resolve_exit("PORTAL", &exits).as_deref(), Some("portal"));
        assert_eq!(resolve_exit("u", &exits).as_deref(), Some("up"));
        assert_eq!(resolve_exit("x", &exits), None);
    }
}
