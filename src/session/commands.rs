//! Command parsing: first token selects a verb (case-insensitive); unrecognized tokens
//! that name a direction become movement.

use log::trace;

use crate::logutil::escape_log;

/// Cardinal, intercardinal and vertical directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
    Up,
    Down,
}

/// Abbreviation and full-name aliases, all lowercase.
pub const MOVEMENT_ALIASES: &[(&str, Direction)] = &[
    ("n", Direction::North),
    ("s", Direction::South),
    ("e", Direction::East),
    ("w", Direction::West),
    ("ne", Direction::Northeast),
    ("nw", Direction::Northwest),
    ("se", Direction::Southeast),
    ("sw", Direction::Southwest),
    ("u", Direction::Up),
    ("d", Direction::Down),
    ("north", Direction::North),
    ("south", Direction::South),
    ("east", Direction::East),
    ("west", Direction::West),
    ("northeast", Direction::Northeast),
    ("northwest", Direction::Northwest),
    ("southeast", Direction::Southeast),
    ("southwest", Direction::Southwest),
    ("up", Direction::Up),
    ("down", Direction::Down),
];

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Northeast => "northeast",
            Direction::Northwest => "northwest",
            Direction::Southeast => "southeast",
            Direction::Southwest => "southwest",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Resolve an abbreviation or full name, ignoring case and surrounding whitespace.
    pub fn resolve(token: &str) -> Option<Direction> {
        let token = token.trim().to_lowercase();
        MOVEMENT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, dir)| *dir)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every verb the interpreter recognizes, in help order.
pub const VERBS: &[&str] = &[
    "help", "?", "login", "register", "forgot", "cancel", "logout", "whoami", "characters",
    "create", "enter", "disengage", "say", "look", "exits", "go", "who", "inspect", "talk",
    "pet", "whisper", "clear", "exit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Login,
    Register,
    Forgot,
    Cancel,
    Logout,
    WhoAmI,
    Characters,
    Create(String),
    Enter(String),
    Disengage,
    Say(String),
    Look,
    Exits,
    /// `go <dir>`; the argument is the canonical direction when it resolves, else verbatim.
    Go(String),
    /// Bare direction or alias typed as the first token.
    Move(Direction),
    Who,
    Inspect(String),
    Talk { target: String, message: Option<String> },
    Pet(String),
    Whisper { target: String, message: String },
    Clear,
    Exit,
    /// Anything else; forwarded verbatim as a generic world action.
    Action(String),
}

pub struct CommandParser;

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str) -> Command {
        let trimmed = raw.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        if head.is_empty() {
            return Command::Empty;
        }
        let verb = head.to_lowercase();
        let command = match verb.as_str() {
            "help" | "?" => Command::Help,
            "login" => Command::Login,
            "register" => Command::Register,
            "forgot" => Command::Forgot,
            "cancel" => Command::Cancel,
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "characters" => Command::Characters,
            "create" => Command::Create(rest.to_string()),
            "enter" => Command::Enter(rest.to_string()),
            "disengage" => Command::Disengage,
            "say" => Command::Say(rest.to_string()),
            "look" => Command::Look,
            "exits" => Command::Exits,
            "go" => Command::Go(
                Direction::resolve(rest)
                    .map(|d| d.as_str().to_string())
                    .unwrap_or_else(|| rest.to_lowercase()),
            ),
            "who" => Command::Who,
            "inspect" => Command::Inspect(rest.to_string()),
            "talk" => {
                let (target, message) = split_target(rest);
                Command::Talk {
                    target,
                    message: (!message.is_empty()).then_some(message),
                }
            }
            "pet" => Command::Pet(rest.to_string()),
            "whisper" => {
                let (target, message) = split_target(rest);
                Command::Whisper { target, message }
            }
            "clear" => Command::Clear,
            "exit" => Command::Exit,
            _ => match Direction::resolve(&verb) {
                Some(dir) => Command::Move(dir),
                None => Command::Action(trimmed.to_string()),
            },
        };
        trace!("parsed {:?} from '{}'", command, escape_log(raw));
        command
    }
}

fn split_target(rest: &str) -> (String, String) {
    match rest.split_once(char::is_whitespace) {
        Some((target, message)) => (target.to_string(), message.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aliases_case_insensitively() {
        assert_eq!(Direction::resolve("NW"), Some(Direction::Northwest));
        assert_eq!(Direction::resolve("  north "), Some(Direction::North));
        assert_eq!(Direction::resolve("Down"), Some(Direction::Down));
        assert_eq!(Direction::resolve("nowhere"), None);
    }

    #[test]
    fn every_alias_maps_to_a_full_name_that_maps_to_itself() {
        for (_, dir) in MOVEMENT_ALIASES {
            assert_eq!(Direction::resolve(dir.as_str()), Some(*dir));
        }
    }

    #[test]
    fn parses_verbs_and_arguments() {
        let parser = CommandParser::new();
        assert_eq!(parser.parse("  SAY  hello there "), Command::Say("hello there".into()));
        assert_eq!(parser.parse("?"), Command::Help);
        assert_eq!(parser.parse("go n"), Command::Go("north".into()));
        assert_eq!(parser.parse("go portal"), Command::Go("portal".into()));
        assert_eq!(parser.parse("go"), Command::Go(String::new()));
        assert_eq!(
            parser.parse("talk mira how are you?"),
            Command::Talk {
                target: "mira".into(),
                message: Some("how are you?".into())
            }
        );
        assert_eq!(
            parser.parse("talk mira"),
            Command::Talk {
                target: "mira".into(),
                message: None
            }
        );
        assert_eq!(
            parser.parse("whisper Bob meet me"),
            Command::Whisper {
                target: "Bob".into(),
                message: "meet me".into()
            }
        );
    }

    #[test]
    fn bare_directions_become_movement() {
        let parser = CommandParser::new();
        assert_eq!(parser.parse("nw"), Command::Move(Direction::Northwest));
        assert_eq!(parser.parse("SOUTH"), Command::Move(Direction::South));
        assert_eq!(parser.parse("dance wildly"), Command::Action("dance wildly".into()));
        assert_eq!(parser.parse("   "), Command::Empty);
    }
}
