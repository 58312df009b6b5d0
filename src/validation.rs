//! Input validation for account and character data typed at the prompt.

use std::collections::HashSet;

/// Character name validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("name must start with a letter")]
    MustStartWithLetter,

    #[error("name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("name is reserved")]
    Reserved,
}

/// Character name validation rules
#[derive(Debug, Clone)]
pub struct NameRules {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
}

impl Default for NameRules {
    fn default() -> Self {
        NameRules {
            min_length: 2,
            max_length: 20,
            allow_spaces: true,
            allow_unicode: false,
        }
    }
}

/// Command verbs and system words that would make a character name ambiguous at the prompt.
fn reserved_names() -> HashSet<&'static str> {
    [
        "admin", "administrator", "root", "system", "sysop", "guest", "observer",
        "north", "south", "east", "west", "up", "down",
        "northeast", "northwest", "southeast", "southwest",
        "help", "login", "logout", "register", "forgot", "cancel", "whoami",
        "characters", "create", "enter", "disengage", "say", "look", "exits", "go",
        "who", "inspect", "talk", "pet", "whisper", "clear", "exit", "you",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a character name and return its trimmed, whitespace-collapsed form.
pub fn validate_character_name(name: &str, rules: &NameRules) -> Result<String, NameError> {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = collapsed.chars().count();

    if len < rules.min_length {
        return Err(NameError::TooShort {
            min: rules.min_length,
        });
    }
    if len > rules.max_length {
        return Err(NameError::TooLong {
            max: rules.max_length,
        });
    }
    if !collapsed.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return Err(NameError::MustStartWithLetter);
    }
    if reserved_names().contains(collapsed.to_lowercase().as_str()) {
        return Err(NameError::Reserved);
    }

    let mut invalid: Vec<char> = Vec::new();
    for ch in collapsed.chars() {
        let valid = if ch.is_ascii_alphabetic() || ch == '\'' || ch == '-' {
            true
        } else if ch == ' ' {
            rules.allow_spaces
        } else if ch.is_alphabetic() {
            rules.allow_unicode
        } else {
            false
        };
        if !valid && !invalid.contains(&ch) {
            invalid.push(ch);
        }
    }
    if !invalid.is_empty() {
        return Err(NameError::InvalidCharacters {
            chars: invalid.into_iter().collect(),
        });
    }

    Ok(collapsed)
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Strip control characters (keeping tabs) and cap the byte length on a char boundary.
pub fn sanitize_text(content: &str, max_bytes: usize) -> String {
    let mut out = String::with_capacity(content.len().min(max_bytes));
    for ch in content.chars().filter(|&c| !c.is_control() || c == '\t') {
        if out.len() + ch.len_utf8() > max_bytes {
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        let rules = NameRules::default();
        assert_eq!(validate_character_name("Aria", &rules).unwrap(), "Aria");
        assert_eq!(
            validate_character_name("  Old   Tom ", &rules).unwrap(),
            "Old Tom"
        );
        assert_eq!(validate_character_name("D'Arcy", &rules).unwrap(), "D'Arcy");
    }

    #[test]
    fn rejects_bad_names() {
        let rules = NameRules::default();
        assert_eq!(
            validate_character_name("A", &rules),
            Err(NameError::TooShort { min: 2 })
        );
        assert_eq!(
            validate_character_name("9lives", &rules),
            Err(NameError::MustStartWithLetter)
        );
        assert_eq!(
            validate_character_name("north", &rules),
            Err(NameError::Reserved)
        );
        assert!(matches!(
            validate_character_name("Bob<script>", &rules),
            Err(NameError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_character_name("Averyveryverylongname1", &rules),
            Err(NameError::TooLong { max: 20 })
        ));
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("a@b.com"));
        assert!(is_plausible_email(" user.name@mail.example.org "));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.com"));
        assert!(!is_plausible_email("a b@c.com"));
        assert!(!is_plausible_email("a@@b.com"));
    }

    #[test]
    fn sanitize_strips_controls_and_caps() {
        assert_eq!(sanitize_text("hi\u{7}there", 64), "hithere");
        assert_eq!(sanitize_text("héllo", 2), "h");
    }
}
