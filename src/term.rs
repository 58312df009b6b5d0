//! Plain-terminal presentation of the display log, plus the client-side `:` commands.

use crate::session::display::{Directive, DisplayLine, DisplayLog, LineKind, SectionKind};

/// Prints only what was appended since the previous flush.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    last_seq: u64,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatted text for every line appended since the last call.
    pub fn drain(&mut self, log: &DisplayLog) -> Vec<String> {
        let out = log
            .lines_since(self.last_seq)
            .into_iter()
            .map(format_line)
            .collect();
        self.last_seq = log.head_seq();
        out
    }
}

pub fn format_line(line: &DisplayLine) -> String {
    let mut out = String::new();
    for directive in &line.hints.directives {
        match directive {
            Directive::Image(url) => out.push_str(&format!("[image: {}]\n", url)),
            Directive::Portrait(url) => out.push_str(&format!("[portrait: {}] ", url)),
            Directive::NpcAlias(alias) => out.push_str(&format!("({}) ", alias)),
        }
    }
    if line.hints.private {
        out.push_str("(private) ");
    }
    match line.kind {
        LineKind::Error => out.push_str(&format!("! {}", line.text)),
        LineKind::Help => out.push_str(&format!("  {}", line.text)),
        _ => out.push_str(&line.text),
    }
    if line.hints.transient {
        out.push_str("...");
    }
    for section in &line.hints.sections {
        let header = match &section.kind {
            SectionKind::Location(name) => format!("== {} ==", name),
            SectionKind::Exits => "Exits:".to_string(),
            SectionKind::Npcs => "You see:".to_string(),
            SectionKind::Characters => "Also here:".to_string(),
        };
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&header);
        for text in &section.lines {
            out.push_str("\n  ");
            out.push_str(text);
        }
    }
    out.trim_end().to_string()
}

/// Client commands handled by the terminal loop instead of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Complete(String),
    Previous,
    Next,
    Audio(bool),
    TrackEnd,
    Metrics,
    Quit,
    Unknown(String),
}

impl MetaCommand {
    /// Parse a line beginning with `:`; anything else is not a meta command.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start().strip_prefix(':')?;
        let (head, arg) = match rest.split_once(' ') {
            Some((head, arg)) => (head, arg),
            None => (rest, ""),
        };
        Some(match head.to_lowercase().as_str() {
            "tab" => MetaCommand::Complete(arg.to_string()),
            "prev" => MetaCommand::Previous,
            "next" => MetaCommand::Next,
            "audio" => match arg.trim().to_lowercase().as_str() {
                "on" => MetaCommand::Audio(true),
                "off" => MetaCommand::Audio(false),
                _ => MetaCommand::Unknown(rest.to_string()),
            },
            "skip" => MetaCommand::TrackEnd,
            "metrics" => MetaCommand::Metrics,
            "quit" | "q" => MetaCommand::Quit,
            _ => MetaCommand::Unknown(rest.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::display::Section;

    #[test]
    fn drains_only_new_lines() {
        let mut log = DisplayLog::new(10);
        let mut presenter = TerminalPresenter::new();
        log.push(DisplayLine::system("one"));
        assert_eq!(presenter.drain(&log), vec!["one"]);
        assert!(presenter.drain(&log).is_empty());
        log.push(DisplayLine::error("bad"));
        assert_eq!(presenter.drain(&log), vec!["! bad"]);
    }

    #[test]
    fn formats_sections_and_directives() {
        let mut line = DisplayLine::system("");
        line.hints.directives.push(Directive::Image("img.png".into()));
        let mut loc = Section::new(SectionKind::Location("Square".into()));
        loc.lines.push("A dry fountain.".into());
        line.hints.sections.push(loc);
        assert_eq!(
            format_line(&line),
            "[image: img.png]\n== Square ==\n  A dry fountain."
        );
    }

    #[test]
    fn parses_meta_commands() {
        assert_eq!(MetaCommand::parse("say hi"), None);
        assert_eq!(
            MetaCommand::parse(":tab go n"),
            Some(MetaCommand::Complete("go n".into()))
        );
        assert_eq!(MetaCommand::parse(":audio OFF"), Some(MetaCommand::Audio(false)));
        assert_eq!(MetaCommand::parse(":q"), Some(MetaCommand::Quit));
        assert!(matches!(
            MetaCommand::parse(":audio loud"),
            Some(MetaCommand::Unknown(_))
        ));
    }
}
