//! Recall of previously executed input lines.

/// Append-only record of executed input lines with a recall cursor.
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an executed line and reset the recall cursor.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            self.entries.push(line.to_string());
        }
        self.cursor = None;
    }

    /// Step back to an older entry; stays on the oldest once reached.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = match self.cursor {
            None => self.entries.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.cursor = Some(idx);
        self.entries.get(idx).map(String::as_str)
    }

    /// Step forward; walking past the newest entry returns to an empty prompt (`None`).
    pub fn next(&mut self) -> Option<&str> {
        let idx = self.cursor? + 1;
        if idx >= self.entries.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(idx);
        self.entries.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_walks_back_and_forth() {
        let mut history = CommandHistory::new();
        assert_eq!(history.previous(), None);
        history.push("look");
        history.push("say hi");
        history.push("  ");

        assert_eq!(history.len(), 2);
        assert_eq!(history.previous(), Some("say hi"));
        assert_eq!(history.previous(), Some("look"));
        assert_eq!(history.previous(), Some("look"));
        assert_eq!(history.next(), Some("say hi"));
        assert_eq!(history.next(), None);
        assert_eq!(history.next(), None);
    }
}
