//! Input command history
//!
//! Most-recent-first recall with a small cap, matching the behavior of the
//! client input box: up steps to older entries, down steps back toward the
//! live (empty) input line.

/// Maximum number of history entries
const HISTORY_LIMIT: usize = 20;

/// Command recall state for one input box
#[derive(Debug, Default)]
pub struct CommandHistory {
    /// Entries, newest first
    entries: Vec<String>,
    /// Recall position; `None` means the live input line
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted command. Blank input is ignored and recall resets
    /// to the live line.
    pub fn push(&mut self, command: &str) {
        if command.trim().is_empty() {
            return;
        }
        self.entries.insert(0, command.to_string());
        self.entries.truncate(HISTORY_LIMIT);
        self.cursor = None;
    }

    /// Step to an older entry
    pub fn up(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => 0,
            Some(i) => (i + 1).min(self.entries.len() - 1),
        };
        self.cursor = Some(next);
        self.entries.get(next).map(String::as_str)
    }

    /// Step back toward the live input line; `None` means the input should
    /// be cleared.
    pub fn down(&mut self) -> Option<&str> {
        match self.cursor {
            None | Some(0) => {
                self.cursor = None;
                None
            }
            Some(i) => {
                self.cursor = Some(i - 1);
                self.entries.get(i - 1).map(String::as_str)
            }
        }
    }

    /// All entries, newest first
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
