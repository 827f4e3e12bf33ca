//! Command history
//!
//! In-memory history for the interactive session, appended to
//! `$HISTFILE` at shutdown.

use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn add(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        // Collapse immediate repeats.
        if self.entries.last().map(String::as_str) == Some(command) {
            return;
        }
        self.entries.push(command.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append this session's entries to the history file.
    pub fn append_to_file(&self, path: &str) -> std::io::Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_collapse() {
        let mut h = History::new();
        h.add("ls");
        h.add("ls");
        h.add("pwd");
        h.add("  ");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn append_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        let mut h = History::new();
        h.add("echo one");
        h.add("echo two");
        h.append_to_file(path.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "echo one\necho two\n");
    }
}
