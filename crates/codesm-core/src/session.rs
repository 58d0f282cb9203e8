//! The in-memory shape of a session. Persistence lives in `codesm-session`;
//! this crate only owns the data the store reads and writes.

use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TITLE: &str = "New session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub cwd: PathBuf,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title_generated: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, cwd: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            cwd,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            title_generated: false,
        }
    }

    pub fn needs_title(&self) -> bool {
        !self.title_generated && self.title == DEFAULT_TITLE
    }

    /// Idempotent: a title already set to a non-default value is left alone.
    pub fn set_title(&mut self, title: impl Into<String>) {
        if self.title_generated {
            return;
        }
        self.title = title.into();
        self.title_generated = true;
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn llm_visible_messages(&self) -> Vec<Message> {
        crate::message::llm_visible(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_setter_is_idempotent() {
        let mut s = Session::new("s1", PathBuf::from("/tmp"));
        assert!(s.needs_title());
        s.set_title("Fix the bug");
        assert_eq!(s.title, "Fix the bug");
        s.set_title("Something else");
        assert_eq!(s.title, "Fix the bug");
        assert!(!s.needs_title());
    }
}
