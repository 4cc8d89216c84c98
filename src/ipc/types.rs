use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Student(String),
    Admin,
}

/// Per-process caller context: who is logged in, plus the ephemeral activity
/// feed. Neither is persisted; both vanish with the process.
#[derive(Default)]
pub struct Session {
    pub identity: Option<Identity>,
    pub feed: Vec<String>,
}

impl Session {
    /// Newest lines first.
    pub fn push_feed(&mut self, line: String) {
        self.feed.insert(0, line);
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Session,
    pub admin_secret: String,
}
