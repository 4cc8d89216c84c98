use rusqlite::Connection;

use super::error::HandlerErr;
use super::types::{AppState, Identity};

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Every data method refuses to run until a store has been opened; a failed
/// or missing store is fatal for the session, there is no degraded mode.
pub fn require_store(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("store_unavailable", "open a store first"))
}

pub fn require_admin(state: &AppState) -> Result<(), HandlerErr> {
    match state.session.identity {
        Some(Identity::Admin) => Ok(()),
        Some(_) => Err(HandlerErr::new("forbidden", "admin only")),
        None => Err(HandlerErr::new("auth_required", "log in first")),
    }
}

/// Returns the logged-in student's name.
pub fn require_student(state: &AppState) -> Result<String, HandlerErr> {
    match &state.session.identity {
        Some(Identity::Student(name)) => Ok(name.clone()),
        Some(_) => Err(HandlerErr::new("forbidden", "student only")),
        None => Err(HandlerErr::new("auth_required", "log in first")),
    }
}
