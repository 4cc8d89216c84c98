use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_admin, require_store, require_student};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

/// Unconditional append. No capacity limit, no dedup, no automatic
/// promotion when a seat frees up; the admin works the list by hand.
fn join(conn: &Connection, name: &str, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let slot = get_required_str(params, "slot")?;
    let entry_id = Uuid::new_v4().to_string();
    let created_at = ledger::studio_now().to_rfc3339();
    conn.execute(
        "INSERT INTO waitlist(id, student_name, requested_slot, created_at)
         VALUES(?, ?, ?, ?)",
        (&entry_id, name, &slot, &created_at),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "entryId": entry_id, "slot": slot }))
}

fn list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_name, requested_slot, created_at
             FROM waitlist
             ORDER BY created_at, rowid",
        )
        .map_err(HandlerErr::db_query)?;
    let entries = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "studentName": r.get::<_, String>(1)?,
                "requestedSlot": r.get::<_, String>(2)?,
                "createdAt": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db_query)?;
    Ok(json!({ "entries": entries }))
}

fn handle_join(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match require_student(state) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match join(conn, &name, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state) {
        return e.response(&req.id);
    }
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "waitlist.join" => Some(handle_join(state, req)),
        "waitlist.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
