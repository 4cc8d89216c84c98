use std::collections::BTreeMap;

use rusqlite::Connection;
use serde_json::json;

use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{require_admin, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

/// Aggregate numbers behind the admin dashboard charts. Data only; drawing
/// is the front end's problem.
fn summary(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let rows = db::fetch_students(conn).map_err(HandlerErr::db_query)?;

    let mut status_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut remaining_sum: i64 = 0;
    let mut attended_sum: i64 = 0;
    let mut bookings: BTreeMap<String, usize> = BTreeMap::new();
    for row in &rows {
        *status_counts.entry(row.status.as_str()).or_default() += 1;
        remaining_sum += ledger::parse_credits(&row.remaining_credits);
        attended_sum += ledger::parse_credits(&row.total_attended);
        if let Some(slot) = row.next_booking_slot.as_deref() {
            if !slot.is_empty() && slot != "-" {
                *bookings.entry(slot.to_string()).or_default() += 1;
            }
        }
    }

    let waitlist_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM waitlist", [], |r| r.get(0))
        .map_err(HandlerErr::db_query)?;

    let bookings_json: Vec<serde_json::Value> = bookings
        .into_iter()
        .map(|(slot, count)| json!({ "slot": slot, "count": count }))
        .collect();

    Ok(json!({
        "totalStudents": rows.len(),
        "statusCounts": status_counts,
        "remainingCreditsSum": remaining_sum,
        "totalAttendedSum": attended_sum,
        "bookingsBySlot": bookings_json,
        "waitlistCount": waitlist_count,
    }))
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state) {
        return e.response(&req.id);
    }
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match summary(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
