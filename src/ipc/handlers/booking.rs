use std::collections::BTreeMap;

use rusqlite::Connection;
use serde_json::json;

use crate::db::{self, StudentRow};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_admin, require_store, require_student};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

fn booked_count(rows: &[StudentRow], slot: &str) -> usize {
    // Exact string match; the slot text is the capacity key.
    rows.iter()
        .filter(|r| r.next_booking_slot.as_deref() == Some(slot))
        .count()
}

fn slots(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let rows = db::fetch_students(conn).map_err(HandlerErr::db_query)?;
    let listing: Vec<serde_json::Value> = ledger::enumerate_slots(ledger::studio_now())
        .into_iter()
        .map(|slot| {
            let booked = booked_count(&rows, &slot);
            json!({
                "slot": slot,
                "booked": booked,
                "capacity": ledger::SLOT_CAPACITY,
            })
        })
        .collect();
    Ok(json!({ "slots": listing }))
}

/// Capacity check and write are two separate store calls with no token, so
/// two writers can both pass the check. That matches the system this
/// replaces; within one daemon the calls are serialized anyway.
fn book(conn: &Connection, name: &str, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let slot = get_required_str(params, "slot")?;
    if !ledger::enumerate_slots(ledger::studio_now()).contains(&slot) {
        return Err(HandlerErr::new("bad_params", "unknown slot"));
    }

    let rows = db::fetch_students(conn).map_err(HandlerErr::db_query)?;
    let booked = booked_count(&rows, &slot);
    if booked >= ledger::SLOT_CAPACITY {
        return Err(HandlerErr::new("slot_full", "slot is at capacity"));
    }

    // Overwrites any prior booking; there is no history to keep.
    let updated = conn
        .execute(
            "UPDATE students SET next_booking_slot = ? WHERE name = ?",
            (&slot, name),
        )
        .map_err(HandlerErr::db_update)?;
    if updated == 0 {
        return Err(HandlerErr::new("not_found", "no student with that name"));
    }

    Ok(json!({ "slot": slot, "booked": booked + 1 }))
}

fn overview(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let rows = db::fetch_students(conn).map_err(HandlerErr::db_query)?;
    let mut by_slot: BTreeMap<String, Vec<&StudentRow>> = BTreeMap::new();
    for row in &rows {
        let Some(slot) = row.next_booking_slot.as_deref() else {
            continue;
        };
        if slot.is_empty() || slot == "-" {
            continue;
        }
        by_slot.entry(slot.to_string()).or_default().push(row);
    }

    let slots: Vec<serde_json::Value> = by_slot
        .into_iter()
        .map(|(slot, students)| {
            let listing: Vec<serde_json::Value> = students
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "phone": s.phone,
                        "remaining": ledger::parse_credits(&s.remaining_credits),
                        "vehiclePlate": s.vehicle_plate,
                    })
                })
                .collect();
            json!({
                "slot": slot,
                "count": listing.len(),
                "capacity": ledger::SLOT_CAPACITY,
                "students": listing,
            })
        })
        .collect();
    Ok(json!({ "slots": slots }))
}

fn handle_slots(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match slots(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_book(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match require_student(state) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match book(conn, &name, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state) {
        return e.response(&req.id);
    }
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match overview(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "booking.slots" => Some(handle_slots(state, req)),
        "booking.book" => Some(handle_book(state, req)),
        "booking.overview" => Some(handle_overview(state, req)),
        _ => None,
    }
}
