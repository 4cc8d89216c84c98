use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

use crate::db::{self, StudentRow};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_admin, require_store, require_student};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

pub const STATUSES: [&str; 3] = ["active", "paused", "ended"];

fn validate_status(status: &str) -> Result<(), HandlerErr> {
    if STATUSES.contains(&status) {
        return Ok(());
    }
    Err(HandlerErr::new(
        "validation_failed",
        format!("status must be one of {}", STATUSES.join(", ")),
    ))
}

fn student_json(row: &StudentRow) -> serde_json::Value {
    json!({
        "id": row.id,
        "status": row.status,
        "name": row.name,
        "phone": row.phone,
        "pricePlan": row.price_plan,
        "nextBookingSlot": row.next_booking_slot,
        "registeredAt": row.registered_at,
        "lastAttendanceDate": row.last_attendance_date,
        "endDate": row.end_date,
        "remainingCredits": row.remaining_credits,
        "remainingParsed": ledger::parse_credits(&row.remaining_credits),
        "totalAttended": row.total_attended,
        "totalParsed": ledger::parse_credits(&row.total_attended),
        "progressNotes": row.progress_notes,
        "vehiclePlate": row.vehicle_plate,
        "portfolioUrls": row.portfolio_urls,
    })
}

fn list_students(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let statuses: Option<Vec<String>> = params.get("statuses").and_then(|v| v.as_array()).map(|a| {
        a.iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    });

    // Full fetch, then filter in memory, like every other view.
    let rows = db::fetch_students(conn).map_err(HandlerErr::db_query)?;
    let students: Vec<serde_json::Value> = rows
        .iter()
        .filter(|r| match &statuses {
            Some(wanted) => wanted.iter().any(|s| *s == r.status),
            None => true,
        })
        .map(student_json)
        .collect();
    Ok(json!({ "students": students }))
}

fn register_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    let phone = get_required_str(params, "phone")?.trim().to_string();
    if name.is_empty() || phone.is_empty() {
        return Err(HandlerErr::new(
            "validation_failed",
            "name and phone must not be blank",
        ));
    }
    let plan = get_optional_str(params, "pricePlan").unwrap_or_else(|| "monthly-4".to_string());
    let Some(credits) = ledger::initial_credits_for_plan(&plan) else {
        return Err(HandlerErr::new(
            "validation_failed",
            format!("unknown price plan: {}", plan),
        ));
    };

    // Name is the login key, so duplicates are rejected up front.
    let existing = db::find_student_by_name(conn, &name).map_err(HandlerErr::db_query)?;
    if existing.is_some() {
        return Err(HandlerErr::new(
            "validation_failed",
            "name already registered",
        ));
    }

    let student_id = Uuid::new_v4().to_string();
    let registered_at = ledger::today_string(ledger::studio_now());
    conn.execute(
        "INSERT INTO students(id, status, name, phone, price_plan, registered_at,
                              remaining_credits, total_attended)
         VALUES(?, 'active', ?, ?, ?, ?, ?, '0')",
        (
            &student_id,
            &name,
            &phone,
            &plan,
            &registered_at,
            credits.to_string(),
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;

    Ok(json!({
        "studentId": student_id,
        "name": name,
        "pricePlan": plan,
        "remainingCredits": credits.to_string(),
    }))
}

/// The admin edit form writes whichever fields were supplied, one column at a
/// time, mirroring the cell-by-cell updates it replaces. Passwords are not
/// editable here; only the owner changes those.
const EDITABLE_FIELDS: [(&str, &str); 10] = [
    ("name", "name"),
    ("phone", "phone"),
    ("pricePlan", "price_plan"),
    ("nextBookingSlot", "next_booking_slot"),
    ("endDate", "end_date"),
    ("remainingCredits", "remaining_credits"),
    ("totalAttended", "total_attended"),
    ("progressNotes", "progress_notes"),
    ("vehiclePlate", "vehicle_plate"),
    ("portfolioUrls", "portfolio_urls"),
];

fn update_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let row = db::find_student_by_id(conn, &student_id)
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;

    if let Some(status) = get_optional_str(params, "status") {
        validate_status(&status)?;
        conn.execute(
            "UPDATE students SET status = ? WHERE id = ?",
            (&status, &student_id),
        )
        .map_err(HandlerErr::db_update)?;
    }

    if let Some(new_name) = get_optional_str(params, "name") {
        if new_name != row.name {
            let clash = db::find_student_by_name(conn, &new_name).map_err(HandlerErr::db_query)?;
            if clash.is_some() {
                return Err(HandlerErr::new(
                    "validation_failed",
                    "name already registered",
                ));
            }
        }
    }

    let mut updated = 0usize;
    for (key, column) in EDITABLE_FIELDS {
        let Some(value) = get_optional_str(params, key) else {
            continue;
        };
        let sql = format!("UPDATE students SET {} = ? WHERE id = ?", column);
        conn.execute(&sql, (&value, &student_id))
            .map_err(HandlerErr::db_update)?;
        updated += 1;
    }

    Ok(json!({ "studentId": student_id, "updatedFields": updated }))
}

fn delete_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let deleted = conn
        .execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(json!({ "deleted": true }))
}

fn me(conn: &Connection, name: &str) -> Result<serde_json::Value, HandlerErr> {
    let row = db::find_student_by_name(conn, name)
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| HandlerErr::new("not_found", "no student with that name"))?;

    let gallery: Vec<String> = row
        .portfolio_urls
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(json!({
        "name": row.name,
        "status": row.status,
        "pricePlan": row.price_plan,
        "remaining": ledger::parse_credits(&row.remaining_credits),
        "remainingText": row.remaining_credits,
        "totalAttended": ledger::parse_credits(&row.total_attended),
        "nextBookingSlot": row.next_booking_slot,
        "lastAttendanceDate": row.last_attendance_date,
        "progressNotes": row.progress_notes,
        "galleryUrls": gallery,
    }))
}

fn admin_op(
    state: &mut AppState,
    req: &Request,
    f: impl Fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    if let Err(e) = require_admin(state) {
        return e.response(&req.id);
    }
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_me(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match require_student(state) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match me(conn, &name) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(admin_op(state, req, list_students)),
        "students.register" => Some(admin_op(state, req, register_student)),
        "students.update" => Some(admin_op(state, req, update_student)),
        "students.delete" => Some(admin_op(state, req, delete_student)),
        "students.me" => Some(handle_me(state, req)),
        _ => None,
    }
}
