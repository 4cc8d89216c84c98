use rusqlite::Connection;
use serde_json::json;

use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_store, require_student};
use crate::ipc::types::{AppState, Identity, Request};
use crate::ledger;

/// Effective password: the stored one once set, otherwise the last four
/// characters of the phone number with hyphens stripped. Setting a password
/// never falls back to the phone default again.
fn effective_password(row: &db::StudentRow) -> String {
    if let Some(pw) = row.password.as_deref() {
        if !pw.is_empty() {
            return pw.to_string();
        }
    }
    let digits: Vec<char> = row.phone.chars().filter(|c| *c != '-').collect();
    let start = digits.len().saturating_sub(4);
    digits[start..].iter().collect()
}

fn student_login(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(String, serde_json::Value), HandlerErr> {
    let name = get_required_str(params, "name")?;
    let supplied = get_required_str(params, "password")?;

    let row = db::find_student_by_name(conn, &name)
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| HandlerErr::new("not_found", "no student with that name"))?;

    // Plain equality, as the front desk expects.
    if supplied != effective_password(&row) {
        return Err(HandlerErr::new("wrong_password", "password does not match"));
    }

    let result = json!({
        "name": row.name,
        "status": row.status,
        "remaining": ledger::parse_credits(&row.remaining_credits),
    });
    Ok((name, result))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match student_login(conn, &req.params) {
        Ok((name, result)) => {
            state.session.identity = Some(Identity::Student(name));
            ok(&req.id, result)
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_admin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let secret = match get_required_str(&req.params, "secret") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if secret != state.admin_secret {
        return HandlerErr::new("wrong_password", "admin secret does not match").response(&req.id);
    }
    state.session.identity = Some(Identity::Admin);
    ok(&req.id, json!({ "admin": true }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.identity = None;
    ok(&req.id, json!({ "loggedOut": true }))
}

fn change_password(
    conn: &Connection,
    name: &str,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let new_pw = get_required_str(params, "newPassword")?;
    let confirm = get_required_str(params, "confirm")?;
    if new_pw.chars().count() < 4 {
        return Err(HandlerErr::new(
            "validation_failed",
            "password must be at least 4 characters",
        ));
    }
    if new_pw != confirm {
        return Err(HandlerErr::new(
            "validation_failed",
            "password confirmation does not match",
        ));
    }
    let updated = conn
        .execute(
            "UPDATE students SET password = ? WHERE name = ?",
            (&new_pw, name),
        )
        .map_err(HandlerErr::db_update)?;
    if updated == 0 {
        return Err(HandlerErr::new("not_found", "no student with that name"));
    }
    Ok(json!({ "changed": true }))
}

fn handle_change_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match require_student(state) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match change_password(conn, &name, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.admin" => Some(handle_admin(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.changePassword" => Some(handle_change_password(state, req)),
        _ => None,
    }
}
