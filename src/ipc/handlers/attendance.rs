use rusqlite::Connection;
use serde_json::json;

use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_admin, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger;

struct Recorded {
    outcome: ledger::AttendanceOutcome,
    date: String,
    feed_line: String,
}

/// One attendance event: parse the annotated balance leniently, write back
/// plain integers plus today's date. Paused or ended students are not
/// blocked; the front desk decides who gets marked.
fn record(conn: &Connection, params: &serde_json::Value) -> Result<Recorded, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let row = db::find_student_by_name(conn, &name)
        .map_err(HandlerErr::db_query)?
        .ok_or_else(|| HandlerErr::new("not_found", "no student with that name"))?;

    let now = ledger::studio_now();
    let outcome = ledger::apply_attendance(&row.remaining_credits, &row.total_attended);
    let date = ledger::today_string(now);

    conn.execute(
        "UPDATE students SET remaining_credits = ? WHERE id = ?",
        (outcome.remaining.to_string(), &row.id),
    )
    .map_err(HandlerErr::db_update)?;
    conn.execute(
        "UPDATE students SET total_attended = ? WHERE id = ?",
        (outcome.total.to_string(), &row.id),
    )
    .map_err(HandlerErr::db_update)?;
    conn.execute(
        "UPDATE students SET last_attendance_date = ? WHERE id = ?",
        (&date, &row.id),
    )
    .map_err(HandlerErr::db_update)?;

    let feed_line = format!(
        "[{}] attendance recorded for {} (credit deducted)",
        now.format("%H:%M:%S"),
        row.name
    );
    Ok(Recorded {
        outcome,
        date,
        feed_line,
    })
}

fn handle_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_admin(state) {
        return e.response(&req.id);
    }
    let conn = match require_store(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match record(conn, &req.params) {
        Ok(recorded) => {
            state.session.push_feed(recorded.feed_line);
            ok(
                &req.id,
                json!({
                    "remaining": recorded.outcome.remaining,
                    "total": recorded.outcome.total,
                    "lowBalance": recorded.outcome.low_balance,
                    "date": recorded.date,
                }),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.record" => Some(handle_record(state, req)),
        _ => None,
    }
}
