use rusqlite::Connection;
use std::path::Path;

const SCHEMA_VERSION: i64 = 1;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("studio.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            name TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL,
            password TEXT,
            price_plan TEXT,
            next_booking_slot TEXT,
            registered_at TEXT,
            last_attendance_date TEXT,
            end_date TEXT,
            remaining_credits TEXT NOT NULL DEFAULT '0',
            total_attended TEXT NOT NULL DEFAULT '0',
            progress_notes TEXT,
            vehicle_plate TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_booking ON students(next_booking_slot)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS waitlist(
            id TEXT PRIMARY KEY,
            student_name TEXT NOT NULL,
            requested_slot TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Earlier stores predate the gallery column. Add it in place.
    ensure_students_portfolio_urls(&conn)?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(conn)
}

fn ensure_students_portfolio_urls(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "portfolio_urls")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN portfolio_urls TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub status: String,
    pub name: String,
    pub phone: String,
    pub password: Option<String>,
    pub price_plan: Option<String>,
    pub next_booking_slot: Option<String>,
    pub registered_at: Option<String>,
    pub last_attendance_date: Option<String>,
    pub end_date: Option<String>,
    pub remaining_credits: String,
    pub total_attended: String,
    pub progress_notes: Option<String>,
    pub vehicle_plate: Option<String>,
    pub portfolio_urls: Option<String>,
}

const STUDENT_COLUMNS: &str = "id, status, name, phone, password, price_plan, next_booking_slot,
     registered_at, last_attendance_date, end_date, remaining_credits,
     total_attended, progress_notes, vehicle_plate, portfolio_urls";

fn row_to_student(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        status: r.get(1)?,
        name: r.get(2)?,
        phone: r.get(3)?,
        password: r.get(4)?,
        price_plan: r.get(5)?,
        next_booking_slot: r.get(6)?,
        registered_at: r.get(7)?,
        last_attendance_date: r.get(8)?,
        end_date: r.get(9)?,
        remaining_credits: r.get(10)?,
        total_attended: r.get(11)?,
        progress_notes: r.get(12)?,
        vehicle_plate: r.get(13)?,
        portfolio_urls: r.get(14)?,
    })
}

/// Full-table read. Every interaction re-fetches; there is no cache layer.
pub fn fetch_students(conn: &Connection) -> rusqlite::Result<Vec<StudentRow>> {
    let sql = format!("SELECT {} FROM students ORDER BY rowid", STUDENT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |r| row_to_student(r))?;
    rows.collect()
}

/// Name is the login key; registration enforces uniqueness so at most one
/// row can match.
pub fn find_student_by_name(
    conn: &Connection,
    name: &str,
) -> rusqlite::Result<Option<StudentRow>> {
    use rusqlite::OptionalExtension;
    let sql = format!("SELECT {} FROM students WHERE name = ?", STUDENT_COLUMNS);
    conn.query_row(&sql, [name], |r| row_to_student(r)).optional()
}

pub fn find_student_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<StudentRow>> {
    use rusqlite::OptionalExtension;
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    conn.query_row(&sql, [id], |r| row_to_student(r)).optional()
}
