use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "acadhist.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates all tables idempotently. Shared with in-memory connections in tests.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL,
            semester TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_prerequisites(
            course_id TEXT NOT NULL,
            prerequisite_id TEXT NOT NULL,
            PRIMARY KEY(course_id, prerequisite_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(prerequisite_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_prerequisites_course
         ON course_prerequisites(course_id)",
        [],
    )?;

    // No UNIQUE(student_id, course_id) here: the one-active-record-per-pair
    // invariant is owned by records::upsert_record, which updates in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_course_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            status TEXT NOT NULL,
            grade REAL,
            term_taken TEXT,
            start_date TEXT,
            end_date TEXT,
            notes TEXT,
            auto_generated INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_student ON student_course_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_student_course
         ON student_course_records(student_id, course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Early workspaces predate the updated_at column. Add it when missing.
    ensure_records_updated_at(conn)?;

    Ok(())
}

fn ensure_records_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "student_course_records", "updated_at")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE student_course_records ADD COLUMN updated_at TEXT",
        [],
    )?;
    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    use rusqlite::OptionalExtension;
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
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
