use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog;

pub const MIN_GRADE: f64 = 0.0;
pub const MAX_GRADE: f64 = 20.0;

/// Flat status set. Any status may move to any other; there is no workflow
/// beyond the passed/not-passed distinction the validator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    InProgress,
    Failed,
    Withdrawn,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::InProgress => "in_progress",
            Status::Failed => "failed",
            Status::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "passed" => Some(Status::Passed),
            "in_progress" => Some(Status::InProgress),
            "failed" => Some(Status::Failed),
            "withdrawn" => Some(Status::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseRecord {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: String,
    pub grade: Option<f64>,
    pub term_taken: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
    pub auto_generated: bool,
    pub updated_at: Option<String>,
}

#[derive(Debug)]
pub enum RecordError {
    UnknownCourse(String),
    InvalidInput {
        field: &'static str,
        message: String,
    },
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for RecordError {
    fn from(e: rusqlite::Error) -> Self {
        RecordError::Db(e)
    }
}

/// Mutable fields accepted by `upsert_record`. `status` has already been
/// parsed; grade range is checked here so nothing malformed reaches the db.
pub struct RecordFields {
    pub status: Status,
    pub grade: Option<f64>,
    pub term_taken: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
}

fn row_to_record(r: &Row) -> Result<StudentCourseRecord, rusqlite::Error> {
    Ok(StudentCourseRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        course_id: r.get(2)?,
        status: r.get(3)?,
        grade: r.get(4)?,
        term_taken: r.get(5)?,
        start_date: r.get(6)?,
        end_date: r.get(7)?,
        notes: r.get(8)?,
        auto_generated: r.get::<_, i64>(9)? != 0,
        updated_at: r.get(10)?,
    })
}

const RECORD_COLUMNS: &str = "id, student_id, course_id, status, grade, term_taken, \
     start_date, end_date, notes, auto_generated, updated_at";

pub fn list_records(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<StudentCourseRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM student_course_records WHERE student_id = ? ORDER BY course_id",
        RECORD_COLUMNS
    ))?;
    let rows = stmt.query_map([student_id], |r| row_to_record(r))?;
    rows.collect()
}

pub fn get_active_record(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<Option<StudentCourseRecord>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {} FROM student_course_records
             WHERE student_id = ? AND course_id = ?
             ORDER BY updated_at DESC LIMIT 1",
            RECORD_COLUMNS
        ),
        (student_id, course_id),
        |r| row_to_record(r),
    )
    .optional()
}

fn validate_fields(fields: &RecordFields) -> Result<(), RecordError> {
    if let Some(g) = fields.grade {
        if !(MIN_GRADE..=MAX_GRADE).contains(&g) || !g.is_finite() {
            return Err(RecordError::InvalidInput {
                field: "grade",
                message: format!("grade must be between {} and {}, got {}", MIN_GRADE, MAX_GRADE, g),
            });
        }
    }
    Ok(())
}

/// Update the active record for (student, course) in place, or create one.
/// This is the only write path for records and is what keeps the pair unique.
pub fn upsert_record(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    fields: &RecordFields,
    auto_generated: bool,
) -> Result<StudentCourseRecord, RecordError> {
    validate_fields(fields)?;
    if catalog::get_course(conn, course_id)?.is_none() {
        return Err(RecordError::UnknownCourse(course_id.to_string()));
    }

    let now = Utc::now().to_rfc3339();
    let existing = get_active_record(conn, student_id, course_id)?;

    let id = match existing {
        Some(rec) => {
            conn.execute(
                "UPDATE student_course_records
                 SET status = ?, grade = ?, term_taken = ?, start_date = ?,
                     end_date = ?, notes = ?, auto_generated = ?, updated_at = ?
                 WHERE id = ?",
                (
                    fields.status.as_str(),
                    fields.grade,
                    &fields.term_taken,
                    &fields.start_date,
                    &fields.end_date,
                    &fields.notes,
                    auto_generated as i64,
                    &now,
                    &rec.id,
                ),
            )?;
            rec.id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO student_course_records(
                    id, student_id, course_id, status, grade, term_taken,
                    start_date, end_date, notes, auto_generated, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    student_id,
                    course_id,
                    fields.status.as_str(),
                    fields.grade,
                    &fields.term_taken,
                    &fields.start_date,
                    &fields.end_date,
                    &fields.notes,
                    auto_generated as i64,
                    &now,
                ),
            )?;
            id
        }
    };

    get_active_record(conn, student_id, course_id)?
        .filter(|r| r.id == id)
        .ok_or_else(|| RecordError::Db(rusqlite::Error::QueryReturnedNoRows))
}

/// Unconditional delete. Dependent courses the student passed using this
/// record as a prerequisite are not re-checked; see DESIGN.md.
pub fn delete_record(conn: &Connection, record_id: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute(
        "DELETE FROM student_course_records WHERE id = ?",
        [record_id],
    )?;
    Ok(n > 0)
}

/// Course ids for which the student has a passed active record.
pub fn passed_course_ids(
    conn: &Connection,
    student_id: &str,
) -> Result<std::collections::HashSet<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT course_id FROM student_course_records
         WHERE student_id = ? AND status = 'passed'",
    )?;
    let rows = stmt.query_map([student_id], |r| r.get::<_, String>(0))?;
    rows.collect()
}
