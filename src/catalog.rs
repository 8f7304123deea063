use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

/// Course metadata as maintained by academic administration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub semester: String,
}

/// Slim view used when listing missing prerequisites back to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub code: String,
    pub name: String,
}

#[derive(Debug)]
pub enum CatalogError {
    UnknownCourse(String),
    DuplicateCode(String),
    InvalidInput {
        field: &'static str,
        message: String,
    },
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Db(e)
    }
}

pub struct CourseFields {
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub semester: String,
}

pub fn get_course(conn: &Connection, course_id: &str) -> Result<Option<Course>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, code, name, credits, semester FROM courses WHERE id = ?",
        [course_id],
        |r| {
            Ok(Course {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                credits: r.get(3)?,
                semester: r.get(4)?,
            })
        },
    )
    .optional()
}

pub fn list_courses(conn: &Connection) -> Result<Vec<Course>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id, code, name, credits, semester FROM courses ORDER BY code")?;
    let rows = stmt.query_map([], |r| {
        Ok(Course {
            id: r.get(0)?,
            code: r.get(1)?,
            name: r.get(2)?,
            credits: r.get(3)?,
            semester: r.get(4)?,
        })
    })?;
    rows.collect()
}

pub fn list_prerequisites(
    conn: &Connection,
    course_id: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT cp.prerequisite_id
         FROM course_prerequisites cp
         JOIN courses c ON c.id = cp.prerequisite_id
         WHERE cp.course_id = ?
         ORDER BY c.code",
    )?;
    let rows = stmt.query_map([course_id], |r| r.get::<_, String>(0))?;
    rows.collect()
}

/// Insert or update a course by id. New courses get a fresh uuid when the
/// caller does not supply one.
pub fn upsert_course(
    conn: &Connection,
    course_id: Option<&str>,
    fields: &CourseFields,
) -> Result<Course, CatalogError> {
    if fields.credits <= 0 {
        return Err(CatalogError::InvalidInput {
            field: "credits",
            message: format!("credits must be positive, got {}", fields.credits),
        });
    }
    if fields.code.trim().is_empty() {
        return Err(CatalogError::InvalidInput {
            field: "code",
            message: "code must not be empty".to_string(),
        });
    }

    let id = course_id
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // A different course already owning this code is a conflict, not an upsert.
    let code_owner: Option<String> = conn
        .query_row(
            "SELECT id FROM courses WHERE code = ?",
            [fields.code.trim()],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(owner) = code_owner {
        if owner != id {
            return Err(CatalogError::DuplicateCode(fields.code.trim().to_string()));
        }
    }

    conn.execute(
        "INSERT INTO courses(id, code, name, credits, semester) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           code = excluded.code,
           name = excluded.name,
           credits = excluded.credits,
           semester = excluded.semester",
        (
            &id,
            fields.code.trim(),
            &fields.name,
            fields.credits,
            &fields.semester,
        ),
    )?;

    get_course(conn, &id)?.ok_or_else(|| {
        CatalogError::Db(rusqlite::Error::QueryReturnedNoRows)
    })
}

/// Replace the declared prerequisite set for a course. Every referenced id
/// must exist; a course cannot require itself.
pub fn set_prerequisites(
    conn: &Connection,
    course_id: &str,
    prerequisite_ids: &[String],
) -> Result<(), CatalogError> {
    if get_course(conn, course_id)?.is_none() {
        return Err(CatalogError::UnknownCourse(course_id.to_string()));
    }
    for pid in prerequisite_ids {
        if pid == course_id {
            return Err(CatalogError::InvalidInput {
                field: "prerequisiteIds",
                message: "a course cannot be its own prerequisite".to_string(),
            });
        }
        if get_course(conn, pid)?.is_none() {
            return Err(CatalogError::UnknownCourse(pid.to_string()));
        }
    }

    conn.execute(
        "DELETE FROM course_prerequisites WHERE course_id = ?",
        [course_id],
    )?;
    for pid in prerequisite_ids {
        conn.execute(
            "INSERT OR IGNORE INTO course_prerequisites(course_id, prerequisite_id) VALUES(?, ?)",
            (course_id, pid),
        )?;
    }
    Ok(())
}

pub fn course_summary(conn: &Connection, course_id: &str) -> Result<CourseSummary, rusqlite::Error> {
    conn.query_row(
        "SELECT id, code, name FROM courses WHERE id = ?",
        [course_id],
        |r| {
            Ok(CourseSummary {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
            })
        },
    )
}
