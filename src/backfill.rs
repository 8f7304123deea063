use chrono::{Months, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, CourseSummary};
use crate::db;
use crate::records::{self, RecordError, RecordFields, Status, StudentCourseRecord};

const POLICY_SETTINGS_KEY: &str = "backfill.policy";

/// Synthetic-record policy. The defaults are a product decision to unblock
/// the user, not an inference from real data; they can be overridden per
/// workspace through `policy.update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackfillPolicy {
    pub default_grade: f64,
    pub start_offset_months: u32,
    pub end_offset_months: u32,
    pub term_label: String,
    pub auto_note: String,
    pub recursive: bool,
}

impl Default for BackfillPolicy {
    fn default() -> Self {
        BackfillPolicy {
            default_grade: 16.0,
            start_offset_months: 6,
            end_offset_months: 1,
            term_label: "ANTERIOR".to_string(),
            auto_note: "Registro generado automáticamente para convalidar prerrequisito"
                .to_string(),
            recursive: false,
        }
    }
}

impl BackfillPolicy {
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if !(records::MIN_GRADE..=records::MAX_GRADE).contains(&self.default_grade)
            || !self.default_grade.is_finite()
        {
            return Err((
                "defaultGrade",
                format!(
                    "defaultGrade must be between {} and {}, got {}",
                    records::MIN_GRADE,
                    records::MAX_GRADE,
                    self.default_grade
                ),
            ));
        }
        if self.start_offset_months == 0 {
            return Err((
                "startOffsetMonths",
                "startOffsetMonths must be at least 1".to_string(),
            ));
        }
        if self.end_offset_months == 0 {
            return Err((
                "endOffsetMonths",
                "endOffsetMonths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_policy(conn: &Connection) -> anyhow::Result<BackfillPolicy> {
    match db::settings_get_json(conn, POLICY_SETTINGS_KEY)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(BackfillPolicy::default()),
    }
}

pub fn save_policy(conn: &Connection, policy: &BackfillPolicy) -> anyhow::Result<()> {
    db::settings_set_json(conn, POLICY_SETTINGS_KEY, &serde_json::to_value(policy)?)
}

/// A proposed synthetic record. Plan output carries every field populated;
/// on the wire back from the UI the synthetic fields may be omitted and are
/// re-resolved from the policy at apply time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSuggestion {
    pub course_id: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub term_taken: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_auto_generated")]
    pub auto_generated: bool,
}

fn default_auto_generated() -> bool {
    true
}

fn offset_date(today: NaiveDate, months_back: u32) -> String {
    today
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}

/// One suggestion per missing prerequisite. Proposal only; nothing is
/// written until the user confirms and the UI calls `backfill.apply`.
pub fn plan(
    missing: &[CourseSummary],
    policy: &BackfillPolicy,
    today: NaiveDate,
) -> Vec<BackfillSuggestion> {
    missing
        .iter()
        .map(|course| BackfillSuggestion {
            course_id: course.id.clone(),
            grade: Some(policy.default_grade),
            term_taken: Some(policy.term_label.clone()),
            start_date: Some(offset_date(today, policy.start_offset_months)),
            end_date: Some(offset_date(today, policy.end_offset_months)),
            notes: Some(policy.auto_note.clone()),
            auto_generated: true,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOutcome {
    pub course_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<StudentCourseRecord>,
}

enum Screened {
    Good(RecordFields),
    Bad {
        error_code: &'static str,
        message: String,
    },
}

fn screen(
    conn: &Connection,
    suggestion: &BackfillSuggestion,
    policy: &BackfillPolicy,
    today: NaiveDate,
) -> Result<Screened, rusqlite::Error> {
    if catalog::get_course(conn, &suggestion.course_id)?.is_none() {
        return Ok(Screened::Bad {
            error_code: "unknown_course",
            message: format!("course not found: {}", suggestion.course_id),
        });
    }
    let grade = suggestion.grade.unwrap_or(policy.default_grade);
    if !(records::MIN_GRADE..=records::MAX_GRADE).contains(&grade) || !grade.is_finite() {
        return Ok(Screened::Bad {
            error_code: "invalid_input",
            message: format!(
                "grade must be between {} and {}, got {}",
                records::MIN_GRADE,
                records::MAX_GRADE,
                grade
            ),
        });
    }
    Ok(Screened::Good(RecordFields {
        status: Status::Passed,
        grade: Some(grade),
        term_taken: Some(
            suggestion
                .term_taken
                .clone()
                .unwrap_or_else(|| policy.term_label.clone()),
        ),
        start_date: Some(
            suggestion
                .start_date
                .clone()
                .unwrap_or_else(|| offset_date(today, policy.start_offset_months)),
        ),
        end_date: Some(
            suggestion
                .end_date
                .clone()
                .unwrap_or_else(|| offset_date(today, policy.end_offset_months)),
        ),
        notes: Some(
            suggestion
                .notes
                .clone()
                .unwrap_or_else(|| policy.auto_note.clone()),
        ),
    }))
}

/// Apply confirmed suggestions. Suggestions that fail screening (unknown
/// course, bad grade) are reported per item; everything that screens good is
/// written inside a single transaction. Re-applying a suggestion updates the
/// existing active record rather than inserting a second one.
pub fn apply(
    conn: &mut Connection,
    student_id: &str,
    suggestions: &[BackfillSuggestion],
    policy: &BackfillPolicy,
    today: NaiveDate,
) -> Result<Vec<BackfillOutcome>, RecordError> {
    let mut screened = Vec::with_capacity(suggestions.len());
    for s in suggestions {
        screened.push(screen(conn, s, policy, today)?);
    }

    let tx = conn.transaction().map_err(RecordError::Db)?;
    let mut outcomes = Vec::with_capacity(suggestions.len());
    for (suggestion, item) in suggestions.iter().zip(screened) {
        match item {
            Screened::Bad {
                error_code,
                message,
            } => outcomes.push(BackfillOutcome {
                course_id: suggestion.course_id.clone(),
                ok: false,
                error_code: Some(error_code),
                message: Some(message),
                record: None,
            }),
            Screened::Good(fields) => {
                let record =
                    records::upsert_record(&tx, student_id, &suggestion.course_id, &fields, true)?;
                outcomes.push(BackfillOutcome {
                    course_id: suggestion.course_id.clone(),
                    ok: true,
                    error_code: None,
                    message: None,
                    record: Some(record),
                });
            }
        }
    }
    tx.commit().map_err(RecordError::Db)?;

    Ok(outcomes)
}
