use chrono::NaiveDate;
use rusqlite::Connection;

use crate::backfill::{self, BackfillPolicy, BackfillSuggestion};
use crate::catalog::{self, CourseSummary};
use crate::records::{self, RecordError, Status};

#[derive(Debug)]
pub enum ValidationResult {
    Valid,
    Invalid {
        missing: Vec<CourseSummary>,
        suggestions: Vec<BackfillSuggestion>,
    },
}

/// Check whether a student may mark a course as passed. Only a proposed
/// status of passed triggers the prerequisite check; every other status is
/// trivially valid. Read-only with respect to the record store.
///
/// The check is one level deep by default: missing prerequisites are not
/// themselves checked for their own prerequisites. `policy.recursive`
/// opts into walking the closure, visiting only courses that are
/// themselves unsatisfied, with a visited set so declared cycles cannot
/// loop.
pub fn validate(
    conn: &Connection,
    student_id: &str,
    target_course_id: &str,
    proposed_status: Status,
    policy: &BackfillPolicy,
    today: NaiveDate,
) -> Result<ValidationResult, RecordError> {
    if catalog::get_course(conn, target_course_id)?.is_none() {
        return Err(RecordError::UnknownCourse(target_course_id.to_string()));
    }
    if proposed_status != Status::Passed {
        return Ok(ValidationResult::Valid);
    }

    let passed = records::passed_course_ids(conn, student_id)?;
    let missing_ids = if policy.recursive {
        missing_closure(conn, target_course_id, &passed)?
    } else {
        catalog::list_prerequisites(conn, target_course_id)?
            .into_iter()
            .filter(|id| !passed.contains(id))
            .collect()
    };

    if missing_ids.is_empty() {
        return Ok(ValidationResult::Valid);
    }

    let mut missing = Vec::with_capacity(missing_ids.len());
    for id in &missing_ids {
        missing.push(catalog::course_summary(conn, id)?);
    }
    missing.sort_by(|a, b| a.code.cmp(&b.code));

    let suggestions = backfill::plan(&missing, policy, today);
    Ok(ValidationResult::Invalid {
        missing,
        suggestions,
    })
}

fn missing_closure(
    conn: &Connection,
    target_course_id: &str,
    passed: &std::collections::HashSet<String>,
) -> Result<Vec<String>, RecordError> {
    let mut visited = std::collections::HashSet::new();
    let mut missing = Vec::new();
    let mut frontier = vec![target_course_id.to_string()];

    while let Some(course_id) = frontier.pop() {
        if !visited.insert(course_id.clone()) {
            continue;
        }
        for prereq in catalog::list_prerequisites(conn, &course_id)? {
            if passed.contains(&prereq) {
                continue;
            }
            if !visited.contains(&prereq) {
                if !missing.contains(&prereq) {
                    missing.push(prereq.clone());
                }
                frontier.push(prereq);
            }
        }
    }

    Ok(missing)
}
