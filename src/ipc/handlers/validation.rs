use chrono::Utc;
use serde_json::json;

use crate::backfill;
use crate::ipc::error::ok;
use crate::ipc::handlers::records::parse_status;
use crate::ipc::helpers::{get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::validate::{self, ValidationResult};

fn check(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_required_str(params, "courseId")?;
    let proposed = parse_status(&get_required_str(params, "proposedStatus")?)?;

    let policy = backfill::load_policy(conn)?;
    let today = Utc::now().date_naive();

    match validate::validate(conn, &student_id, &course_id, proposed, &policy, today)? {
        ValidationResult::Valid => Ok(json!({ "valid": true })),
        ValidationResult::Invalid {
            missing,
            suggestions,
        } => Ok(json!({
            "valid": false,
            "missing": missing,
            "suggestions": suggestions,
        })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "validation.check" => Some(match check(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
