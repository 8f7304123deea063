use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_f64, get_optional_str, get_required_str, require_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, RecordFields, Status};

pub fn parse_status(raw: &str) -> Result<Status, HandlerErr> {
    Status::parse(raw).ok_or_else(|| {
        HandlerErr::invalid_input(
            "status",
            format!(
                "status must be one of passed, in_progress, failed, withdrawn; got {}",
                raw
            ),
        )
    })
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let records = records::list_records(conn, &student_id)?;
    Ok(json!({ "records": records }))
}

fn upsert(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_required_str(params, "courseId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;

    let fields = RecordFields {
        status,
        grade: get_optional_f64(params, "grade")?,
        term_taken: get_optional_str(params, "termTaken")?,
        start_date: get_optional_str(params, "startDate")?,
        end_date: get_optional_str(params, "endDate")?,
        notes: get_optional_str(params, "notes")?,
    };

    let record = records::upsert_record(conn, &student_id, &course_id, &fields, false)?;
    Ok(json!({ "record": record }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let record_id = get_required_str(params, "recordId")?;
    let deleted = records::delete_record(conn, &record_id)?;
    Ok(json!({ "deleted": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.list" => list(state, &req.params),
        "records.upsert" => upsert(state, &req.params),
        "records.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
