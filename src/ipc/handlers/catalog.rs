use serde_json::json;

use crate::catalog::{self, CourseFields};
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn upsert_course(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = get_optional_str(params, "id")?;
    let code = get_required_str(params, "code")?;
    let name = get_required_str(params, "name")?;
    let semester = get_required_str(params, "semester")?;
    let credits = params
        .get("credits")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("missing credits"))?;

    let course = catalog::upsert_course(
        conn,
        id.as_deref(),
        &CourseFields {
            code,
            name,
            credits,
            semester,
        },
    )?;
    Ok(json!({ "course": course }))
}

fn set_prerequisites(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let course_id = get_required_str(params, "courseId")?;
    let ids = params
        .get("prerequisiteIds")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing prerequisiteIds"))?;
    let mut prerequisite_ids = Vec::with_capacity(ids.len());
    for v in ids {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::bad_params(
                "prerequisiteIds must be an array of strings",
            ));
        };
        prerequisite_ids.push(s.to_string());
    }

    catalog::set_prerequisites(conn, &course_id, &prerequisite_ids)?;
    Ok(json!({
        "courseId": course_id,
        "prerequisiteIds": prerequisite_ids,
    }))
}

fn get_course(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let course_id = get_required_str(params, "courseId")?;
    let Some(course) = catalog::get_course(conn, &course_id)? else {
        return Err(HandlerErr {
            code: "unknown_course",
            message: format!("course not found: {}", course_id),
            details: None,
        });
    };
    let prerequisite_ids = catalog::list_prerequisites(conn, &course_id)?;
    Ok(json!({
        "course": course,
        "prerequisiteIds": prerequisite_ids,
    }))
}

fn list_courses(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let courses = catalog::list_courses(conn)?;
    Ok(json!({ "courses": courses }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "catalog.upsertCourse" => upsert_course(state, &req.params),
        "catalog.setPrerequisites" => set_prerequisites(state, &req.params),
        "catalog.get" => get_course(state, &req.params),
        "catalog.list" => list_courses(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
