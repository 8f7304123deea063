use chrono::Utc;
use serde_json::json;

use crate::backfill::{self, BackfillSuggestion};
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_db_mut, HandlerErr};
use crate::ipc::types::{AppState, Request};

/// The only write path for synthetic records. Reached strictly after the UI
/// has shown the suggestions and the user confirmed them.
fn apply(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let raw = params
        .get("suggestions")
        .ok_or_else(|| HandlerErr::bad_params("missing suggestions"))?;
    let suggestions: Vec<BackfillSuggestion> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("bad suggestions: {}", e)))?;

    let conn = require_db_mut(state)?;
    let policy = backfill::load_policy(conn)?;
    let today = Utc::now().date_naive();

    let outcomes = backfill::apply(conn, &student_id, &suggestions, &policy, today)?;
    let applied = outcomes.iter().filter(|o| o.ok).count();
    let failed = outcomes.len() - applied;
    Ok(json!({
        "outcomes": outcomes,
        "applied": applied,
        "failed": failed,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backfill.apply" => Some(match apply(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
