use serde_json::json;

use crate::backfill::{self, BackfillPolicy};
use crate::ipc::error::ok;
use crate::ipc::helpers::{require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let policy = backfill::load_policy(conn)?;
    Ok(json!({ "policy": policy }))
}

/// Partial update: fields present in params overlay the stored policy.
fn update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let current = backfill::load_policy(conn)?;

    let mut merged = serde_json::to_value(&current)
        .map_err(|e| HandlerErr::bad_params(format!("policy serialization failed: {}", e)))?;
    let Some(incoming) = params.as_object() else {
        return Err(HandlerErr::bad_params("params must be an object"));
    };
    for (key, value) in incoming {
        merged[key.as_str()] = value.clone();
    }

    let policy: BackfillPolicy = serde_json::from_value(merged)
        .map_err(|e| HandlerErr::bad_params(format!("bad policy field: {}", e)))?;
    if let Err((field, message)) = policy.validate() {
        return Err(HandlerErr::invalid_input(field, message));
    }

    backfill::save_policy(conn, &policy)?;
    Ok(json!({ "policy": policy }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "policy.get" => get(state),
        "policy.update" => update(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
