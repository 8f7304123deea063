use std::path::PathBuf;

use serde_json::json;

use crate::backup;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn export(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(workspace) = state.workspace.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "no workspace selected".to_string(),
            details: None,
        });
    };
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);

    let summary = backup::export_workspace_bundle(workspace, &out_path).map_err(|e| HandlerErr {
        code: "export_failed",
        message: format!("{e:?}"),
        details: None,
    })?;
    Ok(json!({
        "bundleFormat": summary.bundle_format,
        "dbSha256": summary.db_sha256,
        "outPath": out_path.to_string_lossy(),
    }))
}

fn import(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let workspace = PathBuf::from(get_required_str(params, "workspacePath")?);

    // Release any handle on the destination before the extracted db is
    // renamed into place.
    state.db = None;

    let summary =
        backup::import_workspace_bundle(&in_path, &workspace).map_err(|e| HandlerErr {
            code: "import_failed",
            message: format!("{e:?}"),
            details: None,
        })?;

    let conn = db::open_db(&workspace).map_err(|e| HandlerErr {
        code: "db_open_failed",
        message: format!("{e:?}"),
        details: None,
    })?;
    state.workspace = Some(workspace.clone());
    state.db = Some(conn);

    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "dbSha256": summary.db_sha256,
        "workspacePath": workspace.to_string_lossy(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => export(state, &req.params),
        "backup.import" => import(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
