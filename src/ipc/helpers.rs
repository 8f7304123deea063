use rusqlite::Connection;
use serde_json::json;

use crate::catalog::CatalogError;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::records::RecordError;

/// Handler-level failure, turned into the IPC error envelope at the edge.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        HandlerErr {
            code: "invalid_input",
            message: message.into(),
            details: Some(json!({ "field": field })),
        }
    }

    fn no_workspace() -> Self {
        HandlerErr {
            code: "no_workspace",
            message: "no workspace selected".to_string(),
            details: None,
        }
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: format!("{e:?}"),
            details: None,
        }
    }
}

impl From<RecordError> for HandlerErr {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::UnknownCourse(id) => HandlerErr {
                code: "unknown_course",
                message: format!("course not found: {}", id),
                details: None,
            },
            RecordError::InvalidInput { field, message } => HandlerErr::invalid_input(field, message),
            RecordError::Db(e) => e.into(),
        }
    }
}

impl From<CatalogError> for HandlerErr {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::UnknownCourse(id) => HandlerErr {
                code: "unknown_course",
                message: format!("course not found: {}", id),
                details: None,
            },
            CatalogError::DuplicateCode(code) => HandlerErr {
                code: "duplicate_code",
                message: format!("course code already in use: {}", code),
                details: Some(json!({ "field": "code" })),
            },
            CatalogError::InvalidInput { field, message } => {
                HandlerErr::invalid_input(field, message)
            }
            CatalogError::Db(e) => e.into(),
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(HandlerErr::no_workspace)
}

pub fn require_db_mut(state: &mut AppState) -> Result<&mut Connection, HandlerErr> {
    state.db.as_mut().ok_or_else(HandlerErr::no_workspace)
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_optional_f64(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}
