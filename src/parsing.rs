use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub const PHASE_RUNNING: &str = "Running";
pub const PHASE_STOPPED: &str = "Stopped";
pub const PHASE_FAILED: &str = "Failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("status.phase not found")]
    Missing,
    #[error("{field} is a {found}, expected {expected}")]
    WrongType {
        field: &'static str,
        found: &'static str,
        expected: &'static str,
    },
}

/// Read `status.phase` from an untyped object body.
pub fn extract_phase(data: &Value) -> Result<String, PhaseError> {
    let status = match data.get("status") {
        None => return Err(PhaseError::Missing),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(PhaseError::WrongType {
                field: "status",
                found: json_type_name(other),
                expected: "object",
            })
        }
    };
    match status.get("phase") {
        None => Err(PhaseError::Missing),
        Some(Value::String(phase)) => Ok(phase.clone()),
        Some(other) => Err(PhaseError::WrongType {
            field: "status.phase",
            found: json_type_name(other),
            expected: "string",
        }),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Healthy phases that clear any recorded abnormality.
pub fn is_terminal_phase(phase: &str) -> bool {
    phase == PHASE_RUNNING || phase == PHASE_STOPPED
}

pub fn is_failed_phase(phase: &str) -> bool {
    phase == PHASE_FAILED
}

pub fn parse_bool_flag(v: &str) -> bool {
    matches!(v, "1" | "true" | "TRUE" | "True")
}

pub fn parse_seconds(v: &str) -> Option<Duration> {
    match v.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}
