//! Shared handler utilities used across RPC domains.

use learning_machine::{MachineError, Result, SampleRef};
use serde_json::Value;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| MachineError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract an optional non-negative count, rejecting negatives and non-integers.
pub(crate) fn get_count_param(params: &Value, snake: &str, camel: &str) -> Result<Option<usize>> {
    match params.get(snake).or_else(|| params.get(camel)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| MachineError::InvalidParams {
                message: format!("Parameter {} must be a non-negative integer", snake),
            }),
    }
}

/// Extract a required sample reference: a token string or an integer index.
pub(crate) fn require_sample_param(params: &Value, snake: &str, camel: &str) -> Result<SampleRef> {
    match params.get(snake).or_else(|| params.get(camel)) {
        Some(Value::String(s)) => Ok(SampleRef::from(s.as_str())),
        Some(Value::Number(n)) if n.is_i64() => Ok(SampleRef::Index(n.as_i64().unwrap_or(-1))),
        Some(_) => Err(MachineError::InvalidParams {
            message: format!("Parameter {} must be a string or an integer", snake),
        }),
        None => Err(MachineError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        }),
    }
}

/// Extract an optional list of sample references. Missing means empty.
pub(crate) fn get_sample_list_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> Result<Vec<SampleRef>> {
    let Some(value) = params.get(snake).or_else(|| params.get(camel)) else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| MachineError::InvalidParams {
        message: format!("Parameter {} must be an array", snake),
    })?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(SampleRef::from(s.as_str())),
            Value::Number(n) if n.is_i64() => Ok(SampleRef::Index(n.as_i64().unwrap_or(-1))),
            _ => Err(MachineError::InvalidParams {
                message: format!("Entries of {} must be strings or integers", snake),
            }),
        })
        .collect()
}
