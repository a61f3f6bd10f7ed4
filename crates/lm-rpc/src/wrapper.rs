//! Response wrapping for frontend compatibility.
//!
//! The frontend expects `{success: bool, <payload key>: ...}` objects, with
//! every face-returning method answering `{success, nodes}`. Handlers return
//! raw data and this module adds the envelope.

use serde_json::{json, Value};

/// Wrap handler results to match the frontend's expected format.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        // Node lists
        "get_faces" | "predict_face" | "annotate" | "discard_face" => {
            json!({
                "success": true,
                "nodes": if result.is_null() { json!([]) } else { result }
            })
        }

        "get_face" => {
            json!({
                "success": true,
                "face": result
            })
        }

        "list_classes" => {
            json!({
                "success": true,
                "classes": if result.is_null() { json!([]) } else { result }
            })
        }

        "persist_session" => {
            json!({
                "success": true,
                "excluded": result.as_u64().unwrap_or(0)
            })
        }

        // Default: return as-is (for methods not explicitly handled)
        _ => result,
    }
}
