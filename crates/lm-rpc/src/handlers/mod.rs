//! JSON-RPC request handlers, split by domain.

mod faces;
mod nodes;
mod session;
mod shared;

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use learning_machine::{MachineError, SampleRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

// ============================================================================
// HTTP handlers
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// One face as a PNG image, addressed by token or index.
pub async fn handle_face_resource(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Response {
    let image = SampleRef::from(image_id);
    match state
        .with_context(move |context| faces::face_png(context, image))
        .await
    {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => {
            let status = match e {
                MachineError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"success": false, "error": e.to_string()}))).into_response()
        }
    }
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    // Handle built-in methods
    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let result = dispatch_method(&state, method, &params).await;

    match result {
        Ok(value) => {
            let wrapped = wrap_response(method, value);
            (StatusCode::OK, Json(JsonRpcResponse::success(id, wrapped)))
        }
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
async fn dispatch_method(
    state: &Arc<AppState>,
    method: &str,
    params: &Value,
) -> learning_machine::Result<Value> {
    match method {
        // Faces
        "get_faces" => faces::get_faces(state, params).await,
        "get_face" => faces::get_face(state, params).await,
        "predict_face" => faces::predict_face(state, params).await,
        "annotate" => faces::annotate(state, params).await,
        "discard_face" => faces::discard_face(state, params).await,

        // Session
        "persist_session" => session::persist_session(state, params).await,
        "list_classes" => session::list_classes(state, params).await,
        "get_session_status" => session::get_session_status(state, params).await,

        _ => {
            warn!("Unknown method: {}", method);
            Err(MachineError::Other(format!("Method not found: {}", method)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learning_machine::{ImagePayload, InMemoryStore, MachineContext, SampleStore};
    use tempfile::TempDir;

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"data": "test"}));
        assert!(response.error.is_none());
        assert!(response.result.is_some());
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response = JsonRpcResponse::error(Some(json!(1)), -32600, "Test error".into());
        assert!(response.error.is_some());
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    fn test_state(temp_dir: &TempDir) -> Arc<AppState> {
        let context = MachineContext::builder(temp_dir.path())
            .auto_create_dirs(true)
            .classes(vec!["happy".to_string(), "neutral".to_string()])
            .input_size(2, 2)
            .store_loader(Box::new(|| {
                let items = (0..4u8)
                    .map(|i| (ImagePayload::grayscale(2, 2, vec![i; 4]).unwrap(), 0))
                    .collect();
                Ok(Box::new(InMemoryStore::new(items)) as Box<dyn SampleStore>)
            }))
            .build()
            .unwrap();
        AppState::new(context)
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        let err = dispatch_method(&state, "no_such_method", &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Method not found"));
    }

    #[tokio::test]
    async fn test_missing_image_id() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        let err = dispatch_method(&state, "get_face", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_rpc_error_code(), -32602);
    }

    #[tokio::test]
    async fn test_get_face_by_index() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        let face = dispatch_method(&state, "get_face", &json!({"image_id": 2}))
            .await
            .unwrap();
        assert_eq!(face["index"], json!(2));
        assert_eq!(face["label"], json!("happy"));
        assert_eq!(face["pixels"], json!([2, 2, 2, 2]));
    }

    #[tokio::test]
    async fn test_unknown_label_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        let err = dispatch_method(
            &state,
            "annotate",
            &json!({"image_id": 0, "label": "ecstatic", "new_nodes": 0}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MachineError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_face_resource_is_png() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let response = handle_face_resource(State(state.clone()), Path("1".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "image/png"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));

        let mut reader = png::Decoder::new(&body[..]).read_info().unwrap();
        assert_eq!(reader.info().width, 2);
        assert_eq!(reader.info().height, 2);
        assert_eq!(reader.info().color_type, png::ColorType::Grayscale);
        let mut pixels = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut pixels).unwrap();
        assert_eq!(&pixels[..4], &[1, 1, 1, 1]);

        let missing = handle_face_resource(State(state), Path("not-a-token".to_string())).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_annotate_checks_pool_before_updating() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        // Four faces, one discarded: only three can be drawn.
        let err = dispatch_method(
            &state,
            "annotate",
            &json!({"image_id": 0, "label": "not-human", "new_nodes": 4}),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            MachineError::InsufficientPool { requested: 4, available: 3 }
        ));

        // A real label fails on the pool before any weights are needed.
        let err = dispatch_method(
            &state,
            "annotate",
            &json!({"image_id": 0, "label": "happy", "new_nodes": 5}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MachineError::InsufficientPool { .. }));

        let status = dispatch_method(&state, "get_session_status", &json!({}))
            .await
            .unwrap();
        assert_eq!(status["excluded"], json!(0));
        assert_eq!(status["returned"], json!(0));
        assert_eq!(status["weights_loaded"], json!(false));
    }

    #[tokio::test]
    async fn test_not_human_discards_without_weights() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        let nodes = dispatch_method(
            &state,
            "annotate",
            &json!({"image_id": 1, "label": "not-human", "new_nodes": 0}),
        )
        .await
        .unwrap();
        assert_eq!(nodes, json!([]));
        let status = dispatch_method(&state, "get_session_status", &json!({}))
            .await
            .unwrap();
        assert_eq!(status["excluded"], json!(1));
    }
}
