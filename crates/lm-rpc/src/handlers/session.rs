//! Session bookkeeping handlers.

use crate::server::AppState;
use learning_machine::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn persist_session(state: &Arc<AppState>, _params: &Value) -> Result<Value> {
    state
        .with_context(|context| {
            context.persist()?;
            Ok(json!(context.sampler().excluded().len()))
        })
        .await
}

pub async fn list_classes(state: &Arc<AppState>, _params: &Value) -> Result<Value> {
    state
        .with_context(|context| Ok(json!(context.sampler().classes())))
        .await
}

pub async fn get_session_status(state: &Arc<AppState>, _params: &Value) -> Result<Value> {
    state
        .with_context(|context| {
            let sampler = context.sampler();
            Ok(json!({
                "success": true,
                "model": context.model_key().as_str(),
                "dataset": context.dataset_key().as_str(),
                "classes": sampler.classes(),
                "returned": sampler.returned().len(),
                "excluded": sampler.excluded().len(),
                "store_bound": sampler.is_bound(),
                "weights_loaded": context.machine().is_loaded(),
            }))
        })
        .await
}
