//! Face drawing, prediction and annotation handlers.

use super::nodes::make_nodes;
use super::shared::{get_count_param, get_sample_list_param, require_sample_param, require_str_param};
use crate::server::AppState;
use learning_machine::config::SamplerConfig;
use learning_machine::{ImagePayload, MachineContext, MachineError, Result, Sample, SampleRef};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Label that removes a face from the session instead of training on it.
pub(crate) const NOT_HUMAN_LABEL: &str = "not-human";

/// Predict `samples` and turn them into frontend nodes.
fn predict_nodes(context: &mut MachineContext, samples: Vec<Sample>) -> Result<Value> {
    if samples.is_empty() {
        return Ok(json!([]));
    }
    let (sampler, machine) = context.parts_mut();
    let predictions = machine.predict(&samples, true)?;
    let nodes = make_nodes(&samples, &predictions, sampler.classes(), sampler.codec());
    Ok(serde_json::to_value(nodes)?)
}

/// Describe one face with its stored label and raw pixels.
pub(crate) fn describe_face(context: &mut MachineContext, image: SampleRef) -> Result<Value> {
    let sampler = context.sampler_mut();
    let sample = sampler.fetch(image)?;
    let label = sampler
        .classes()
        .get(sample.label)
        .cloned()
        .unwrap_or_default();
    Ok(json!({
        "id": sample.token(sampler.codec()),
        "index": sample.index,
        "label": label,
        "width": sample.image.width,
        "height": sample.image.height,
        "channels": sample.image.channels,
        "pixels": sample.image.pixels,
    }))
}

/// Encode a face as an 8-bit grayscale or RGB PNG.
pub(crate) fn encode_png(image: &ImagePayload) -> Result<Vec<u8>> {
    let color = match image.channels {
        1 => png::ColorType::Grayscale,
        3 => png::ColorType::Rgb,
        n => {
            return Err(MachineError::Validation {
                field: "channels".to_string(),
                message: format!("cannot encode {} channels as PNG", n),
            })
        }
    };
    let mut bytes = Vec::new();
    let mut encoder = png::Encoder::new(&mut bytes, image.width as u32, image.height as u32);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(png_error)?;
    writer.write_image_data(&image.pixels).map_err(png_error)?;
    writer.finish().map_err(png_error)?;
    Ok(bytes)
}

fn png_error(err: png::EncodingError) -> MachineError {
    MachineError::Other(format!("PNG encoding failed: {}", err))
}

/// PNG bytes of one face.
pub(crate) fn face_png(context: &mut MachineContext, image: SampleRef) -> Result<Vec<u8>> {
    let sample = context.sampler_mut().fetch(image)?;
    encode_png(&sample.image)
}

pub async fn get_faces(state: &Arc<AppState>, params: &Value) -> Result<Value> {
    let count = get_count_param(params, "count", "count")?
        .unwrap_or(SamplerConfig::DEFAULT_DRAW_COUNT);
    state
        .with_context(move |context| {
            let samples = context.sampler_mut().sample_random(count)?;
            debug!("Serving {} fresh faces", samples.len());
            predict_nodes(context, samples)
        })
        .await
}

pub async fn get_face(state: &Arc<AppState>, params: &Value) -> Result<Value> {
    let image = require_sample_param(params, "image_id", "imageId")?;
    state
        .with_context(move |context| describe_face(context, image))
        .await
}

pub async fn predict_face(state: &Arc<AppState>, params: &Value) -> Result<Value> {
    let image = require_sample_param(params, "image_id", "imageId")?;
    state
        .with_context(move |context| {
            let sample = context.sampler_mut().fetch(image)?;
            predict_nodes(context, vec![sample])
        })
        .await
}

pub async fn annotate(state: &Arc<AppState>, params: &Value) -> Result<Value> {
    let image = require_sample_param(params, "image_id", "imageId")?;
    let label = require_str_param(params, "label", "label")?;
    let current = get_sample_list_param(params, "current_nodes", "currentNodes")?;
    let new_nodes = get_count_param(params, "new_nodes", "newNodes")?.unwrap_or(1);

    state
        .with_context(move |context| {
            let (sampler, machine) = context.parts_mut();
            let index = sampler.resolve(image)?;
            let class = if label == NOT_HUMAN_LABEL {
                None
            } else {
                Some(sampler.class_index(&label).ok_or_else(|| {
                    MachineError::InvalidParams {
                        message: format!("Unknown label: {}", label),
                    }
                })?)
            };

            // Inputs and pool size are checked before the model or the
            // exclusions change.
            let mut samples = current
                .into_iter()
                .map(|r| sampler.fetch(r))
                .collect::<Result<Vec<_>>>()?;
            if new_nodes > 0 {
                let mut available = sampler.available()?;
                let leaves_pool = !sampler.returned().contains(&index)
                    && !sampler.excluded().contains(&index);
                if class.is_none() && leaves_pool {
                    available = available.saturating_sub(1);
                }
                if available < new_nodes {
                    return Err(MachineError::InsufficientPool {
                        requested: new_nodes,
                        available,
                    });
                }
            }

            match class {
                None => {
                    sampler.discard(index)?;
                    info!("Discarded sample {} as not human", index);
                }
                Some(class) => {
                    let sample = sampler.fetch(index)?;
                    let loss = machine.fit(&[sample.relabeled(class)])?;
                    info!("Annotated sample {} as {} (loss {:.4})", index, label, loss);
                }
            }

            if new_nodes > 0 {
                samples.extend(sampler.sample_random(new_nodes)?);
            }
            predict_nodes(context, samples)
        })
        .await
}

pub async fn discard_face(state: &Arc<AppState>, params: &Value) -> Result<Value> {
    let image = require_sample_param(params, "image_id", "imageId")?;
    state
        .with_context(move |context| {
            let sampler = context.sampler_mut();
            let index = sampler.discard(image)?;
            info!("Discarded sample {}", index);
            let replacement = sampler.sample_random(1)?;
            predict_nodes(context, replacement)
        })
        .await
}
