//! Graph node payloads sent to the labelling frontend.

use learning_machine::{IdentityCodec, Sample};
use serde::Serialize;

/// Class that contributes to the normalization but never gets a link.
pub(crate) const NEUTRAL_CLASS: &str = "neutral";

/// Edge from a face node to one emotion node.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EmotionLink {
    pub source: String,
    pub target: String,
    pub value: f32,
}

/// One face in the frontend graph.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Node {
    pub id: String,
    pub image: String,
    pub links: Vec<EmotionLink>,
    pub group: &'static str,
}

/// Resource path serving the pixels of a face.
pub(crate) fn image_path(token: &str) -> String {
    format!("/faces/{}", token)
}

/// Build one node per sample from its prediction row.
///
/// Values are divided by the row sum over every class, then the neutral
/// class is dropped. A row of NaN (constant model output) stays NaN and
/// serializes as `null`.
pub(crate) fn make_nodes(
    samples: &[Sample],
    predictions: &[Vec<f32>],
    classes: &[String],
    codec: &IdentityCodec,
) -> Vec<Node> {
    samples
        .iter()
        .zip(predictions)
        .map(|(sample, row)| {
            let id = sample.token(codec);
            let norm: f32 = row.iter().sum();
            let links = classes
                .iter()
                .zip(row)
                .filter(|(class, _)| class.as_str() != NEUTRAL_CLASS)
                .map(|(class, p)| EmotionLink {
                    source: id.clone(),
                    target: class.clone(),
                    value: p / norm,
                })
                .collect();
            Node {
                image: image_path(&id),
                id,
                links,
                group: "data",
            }
        })
        .collect()
}
