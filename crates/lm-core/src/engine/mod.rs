//! Model lifecycle engine.
//!
//! This module provides:
//! - Weight acquisition from a local cache or a verified download
//! - Safetensors-style checkpoint reading and writing
//! - Reference networks, optimizers and the cross-entropy criterion
//! - `LearningMachine`, the lazy predict/fit wrapper over any variant

mod checkpoint;
mod fetch;
mod loss;
mod machine;
mod network;
mod optim;
mod transform;
mod variant;
mod weights;

pub use checkpoint::{
    decode_checkpoint, encode_checkpoint, read_checkpoint, write_checkpoint, Tensor, TensorMap,
};
pub use fetch::{HttpFetcher, WeightFetcher};
pub use loss::{softmax, Criterion, CrossEntropyLoss};
pub use machine::{min_max_renormalize, LearningMachine, Machine};
pub use network::{DenseNet, MlpNet, Network};
pub use optim::{Adam, Optimizer, Sgd};
pub use transform::PixelTransform;
pub use variant::{InputShape, LinearVariant, MachineVariant, MlpVariant};
pub use weights::{ManifestEntry, WeightArtifact, WeightCache, WeightDigest, WeightManifest};
