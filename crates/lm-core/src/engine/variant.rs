//! Concrete model variants.
//!
//! A variant names its checkpoint and preprocessing and knows how to build its
//! network, optimizer and criterion. [`LearningMachine`](super::LearningMachine)
//! supplies lazy loading, prediction and fitting for every variant.

use super::checkpoint::TensorMap;
use super::loss::{Criterion, CrossEntropyLoss};
use super::network::{DenseNet, MlpNet, Network};
use super::optim::{Adam, Optimizer, Sgd};
use super::transform::PixelTransform;
use super::weights::WeightArtifact;
use crate::config::ModelKey;
use crate::dataset::{FER_CLASSES, FER_IMAGE_HEIGHT, FER_IMAGE_WIDTH};
use crate::error::Result;

pub trait MachineVariant: Send {
    fn key(&self) -> ModelKey;

    /// Where the weights are cached and downloaded from.
    fn artifact(&self) -> &WeightArtifact;

    fn transform(&self) -> PixelTransform;

    /// Length of one transformed input row.
    fn input_len(&self) -> usize;

    fn num_classes(&self) -> usize;

    fn build_network(&self, tensors: TensorMap) -> Result<Box<dyn Network>>;

    fn build_optimizer(&self) -> Box<dyn Optimizer>;

    fn build_criterion(&self) -> Box<dyn Criterion> {
        Box::new(CrossEntropyLoss)
    }

    /// Freshly initialized weights, deterministic for a given seed.
    fn initial_checkpoint(&self, seed: u64) -> TensorMap;
}

/// Input geometry shared by the reference variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub width: usize,
    pub height: usize,
    pub classes: usize,
}

impl Default for InputShape {
    fn default() -> Self {
        Self {
            width: FER_IMAGE_WIDTH,
            height: FER_IMAGE_HEIGHT,
            classes: FER_CLASSES.len(),
        }
    }
}

/// Single dense layer over RGB input, trained with SGD and momentum.
pub struct LinearVariant {
    shape: InputShape,
    artifact: WeightArtifact,
}

impl LinearVariant {
    pub const LEARNING_RATE: f32 = 0.001;
    pub const MOMENTUM: f32 = 0.9;

    pub fn new(shape: InputShape, artifact: WeightArtifact) -> Self {
        Self { shape, artifact }
    }
}

impl Default for LinearVariant {
    fn default() -> Self {
        Self::new(
            InputShape::default(),
            WeightArtifact::local(ModelKey::Linear.checkpoint_filename()),
        )
    }
}

impl MachineVariant for LinearVariant {
    fn key(&self) -> ModelKey {
        ModelKey::Linear
    }

    fn artifact(&self) -> &WeightArtifact {
        &self.artifact
    }

    fn transform(&self) -> PixelTransform {
        PixelTransform::Rgb
    }

    fn input_len(&self) -> usize {
        self.transform()
            .input_len(self.shape.width, self.shape.height)
    }

    fn num_classes(&self) -> usize {
        self.shape.classes
    }

    fn build_network(&self, tensors: TensorMap) -> Result<Box<dyn Network>> {
        Ok(Box::new(DenseNet::from_tensors(
            tensors,
            self.input_len(),
            self.num_classes(),
        )?))
    }

    fn build_optimizer(&self) -> Box<dyn Optimizer> {
        Box::new(Sgd::new(Self::LEARNING_RATE, Self::MOMENTUM))
    }

    fn initial_checkpoint(&self, seed: u64) -> TensorMap {
        DenseNet::initial_tensors(self.input_len(), self.num_classes(), seed)
    }
}

/// One ReLU hidden layer over grayscale input, trained with Adam.
pub struct MlpVariant {
    shape: InputShape,
    artifact: WeightArtifact,
}

impl MlpVariant {
    pub const HIDDEN_LEN: usize = 64;
    pub const LEARNING_RATE: f32 = 1e-4;

    pub fn new(shape: InputShape, artifact: WeightArtifact) -> Self {
        Self { shape, artifact }
    }
}

impl Default for MlpVariant {
    fn default() -> Self {
        Self::new(
            InputShape::default(),
            WeightArtifact::local(ModelKey::Mlp.checkpoint_filename()),
        )
    }
}

impl MachineVariant for MlpVariant {
    fn key(&self) -> ModelKey {
        ModelKey::Mlp
    }

    fn artifact(&self) -> &WeightArtifact {
        &self.artifact
    }

    fn transform(&self) -> PixelTransform {
        PixelTransform::Grayscale
    }

    fn input_len(&self) -> usize {
        self.transform()
            .input_len(self.shape.width, self.shape.height)
    }

    fn num_classes(&self) -> usize {
        self.shape.classes
    }

    fn build_network(&self, tensors: TensorMap) -> Result<Box<dyn Network>> {
        Ok(Box::new(MlpNet::from_tensors(
            tensors,
            self.input_len(),
            self.num_classes(),
        )?))
    }

    fn build_optimizer(&self) -> Box<dyn Optimizer> {
        Box::new(Adam::new(Self::LEARNING_RATE))
    }

    fn initial_checkpoint(&self, seed: u64) -> TensorMap {
        MlpNet::initial_tensors(
            self.input_len(),
            Self::HIDDEN_LEN,
            self.num_classes(),
            seed,
        )
    }
}
