//! Lazy model lifecycle and the predict/fit protocol.

use super::checkpoint::{read_checkpoint, write_checkpoint};
use super::loss::Criterion;
use super::network::Network;
use super::optim::Optimizer;
use super::variant::MachineVariant;
use super::weights::WeightCache;
use crate::config::ModelKey;
use crate::dataset::Sample;
use crate::error::{MachineError, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Object-safe view of a learning machine, independent of its variant.
pub trait Machine: Send {
    fn key(&self) -> ModelKey;

    fn num_classes(&self) -> usize;

    fn is_loaded(&self) -> bool;

    /// One score vector per sample, in input order.
    ///
    /// With `as_probability`, each row is min-max scaled and renormalized to
    /// sum to one; see [`min_max_renormalize`].
    fn predict(&mut self, samples: &[Sample], as_probability: bool) -> Result<Vec<Vec<f32>>>;

    /// One optimizer step over the whole batch. Returns the batch loss.
    fn fit(&mut self, samples: &[Sample]) -> Result<f32>;

    /// Write freshly initialized weights to the cache unless a file exists.
    fn write_initial_weights(&self, seed: u64) -> Result<PathBuf>;
}

/// A model variant plus its lazily materialized state.
///
/// Weights are acquired and the network built on the first `predict` or
/// `fit`. The optimizer and criterion are built on the first `fit`; optimizer
/// state then carries over between calls. Nothing is ever unloaded.
pub struct LearningMachine<V: MachineVariant> {
    variant: V,
    cache: WeightCache,
    network: Option<Box<dyn Network>>,
    optimizer: Option<Box<dyn Optimizer>>,
    criterion: Option<Box<dyn Criterion>>,
}

impl<V: MachineVariant> LearningMachine<V> {
    pub fn new(variant: V, cache: WeightCache) -> Self {
        Self {
            variant,
            cache,
            network: None,
            optimizer: None,
            criterion: None,
        }
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Cache location of this machine's weights.
    pub fn weights_path(&self) -> PathBuf {
        self.cache.path_for(self.variant.artifact())
    }

    /// The network's parameters, if loaded.
    pub fn network(&self) -> Option<&dyn Network> {
        self.network.as_deref()
    }

    fn load_network(&mut self) -> Result<&dyn Network> {
        if self.network.is_none() {
            let path = self.cache.ensure(self.variant.artifact())?;
            let tensors = read_checkpoint(&path)?;
            let network = self.variant.build_network(tensors)?;
            info!(
                "Loaded {} model from {}",
                self.variant.key(),
                path.display()
            );
            self.network = Some(network);
        }
        self.network
            .as_deref()
            .ok_or_else(|| MachineError::Other("network failed to load".to_string()))
    }

    fn inputs(&self, samples: &[Sample]) -> Vec<Vec<f32>> {
        let transform = self.variant.transform();
        samples.iter().map(|s| transform.apply(&s.image)).collect()
    }
}

impl<V: MachineVariant> Machine for LearningMachine<V> {
    fn key(&self) -> ModelKey {
        self.variant.key()
    }

    fn num_classes(&self) -> usize {
        self.variant.num_classes()
    }

    fn is_loaded(&self) -> bool {
        self.network.is_some()
    }

    fn predict(&mut self, samples: &[Sample], as_probability: bool) -> Result<Vec<Vec<f32>>> {
        let inputs = self.inputs(samples);
        let network = self.load_network()?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let raw = network.forward(&inputs)?;
        if !as_probability {
            return Ok(raw);
        }
        Ok(raw.iter().map(|row| min_max_renormalize(row)).collect())
    }

    fn fit(&mut self, samples: &[Sample]) -> Result<f32> {
        if samples.is_empty() {
            return Err(MachineError::InvalidParams {
                message: "fit needs at least one sample".to_string(),
            });
        }
        let inputs = self.inputs(samples);
        let targets: Vec<usize> = samples.iter().map(|s| s.label).collect();
        self.load_network()?;

        if self.optimizer.is_none() {
            self.optimizer = Some(self.variant.build_optimizer());
        }
        if self.criterion.is_none() {
            self.criterion = Some(self.variant.build_criterion());
        }
        let (Some(network), Some(optimizer), Some(criterion)) = (
            self.network.as_mut(),
            self.optimizer.as_mut(),
            self.criterion.as_ref(),
        ) else {
            return Err(MachineError::Other(
                "training state failed to initialize".to_string(),
            ));
        };

        let outputs = network.forward(&inputs)?;
        let (loss, grad_outputs) = criterion.loss(&outputs, &targets)?;
        let grads = network.backward(&inputs, &grad_outputs)?;
        optimizer.step(network.parameters_mut(), &grads)?;

        debug!(
            "Fitted {} samples on {} model, loss {:.4}",
            samples.len(),
            self.variant.key(),
            loss
        );
        Ok(loss)
    }

    fn write_initial_weights(&self, seed: u64) -> Result<PathBuf> {
        let path = self.weights_path();
        if path.exists() {
            debug!("Keeping existing weights at {}", path.display());
            return Ok(path);
        }
        write_checkpoint(&path, &self.variant.initial_checkpoint(seed))?;
        info!(
            "Wrote initial {} weights to {}",
            self.variant.key(),
            path.display()
        );
        Ok(path)
    }
}

/// Scale a score row to `[0, 1]` by its min and max, then divide by the sum.
///
/// A constant row has `max == min`; every entry is then `0 / 0` and the
/// result is all NaN.
pub fn min_max_renormalize(row: &[f32]) -> Vec<f32> {
    let min = row.iter().copied().fold(f32::INFINITY, f32::min);
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    let scaled: Vec<f32> = row.iter().map(|&x| (x - min) / range).collect();
    let sum: f32 = scaled.iter().sum();
    scaled.into_iter().map(|x| x / sum).collect()
}
