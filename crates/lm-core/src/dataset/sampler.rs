//! Session sampler: without-replacement draws over a sample store.
//!
//! Two exclusion tiers keep draws fresh:
//! - `returned`: every index handed out during this process. Never persisted.
//! - `excluded`: indices a human flagged as invalid. Loaded at construction
//!   and written back by [`SessionSampler::persist`].
//!
//! The store is bound lazily on first access and never rebound.

use super::exclusions::ExclusionFile;
use super::sample::Sample;
use super::store::SampleStore;
use crate::error::{MachineError, Result};
use crate::identity::IdentityCodec;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Deferred constructor for the backing store.
pub type StoreLoader = Box<dyn Fn() -> Result<Box<dyn SampleStore>> + Send>;

/// A reference to a sample, either a raw index or an identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleRef {
    Index(i64),
    Token(String),
}

impl From<usize> for SampleRef {
    fn from(index: usize) -> Self {
        SampleRef::Index(index as i64)
    }
}

impl From<i64> for SampleRef {
    fn from(index: i64) -> Self {
        SampleRef::Index(index)
    }
}

impl From<&str> for SampleRef {
    /// Decimal strings are raw indices; anything else is a token.
    fn from(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(index) => SampleRef::Index(index),
            Err(_) => SampleRef::Token(value.to_string()),
        }
    }
}

impl From<String> for SampleRef {
    fn from(value: String) -> Self {
        SampleRef::from(value.as_str())
    }
}

pub struct SessionSampler {
    loader: StoreLoader,
    store: Option<Box<dyn SampleStore>>,
    classes: Vec<String>,
    codec: IdentityCodec,
    returned: BTreeSet<usize>,
    excluded: BTreeSet<usize>,
    exclusions: ExclusionFile,
    rng: StdRng,
}

impl SessionSampler {
    /// Create an unbound sampler, loading the persisted exclusion list.
    pub fn new(
        loader: StoreLoader,
        classes: Vec<String>,
        exclusions_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let exclusions = ExclusionFile::new(exclusions_path);
        let excluded = exclusions.load()?;
        if !excluded.is_empty() {
            info!(
                "Restored {} excluded samples from {}",
                excluded.len(),
                exclusions.path().display()
            );
        }
        Ok(Self {
            loader,
            store: None,
            classes,
            codec: IdentityCodec::default(),
            returned: BTreeSet::new(),
            excluded,
            exclusions,
            rng: StdRng::from_os_rng(),
        })
    }

    pub fn with_codec(mut self, codec: IdentityCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Use a fixed seed so draws are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn codec(&self) -> &IdentityCodec {
        &self.codec
    }

    /// Class names in label-index order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Label index for a class name.
    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == name)
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    /// Number of samples in the backing store, binding it if needed.
    pub fn len(&mut self) -> Result<usize> {
        self.bind()
    }

    pub fn returned(&self) -> &BTreeSet<usize> {
        &self.returned
    }

    pub fn excluded(&self) -> &BTreeSet<usize> {
        &self.excluded
    }

    /// Canonical index for a reference, checked against the store size.
    pub fn resolve(&mut self, sample: impl Into<SampleRef>) -> Result<usize> {
        let raw = match sample.into() {
            SampleRef::Index(index) => index,
            SampleRef::Token(token) => self.codec.decode(&token),
        };
        let size = self.bind()?;
        if raw < 0 || raw as u64 >= size as u64 {
            return Err(MachineError::IndexOutOfRange { index: raw, size });
        }
        Ok(raw as usize)
    }

    /// Read one sample by index or token.
    pub fn fetch(&mut self, sample: impl Into<SampleRef>) -> Result<Sample> {
        let index = self.resolve(sample)?;
        self.read(index)
    }

    /// Number of samples `sample_random` can still draw.
    pub fn available(&mut self) -> Result<usize> {
        Ok(self.pool()?.len())
    }

    /// Draw `k` samples never returned before and not excluded.
    pub fn sample_random(&mut self, k: usize) -> Result<Vec<Sample>> {
        let pool = self.pool()?;
        if pool.len() < k {
            return Err(MachineError::InsufficientPool {
                requested: k,
                available: pool.len(),
            });
        }

        let picks = rand::seq::index::sample(&mut self.rng, pool.len(), k);
        let mut samples = Vec::with_capacity(k);
        for pick in picks.iter() {
            let index = pool[pick];
            samples.push(self.read(index)?);
            self.returned.insert(index);
        }
        debug!(
            "Drew {} samples; {} left in pool",
            samples.len(),
            pool.len() - samples.len()
        );
        Ok(samples)
    }

    fn pool(&mut self) -> Result<Vec<usize>> {
        let size = self.bind()?;
        Ok((0..size)
            .filter(|i| !self.returned.contains(i) && !self.excluded.contains(i))
            .collect())
    }

    /// Permanently exclude a sample from future draws. Idempotent.
    pub fn discard(&mut self, sample: impl Into<SampleRef>) -> Result<usize> {
        let index = self.resolve(sample)?;
        if self.excluded.insert(index) {
            debug!("Excluded sample {}", index);
        }
        Ok(index)
    }

    /// Write the exclusion list to disk, replacing previous content.
    pub fn persist(&self) -> Result<()> {
        self.exclusions.save(&self.excluded)?;
        info!(
            "Persisted {} excluded samples to {}",
            self.excluded.len(),
            self.exclusions.path().display()
        );
        Ok(())
    }

    fn bind(&mut self) -> Result<usize> {
        if self.store.is_none() {
            let store = (self.loader)()?;
            info!("Bound sample store with {} samples", store.len());
            self.store = Some(store);
        }
        self.store
            .as_ref()
            .map(|s| s.len())
            .ok_or_else(|| MachineError::Other("sample store failed to bind".to_string()))
    }

    fn read(&self, index: usize) -> Result<Sample> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| MachineError::Other("sample store is not bound".to_string()))?;
        let (image, label) = store.get(index)?;
        Ok(Sample {
            index,
            label,
            image,
        })
    }
}
