//! The context threaded through every request: one sampler and one machine,
//! resolved from configuration keys once at startup.

use crate::config::{DatasetKey, ModelKey, PathsConfig, SamplerConfig};
use crate::dataset::{Fer2013Store, FerSplit, SampleStore, SessionSampler, StoreLoader, FER_CLASSES};
use crate::engine::{
    HttpFetcher, InputShape, LearningMachine, LinearVariant, Machine, MlpVariant, WeightCache,
    WeightFetcher, WeightManifest,
};
use crate::error::{MachineError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A configured sampler and learning machine.
///
/// Data root layout:
/// - `weights.json`: optional weight manifest
/// - `weights/`: weight cache
/// - `datasets/fer2013.csv`: FER-2013 CSV
/// - `session/indices_blacklist.txt`: persisted exclusions
pub struct MachineContext {
    data_root: PathBuf,
    model: ModelKey,
    dataset: DatasetKey,
    sampler: SessionSampler,
    machine: Box<dyn Machine>,
}

impl MachineContext {
    pub fn builder(data_root: impl Into<PathBuf>) -> MachineContextBuilder {
        MachineContextBuilder::new(data_root)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn model_key(&self) -> ModelKey {
        self.model
    }

    pub fn dataset_key(&self) -> DatasetKey {
        self.dataset
    }

    pub fn sampler(&self) -> &SessionSampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut SessionSampler {
        &mut self.sampler
    }

    pub fn machine(&self) -> &dyn Machine {
        self.machine.as_ref()
    }

    pub fn machine_mut(&mut self) -> &mut dyn Machine {
        self.machine.as_mut()
    }

    /// Both halves at once, for operations that draw and then predict.
    pub fn parts_mut(&mut self) -> (&mut SessionSampler, &mut dyn Machine) {
        (&mut self.sampler, self.machine.as_mut())
    }

    /// Persist session state that outlives the process.
    pub fn persist(&self) -> Result<()> {
        self.sampler.persist()
    }
}

/// Builder for [`MachineContext`].
///
/// # Example
///
/// ```rust,ignore
/// use learning_machine::{DatasetKey, MachineContext, ModelKey};
///
/// let mut context = MachineContext::builder("./lm-data")
///     .model(ModelKey::Mlp)
///     .dataset(DatasetKey::Fer2013Train)
///     .auto_create_dirs(true)
///     .build()?;
/// let faces = context.sampler_mut().sample_random(25)?;
/// ```
pub struct MachineContextBuilder {
    data_root: PathBuf,
    model: ModelKey,
    dataset: DatasetKey,
    auto_create_dirs: bool,
    store_loader: Option<StoreLoader>,
    classes: Option<Vec<String>>,
    input_shape: Option<InputShape>,
    fetcher: Option<Box<dyn WeightFetcher>>,
    seed: Option<u64>,
}

impl MachineContextBuilder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            model: ModelKey::default(),
            dataset: DatasetKey::default(),
            auto_create_dirs: false,
            store_loader: None,
            classes: None,
            input_shape: None,
            fetcher: None,
            seed: None,
        }
    }

    pub fn model(mut self, model: ModelKey) -> Self {
        self.model = model;
        self
    }

    pub fn dataset(mut self, dataset: DatasetKey) -> Self {
        self.dataset = dataset;
        self
    }

    /// Create the data root and its subdirectories if missing.
    ///
    /// Default: `false` (the data root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Replace the dataset's backing store. The loader still runs lazily.
    pub fn store_loader(mut self, loader: StoreLoader) -> Self {
        self.store_loader = Some(loader);
        self
    }

    /// Class names in label order. Default: the FER-2013 emotions.
    pub fn classes(mut self, classes: Vec<String>) -> Self {
        self.classes = Some(classes);
        self
    }

    /// Image size the model expects. Default: 48x48.
    pub fn input_size(mut self, width: usize, height: usize) -> Self {
        self.input_shape = Some(InputShape {
            width,
            height,
            classes: 0,
        });
        self
    }

    /// Replace the HTTP weight fetcher.
    pub fn fetcher(mut self, fetcher: Box<dyn WeightFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Seed the sampler for reproducible draws.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn create_directory_structure(data_root: &Path) -> Result<()> {
        let dirs = [
            data_root.to_path_buf(),
            data_root.join(PathsConfig::WEIGHTS_DIR_NAME),
            data_root.join(PathsConfig::DATASETS_DIR_NAME),
            data_root.join(PathsConfig::SESSION_DIR_NAME),
        ];
        for dir in &dirs {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| MachineError::Io {
                    message: format!("Failed to create directory: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
            }
        }
        Ok(())
    }

    fn dataset_loader(dataset: DatasetKey, csv_path: PathBuf) -> StoreLoader {
        match dataset {
            DatasetKey::Fer2013 => Box::new(move || {
                Ok(Box::new(Fer2013Store::open_all(&csv_path)?) as Box<dyn SampleStore>)
            }),
            DatasetKey::Fer2013Train => Box::new(move || {
                Ok(Box::new(Fer2013Store::open(&csv_path, FerSplit::Train)?) as Box<dyn SampleStore>)
            }),
        }
    }

    pub fn build(self) -> Result<MachineContext> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.data_root)?;
        } else if !self.data_root.exists() {
            return Err(MachineError::Config {
                message: format!("Data root does not exist: {}", self.data_root.display()),
            });
        }

        let classes = self
            .classes
            .unwrap_or_else(|| FER_CLASSES.iter().map(|c| c.to_string()).collect());
        if classes.is_empty() {
            return Err(MachineError::Config {
                message: "at least one class is required".to_string(),
            });
        }
        let mut shape = self.input_shape.unwrap_or_default();
        shape.classes = classes.len();

        let manifest =
            WeightManifest::load(self.data_root.join(PathsConfig::WEIGHT_MANIFEST_FILENAME))?;
        let artifact = manifest.artifact_for(self.model);
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Box::new(HttpFetcher::new()));
        let cache = WeightCache::new(self.data_root.join(PathsConfig::WEIGHTS_DIR_NAME), fetcher);
        let machine: Box<dyn Machine> = match self.model {
            ModelKey::Linear => Box::new(LearningMachine::new(
                LinearVariant::new(shape, artifact),
                cache,
            )),
            ModelKey::Mlp => Box::new(LearningMachine::new(MlpVariant::new(shape, artifact), cache)),
        };

        let loader = match self.store_loader {
            Some(loader) => loader,
            None => Self::dataset_loader(
                self.dataset,
                self.data_root
                    .join(PathsConfig::DATASETS_DIR_NAME)
                    .join(PathsConfig::FER2013_CSV_FILENAME),
            ),
        };
        let exclusions_path = self
            .data_root
            .join(PathsConfig::SESSION_DIR_NAME)
            .join(SamplerConfig::EXCLUSIONS_FILENAME);
        let mut sampler = SessionSampler::new(loader, classes, exclusions_path)?;
        if let Some(seed) = self.seed {
            sampler = sampler.with_seed(seed);
        }

        info!(
            "Learning machine ready: model={}, dataset={}, data root={}",
            self.model,
            self.dataset,
            self.data_root.display()
        );
        Ok(MachineContext {
            data_root: self.data_root,
            model: self.model,
            dataset: self.dataset,
            sampler,
            machine,
        })
    }
}
