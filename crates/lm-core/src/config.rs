//! Centralized configuration for the learning machine.
//!
//! Constants for identity encoding, sampling, weight downloads and on-disk
//! layout, plus the closed sets of model and dataset keys the orchestration
//! boundary may resolve.

use crate::error::{MachineError, Result};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Learning Machine";
    /// Secret mixed into the label hash of every identity token.
    pub const IDENTITY_SECRET: &'static str = "supersecrectspiceonthebackend";
}

/// Configuration for the session sampler.
pub struct SamplerConfig;

impl SamplerConfig {
    pub const EXCLUSIONS_FILENAME: &'static str = "indices_blacklist.txt";
    pub const DEFAULT_DRAW_COUNT: usize = 25;
}

/// Weight download configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const WEIGHTS_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = "Learning-Machine/0.3";
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const WEIGHTS_DIR_NAME: &'static str = "weights";
    pub const DATASETS_DIR_NAME: &'static str = "datasets";
    pub const SESSION_DIR_NAME: &'static str = "session";
    pub const WEIGHT_MANIFEST_FILENAME: &'static str = "weights.json";
    pub const FER2013_CSV_FILENAME: &'static str = "fer2013.csv";
}

/// Model variants the engine can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKey {
    Linear,
    Mlp,
}

impl ModelKey {
    pub const ALL: [ModelKey; 2] = [ModelKey::Linear, ModelKey::Mlp];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKey::Linear => "linear",
            ModelKey::Mlp => "mlp",
        }
    }

    /// Name of the cached checkpoint file for this model.
    pub fn checkpoint_filename(&self) -> &'static str {
        match self {
            ModelKey::Linear => "linear_learning_machine.safetensors",
            ModelKey::Mlp => "mlp_learning_machine.safetensors",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(ModelKey::Linear),
            "mlp" => Ok(ModelKey::Mlp),
            _ => Err(MachineError::UnknownModel(s.to_string())),
        }
    }
}

impl Default for ModelKey {
    fn default() -> Self {
        ModelKey::Linear
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Datasets the sampler can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKey {
    /// All FER-2013 splits concatenated (train, validation, test).
    Fer2013,
    /// FER-2013 training split only.
    Fer2013Train,
}

impl DatasetKey {
    pub const ALL: [DatasetKey; 2] = [DatasetKey::Fer2013, DatasetKey::Fer2013Train];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKey::Fer2013 => "fer2013",
            DatasetKey::Fer2013Train => "fer2013-train",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fer2013" => Ok(DatasetKey::Fer2013),
            "fer2013-train" => Ok(DatasetKey::Fer2013Train),
            _ => Err(MachineError::UnknownDataset(s.to_string())),
        }
    }
}

impl Default for DatasetKey {
    fn default() -> Self {
        DatasetKey::Fer2013
    }
}

impl std::fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_key_roundtrip() {
        for key in ModelKey::ALL {
            assert_eq!(ModelKey::from_str(key.as_str()).unwrap(), key);
        }
    }

    #[test]
    fn test_dataset_key_roundtrip() {
        for key in DatasetKey::ALL {
            assert_eq!(DatasetKey::from_str(key.as_str()).unwrap(), key);
        }
    }

    #[test]
    fn test_unknown_keys_are_typed_errors() {
        assert!(matches!(
            ModelKey::from_str("vgg"),
            Err(MachineError::UnknownModel(k)) if k == "vgg"
        ));
        assert!(matches!(
            DatasetKey::from_str("mnist"),
            Err(MachineError::UnknownDataset(k)) if k == "mnist"
        ));
    }

    #[test]
    fn test_checkpoint_filenames_are_distinct() {
        assert_ne!(
            ModelKey::Linear.checkpoint_filename(),
            ModelKey::Mlp.checkpoint_filename()
        );
    }
}
