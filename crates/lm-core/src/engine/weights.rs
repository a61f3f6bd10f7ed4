//! Weight artifact acquisition: local cache first, verified download second.

use super::checkpoint::write_atomic;
use super::fetch::WeightFetcher;
use crate::config::ModelKey;
use crate::error::{MachineError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Expected content digest of an artifact, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightDigest {
    Sha256(String),
    Blake3(String),
}

impl WeightDigest {
    /// Digest of `bytes` using the same algorithm as `self`.
    pub fn compute(&self, bytes: &[u8]) -> String {
        match self {
            WeightDigest::Sha256(_) => hex::encode(Sha256::digest(bytes)),
            WeightDigest::Blake3(_) => blake3::hash(bytes).to_hex().to_string(),
        }
    }

    pub fn expected(&self) -> String {
        match self {
            WeightDigest::Sha256(hex) | WeightDigest::Blake3(hex) => hex.to_lowercase(),
        }
    }

    pub fn verify(&self, bytes: &[u8]) -> Result<()> {
        let expected = self.expected();
        let actual = self.compute(bytes);
        if actual == expected {
            Ok(())
        } else {
            Err(MachineError::WeightsIntegrity { expected, actual })
        }
    }
}

/// Where a model's weights live locally and, optionally, remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightArtifact {
    pub file_name: String,
    pub url: Option<String>,
    pub digest: Option<WeightDigest>,
}

impl WeightArtifact {
    /// Artifact that is only ever read from the cache.
    pub fn local(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: None,
            digest: None,
        }
    }

    pub fn remote(file_name: impl Into<String>, url: impl Into<String>, digest: WeightDigest) -> Self {
        Self {
            file_name: file_name.into(),
            url: Some(url.into()),
            digest: Some(digest),
        }
    }
}

/// One entry of the weight manifest file. Exactly one digest is expected;
/// SHA-256 wins if both are given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

impl ManifestEntry {
    pub fn digest(&self) -> Option<WeightDigest> {
        match (&self.sha256, &self.blake3) {
            (Some(hex), _) => Some(WeightDigest::Sha256(hex.clone())),
            (None, Some(hex)) => Some(WeightDigest::Blake3(hex.clone())),
            (None, None) => None,
        }
    }
}

/// Per-model download locations, keyed by model key string.
///
/// ```json
/// { "linear": { "url": "https://...", "sha256": "..." } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightManifest {
    pub entries: HashMap<String, ManifestEntry>,
}

impl WeightManifest {
    /// Load a manifest; a missing file is an empty manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No weight manifest at {}", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| MachineError::io_with_path(e, path))?;
        let manifest: Self =
            serde_json::from_str(&contents).map_err(|e| MachineError::Config {
                message: format!("Invalid weight manifest {}: {}", path.display(), e),
            })?;
        for (model, entry) in &manifest.entries {
            if entry.digest().is_none() {
                return Err(MachineError::Config {
                    message: format!("Weight manifest entry '{}' has no digest", model),
                });
            }
        }
        Ok(manifest)
    }

    pub fn get(&self, model: ModelKey) -> Option<&ManifestEntry> {
        self.entries.get(model.as_str())
    }

    /// Artifact for `model`, remote if the manifest lists it.
    pub fn artifact_for(&self, model: ModelKey) -> WeightArtifact {
        match self.get(model) {
            Some(entry) => WeightArtifact {
                file_name: model.checkpoint_filename().to_string(),
                url: Some(entry.url.clone()),
                digest: entry.digest(),
            },
            None => WeightArtifact::local(model.checkpoint_filename()),
        }
    }
}

/// Local weight cache backed by a fetcher.
pub struct WeightCache {
    cache_dir: PathBuf,
    fetcher: Box<dyn WeightFetcher>,
}

impl WeightCache {
    pub fn new(cache_dir: impl Into<PathBuf>, fetcher: Box<dyn WeightFetcher>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            fetcher,
        }
    }

    pub fn path_for(&self, artifact: &WeightArtifact) -> PathBuf {
        self.cache_dir.join(&artifact.file_name)
    }

    /// Return the cached artifact path, downloading it first if absent.
    ///
    /// A cached file is trusted without re-verification. A download is only
    /// written to the cache after its digest matches.
    pub fn ensure(&self, artifact: &WeightArtifact) -> Result<PathBuf> {
        let path = self.path_for(artifact);
        if path.exists() {
            debug!("Using cached weights at {}", path.display());
            return Ok(path);
        }

        let Some(url) = artifact.url.as_deref() else {
            return Err(MachineError::WeightsUnavailable {
                url: path.display().to_string(),
                message: "not cached and no download location configured".to_string(),
            });
        };

        let bytes = self.fetcher.fetch(url)?;
        if let Some(digest) = &artifact.digest {
            if let Err(e) = digest.verify(&bytes) {
                warn!("Rejected weights from {}: {}", url, e);
                return Err(e);
            }
        }

        write_atomic(&path, &bytes)?;
        info!("Cached {} bytes of weights at {}", bytes.len(), path.display());
        Ok(path)
    }
}
