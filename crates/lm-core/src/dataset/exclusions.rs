//! Persisted list of permanently excluded sample indices.
//!
//! The file holds one line of comma-separated decimal indices. A missing file
//! is an empty list. Saving always rewrites the whole file through a temp
//! file in the same directory followed by an atomic rename.

use crate::error::{MachineError, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExclusionFile {
    path: PathBuf,
}

impl ExclusionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the excluded indices. Empty entries are skipped.
    pub fn load(&self) -> Result<BTreeSet<usize>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|e| MachineError::io_with_path(e, &self.path))?;

        let mut indices = BTreeSet::new();
        for entry in contents.trim().split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let index = entry
                .parse::<usize>()
                .map_err(|_| MachineError::CorruptExclusions {
                    path: self.path.clone(),
                    entry: entry.to_string(),
                })?;
            indices.insert(index);
        }
        debug!("Loaded {} excluded indices from {}", indices.len(), self.path.display());
        Ok(indices)
    }

    /// Overwrite the file with `indices`.
    ///
    /// The temp file is removed if any step fails, so the previous content
    /// stays intact.
    pub fn save(&self, indices: &BTreeSet<usize>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| MachineError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.clone()),
                source: Some(e),
            })?;
        }

        let line = indices
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| MachineError::Io {
            message: format!("Failed to create temp file in {}", parent.display()),
            path: Some(parent.clone()),
            source: Some(e),
        })?;
        writeln!(temp, "{}", line).map_err(|e| MachineError::io_with_path(e, temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MachineError::io_with_path(e, temp.path()))?;
        temp.persist(&self.path).map_err(|e| MachineError::Io {
            message: format!("Failed to replace {}", self.path.display()),
            path: Some(self.path.clone()),
            source: Some(e.error),
        })?;

        debug!("Wrote {} excluded indices to {}", indices.len(), self.path.display());
        Ok(())
    }
}
