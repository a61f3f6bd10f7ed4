//! Checkpoint files in the safetensors layout.
//!
//! Layout: 8-byte header size (little-endian u64), a JSON header mapping each
//! tensor name to `{dtype, shape, data_offsets}`, then the raw little-endian
//! tensor data. Only `F32` tensors are supported.

use crate::error::{MachineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const MAX_HEADER_SIZE: u64 = 100_000_000;
const DTYPE_F32: &str = "F32";
const METADATA_KEY: &str = "__metadata__";

/// Named parameter tensors, ordered by name.
pub type TensorMap = BTreeMap<String, Tensor>;

/// Dense row-major `f32` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(MachineError::Shape {
                message: format!(
                    "shape {:?} needs {} values, got {}",
                    shape,
                    expected,
                    data.len()
                ),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: (usize, usize),
}

/// Serialize tensors into checkpoint bytes.
pub fn encode_checkpoint(tensors: &TensorMap) -> Result<Vec<u8>> {
    let mut header = BTreeMap::new();
    let mut offset = 0;
    for (name, tensor) in tensors {
        let end = offset + tensor.len() * 4;
        header.insert(
            name.clone(),
            TensorInfo {
                dtype: DTYPE_F32.to_string(),
                shape: tensor.shape.clone(),
                data_offsets: (offset, end),
            },
        );
        offset = end;
    }
    let header_bytes = serde_json::to_vec(&header)?;

    let mut bytes = Vec::with_capacity(8 + header_bytes.len() + offset);
    bytes.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&header_bytes);
    for tensor in tensors.values() {
        for value in &tensor.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(bytes)
}

/// Parse checkpoint bytes into tensors.
pub fn decode_checkpoint(bytes: &[u8]) -> Result<TensorMap> {
    if bytes.len() < 8 {
        return Err(checkpoint_error("file is shorter than the header size field"));
    }
    let mut size_buf = [0u8; 8];
    size_buf.copy_from_slice(&bytes[..8]);
    let header_size = u64::from_le_bytes(size_buf);
    if header_size > MAX_HEADER_SIZE {
        return Err(checkpoint_error("header size too large"));
    }
    let header_end = 8 + header_size as usize;
    if bytes.len() < header_end {
        return Err(checkpoint_error("truncated header"));
    }

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..header_end])
        .map_err(|e| checkpoint_error(format!("invalid header: {}", e)))?;
    let data = &bytes[header_end..];

    let mut tensors = TensorMap::new();
    for (name, value) in raw {
        if name == METADATA_KEY {
            continue;
        }
        let info: TensorInfo = serde_json::from_value(value)
            .map_err(|e| checkpoint_error(format!("tensor '{}': {}", name, e)))?;
        if info.dtype != DTYPE_F32 {
            return Err(checkpoint_error(format!(
                "tensor '{}' has unsupported dtype {}",
                name, info.dtype
            )));
        }
        let (start, end) = info.data_offsets;
        if start > end || end > data.len() {
            return Err(checkpoint_error(format!(
                "tensor '{}' offsets {}..{} exceed data of {} bytes",
                name,
                start,
                end,
                data.len()
            )));
        }
        let values: Vec<f32> = data[start..end]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let tensor = Tensor::new(info.shape, values)
            .map_err(|e| checkpoint_error(format!("tensor '{}': {}", name, e)))?;
        tensors.insert(name, tensor);
    }
    Ok(tensors)
}

pub fn read_checkpoint(path: impl AsRef<Path>) -> Result<TensorMap> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| MachineError::io_with_path(e, path))?;
    decode_checkpoint(&bytes)
}

/// Write tensors to `path` through a temp file and rename.
pub fn write_checkpoint(path: impl AsRef<Path>, tensors: &TensorMap) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_checkpoint(tensors)?;
    write_atomic(path, &bytes)
}

/// Replace `path` with `bytes` atomically, creating the parent directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| MachineError::io_with_path(e, &parent))?;

    let mut temp =
        NamedTempFile::new_in(&parent).map_err(|e| MachineError::io_with_path(e, &parent))?;
    temp.write_all(bytes)
        .map_err(|e| MachineError::io_with_path(e, temp.path()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| MachineError::io_with_path(e, temp.path()))?;
    temp.persist(path)
        .map_err(|e| MachineError::io_with_path(e.error, path))?;
    Ok(())
}

fn checkpoint_error(message: impl Into<String>) -> MachineError {
    MachineError::Checkpoint {
        message: message.into(),
    }
}
