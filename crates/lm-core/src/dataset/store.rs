//! Backing stores the sampler draws from.

use super::sample::ImagePayload;
use crate::error::{MachineError, Result};

/// Indexed, immutable collection of labeled images.
///
/// The index domain is exactly `[0, len())`.
pub trait SampleStore: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the image and label stored at `index`.
    fn get(&self, index: usize) -> Result<(ImagePayload, usize)>;
}

/// Store backed by a vector, used for tests and small fixtures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    items: Vec<(ImagePayload, usize)>,
}

impl InMemoryStore {
    pub fn new(items: Vec<(ImagePayload, usize)>) -> Self {
        Self { items }
    }
}

impl SampleStore for InMemoryStore {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<(ImagePayload, usize)> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| MachineError::store(format!("no sample at index {}", index)))
    }
}

/// Several stores addressed as one contiguous index range.
pub struct ConcatStore {
    parts: Vec<Box<dyn SampleStore>>,
    /// Cumulative end offset of each part.
    ends: Vec<usize>,
}

impl ConcatStore {
    pub fn new(parts: Vec<Box<dyn SampleStore>>) -> Self {
        let mut total = 0;
        let ends = parts
            .iter()
            .map(|p| {
                total += p.len();
                total
            })
            .collect();
        Self { parts, ends }
    }
}

impl SampleStore for ConcatStore {
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<(ImagePayload, usize)> {
        let part = self.ends.partition_point(|&end| end <= index);
        let Some(store) = self.parts.get(part) else {
            return Err(MachineError::store(format!(
                "index {} beyond concatenated store of {}",
                index,
                self.len()
            )));
        };
        let start = if part == 0 { 0 } else { self.ends[part - 1] };
        store.get(index - start)
    }
}
