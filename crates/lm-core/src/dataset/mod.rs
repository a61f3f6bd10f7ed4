//! Sample stores and the session sampler.
//!
//! This module provides:
//! - The `SampleStore` abstraction with in-memory and FER-2013 backends
//! - Without-replacement random draws tracked per session
//! - A persisted list of permanently excluded samples

mod exclusions;
mod fer;
mod sample;
mod sampler;
mod store;

pub use exclusions::ExclusionFile;
pub use fer::{Fer2013Store, FerSplit, FER_CLASSES, FER_IMAGE_HEIGHT, FER_IMAGE_WIDTH};
pub use sample::{ImagePayload, Sample};
pub use sampler::{SampleRef, SessionSampler, StoreLoader};
pub use store::{ConcatStore, InMemoryStore, SampleStore};

#[cfg(test)]
pub(crate) use fer::write_fixture_csv;
