//! Learning Machine - headless core for interactive image labelling.
//!
//! This crate serves unseen labeled samples to a caller, never repeating one
//! within a session, permanently excludes samples a human flags as invalid,
//! and predicts per-class probabilities with a model that learns online from
//! label corrections. It has no HTTP layer; see the `lm-rpc` crate for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use learning_machine::{Machine, MachineContext, ModelKey};
//!
//! fn main() -> learning_machine::Result<()> {
//!     let mut context = MachineContext::builder("/path/to/data")
//!         .model(ModelKey::Linear)
//!         .build()?;
//!
//!     let (sampler, machine) = context.parts_mut();
//!     let faces = sampler.sample_random(25)?;
//!     let probabilities = machine.predict(&faces, true)?;
//!     println!("Predicted {} faces", probabilities.len());
//!
//!     // The first face was actually "happy".
//!     let happy = sampler.class_index("happy").unwrap_or(3);
//!     machine.fit(&[faces[0].relabeled(happy)])?;
//!
//!     context.persist()
//! }
//! ```

pub mod config;
pub mod context;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod identity;

pub use config::{DatasetKey, ModelKey};
pub use context::{MachineContext, MachineContextBuilder};
pub use dataset::{
    ImagePayload, InMemoryStore, Sample, SampleRef, SampleStore, SessionSampler, StoreLoader,
};
pub use engine::{LearningMachine, Machine, MachineVariant, WeightFetcher};
pub use error::{MachineError, Result};
pub use identity::{IdentityCodec, INVALID_INDEX};
