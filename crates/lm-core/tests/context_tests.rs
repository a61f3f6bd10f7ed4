//! Integration tests for the MachineContext public interface.
//!
//! These tests drive the sampler and the learning machine together the way a
//! presentation layer would: draw, predict, correct, discard and persist.

use learning_machine::engine::{
    encode_checkpoint, InputShape, LinearVariant, MachineVariant, WeightArtifact,
};
use learning_machine::{
    ImagePayload, InMemoryStore, MachineContext, MachineError, ModelKey, Result, SampleStore,
    WeightFetcher,
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const CLASSES: [&str; 3] = ["happy", "sad", "neutral"];

struct StaticFetcher {
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl WeightFetcher for StaticFetcher {
    fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

fn store(size: usize) -> InMemoryStore {
    InMemoryStore::new(
        (0..size)
            .map(|i| {
                let pixels = (0..16).map(|p| ((i * 7 + p * 11) % 256) as u8).collect();
                (ImagePayload::grayscale(4, 4, pixels).unwrap(), i % CLASSES.len())
            })
            .collect(),
    )
}

fn checkpoint_bytes() -> Vec<u8> {
    let shape = InputShape {
        width: 4,
        height: 4,
        classes: CLASSES.len(),
    };
    let variant = LinearVariant::new(shape, WeightArtifact::local("unused"));
    encode_checkpoint(&variant.initial_checkpoint(42)).unwrap()
}

/// Data root with a weight manifest pointing at a fake download.
fn create_test_env(digest_of: &[u8]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manifest = serde_json::json!({
        "linear": {
            "url": "https://weights.invalid/linear.safetensors",
            "sha256": hex::encode(Sha256::digest(digest_of)),
        }
    });
    std::fs::write(
        temp_dir.path().join("weights.json"),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();
    temp_dir
}

fn build(dir: &TempDir, size: usize, body: Vec<u8>, calls: Arc<AtomicUsize>) -> MachineContext {
    MachineContext::builder(dir.path())
        .model(ModelKey::Linear)
        .auto_create_dirs(true)
        .classes(CLASSES.iter().map(|c| c.to_string()).collect())
        .input_size(4, 4)
        .store_loader(Box::new(move || Ok(Box::new(store(size)) as Box<dyn SampleStore>)))
        .fetcher(Box::new(StaticFetcher { body, calls }))
        .seed(17)
        .build()
        .unwrap()
}

#[test]
fn test_draw_predict_fit_cycle() {
    let bytes = checkpoint_bytes();
    let dir = create_test_env(&bytes);
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = build(&dir, 30, bytes, calls.clone());

    let (sampler, machine) = context.parts_mut();
    let faces = sampler.sample_random(5).unwrap();
    let probs = machine.predict(&faces, true).unwrap();
    assert_eq!(probs.len(), 5);
    for row in &probs {
        assert_eq!(row.len(), 3);
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dir
        .path()
        .join("weights")
        .join("linear_learning_machine.safetensors")
        .exists());

    let sad = sampler.class_index("sad").unwrap();
    let corrected = faces[0].relabeled(sad);
    let before = machine.predict(&[corrected.clone()], false).unwrap();
    machine.fit(&[corrected.clone()]).unwrap();
    let after = machine.predict(&[corrected], false).unwrap();
    assert_ne!(before, after);

    // Fitting never touches the sampler's bookkeeping.
    assert_eq!(sampler.returned().len(), 5);
    assert!(sampler.excluded().is_empty());
    // Weights are fetched once per cache.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_tampered_weights_rejected() {
    let dir = create_test_env(b"the real weights");
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = build(&dir, 10, checkpoint_bytes(), calls);

    let faces = context.sampler_mut().sample_random(2).unwrap();
    let result = context.machine_mut().predict(&faces, true);
    assert!(matches!(result, Err(MachineError::WeightsIntegrity { .. })));
    assert!(!dir
        .path()
        .join("weights")
        .join("linear_learning_machine.safetensors")
        .exists());
    assert!(!context.machine().is_loaded());
}

#[test]
fn test_exhaustion_with_exclusions() {
    let bytes = checkpoint_bytes();
    let dir = create_test_env(&bytes);
    let mut context = build(&dir, 100, bytes, Arc::new(AtomicUsize::new(0)));
    let sampler = context.sampler_mut();
    sampler.discard(5usize).unwrap();
    sampler.discard(7usize).unwrap();

    let drawn: HashSet<usize> = sampler
        .sample_random(98)
        .unwrap()
        .into_iter()
        .map(|s| s.index)
        .collect();
    assert_eq!(drawn.len(), 98);
    assert!(!drawn.contains(&5) && !drawn.contains(&7));
    assert!(matches!(
        sampler.sample_random(1),
        Err(MachineError::InsufficientPool { .. })
    ));
}

#[test]
fn test_exclusions_survive_restart() {
    let bytes = checkpoint_bytes();
    let dir = create_test_env(&bytes);
    {
        let mut context = build(&dir, 20, bytes.clone(), Arc::new(AtomicUsize::new(0)));
        let face = context.sampler_mut().sample_random(1).unwrap().remove(0);
        let token = face.token(context.sampler().codec());
        assert_eq!(context.sampler_mut().discard(token.as_str()).unwrap(), face.index);
        context.sampler_mut().discard(11usize).unwrap();
        context.persist().unwrap();
    }

    let mut context = build(&dir, 20, bytes, Arc::new(AtomicUsize::new(0)));
    assert_eq!(context.sampler().excluded().len(), 2);
    assert!(context.sampler().excluded().contains(&11));
    assert!(context.sampler().returned().is_empty());
    let remaining = context.sampler_mut().sample_random(18).unwrap();
    assert!(remaining.iter().all(|s| s.index != 11));
}

#[test]
fn test_fetch_by_token() {
    let bytes = checkpoint_bytes();
    let dir = create_test_env(&bytes);
    let mut context = build(&dir, 300, bytes, Arc::new(AtomicUsize::new(0)));
    let token = context.sampler().codec().encode(255, 0);
    let face = context.sampler_mut().fetch(token.as_str()).unwrap();
    assert_eq!(face.index, 255);
    // The stored label wins over the one the token was minted with.
    assert_eq!(face.label, 255 % 3);
    assert!(matches!(
        context.sampler_mut().fetch("garbage"),
        Err(MachineError::IndexOutOfRange { index: -1, .. })
    ));
}

#[test]
fn test_unknown_keys() {
    assert!(matches!(
        ModelKey::from_str("resnet"),
        Err(MachineError::UnknownModel(_))
    ));
    assert!(matches!(
        learning_machine::DatasetKey::from_str("mnist"),
        Err(MachineError::UnknownDataset(_))
    ));
}

#[test]
fn test_initial_weights_without_manifest() {
    let dir = TempDir::new().unwrap();
    let mut context = MachineContext::builder(dir.path())
        .model(ModelKey::Mlp)
        .auto_create_dirs(true)
        .classes(CLASSES.iter().map(|c| c.to_string()).collect())
        .input_size(4, 4)
        .store_loader(Box::new(|| Ok(Box::new(store(6)) as Box<dyn SampleStore>)))
        .build()
        .unwrap();

    let faces = context.sampler_mut().sample_random(2).unwrap();
    assert!(matches!(
        context.machine_mut().predict(&faces, true),
        Err(MachineError::WeightsUnavailable { .. })
    ));

    context.machine().write_initial_weights(1).unwrap();
    let probs = context.machine_mut().predict(&faces, false).unwrap();
    assert_eq!(probs.len(), 2);
}
