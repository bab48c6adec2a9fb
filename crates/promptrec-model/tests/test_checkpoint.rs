//! Checkpoint and preset round-trip tests

use aprender::autograd::Tensor;
use promptrec_model::{
    load_checkpoint, load_preset, save_checkpoint, save_preset, CausalLM, CheckpointMetadata,
    ModelConfig, Tokenizer,
};
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn tiny_model() -> CausalLM {
    CausalLM::new(ModelConfig::tiny())
}

fn tiny_tokenizer() -> Tokenizer {
    let corpus = ["make it formal", "improve the essay"];
    Tokenizer::train_from_iterator(corpus.iter(), 200).expect("Failed to train tokenizer")
}

#[test]
fn test_save_creates_weight_and_sidecar_files() {
    let model = tiny_model();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");

    save_checkpoint(&model, &path, None).unwrap();

    assert!(path.with_extension("safetensors").exists());
    assert!(path.with_extension("json").exists());
}

#[test]
fn test_metadata_roundtrip() {
    let model = tiny_model();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");

    let metadata = CheckpointMetadata {
        epoch: 3,
        loss: Some(1.25),
        learning_rate: Some(3e-5),
        extra: HashMap::new(),
    };
    save_checkpoint(&model, &path, Some(metadata)).unwrap();

    let (loaded, loaded_metadata) = load_checkpoint(&path).unwrap();
    assert_eq!(loaded.config(), model.config());
    assert_eq!(loaded_metadata.epoch, 3);
    assert_eq!(loaded_metadata.loss, Some(1.25));
    assert_eq!(loaded_metadata.learning_rate, Some(3e-5));
}

#[test]
fn test_lora_checkpoint_roundtrip() {
    // A checkpoint saved with adapters injected must reload with the same
    // adapter shapes: weights are matched by position, so load has to
    // re-enable LoRA before reading them.
    let mut model = tiny_model();
    model.enable_lora(2, 4.0);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");

    let ids = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);
    let logits_before = model.forward(&ids).unwrap();

    save_checkpoint(&model, &path, None).unwrap();
    let (loaded, _) = load_checkpoint(&path).unwrap();

    assert!(loaded.lora_enabled());
    assert_eq!(loaded.lora_config(), Some((2, 4.0)));

    let logits_after = loaded.forward(&ids).unwrap();
    for (a, b) in logits_before.data().iter().zip(logits_after.data()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn test_version_mismatch_fails_load() {
    let model = tiny_model();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");

    save_checkpoint(&model, &path, None).unwrap();

    // Rewrite the sidecar with a bogus version.
    let sidecar = path.with_extension("json");
    let json = fs::read_to_string(&sidecar).unwrap();
    let tampered = json.replace("1.0.0", "9.9.9");
    fs::write(&sidecar, tampered).unwrap();

    assert!(load_checkpoint(&path).is_err());
}

#[test]
fn test_corrupted_weights_fail_load() {
    let model = tiny_model();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint");

    save_checkpoint(&model, &path, None).unwrap();
    fs::write(path.with_extension("safetensors"), b"corrupted").unwrap();

    assert!(load_checkpoint(&path).is_err());
}

#[test]
fn test_preset_roundtrip() {
    let model = tiny_model();
    let tokenizer = tiny_tokenizer();
    let dir = TempDir::new().unwrap();

    save_preset(&model, &tokenizer, dir.path()).unwrap();
    let (loaded_model, loaded_tokenizer) = load_preset(dir.path()).unwrap();

    assert_eq!(loaded_model.config(), model.config());
    assert_eq!(loaded_tokenizer.vocab_size(), tokenizer.vocab_size());
}

#[test]
fn test_preset_missing_tokenizer_is_error() {
    let model = tiny_model();
    let dir = TempDir::new().unwrap();

    save_checkpoint(&model, dir.path().join("model"), None).unwrap();
    assert!(load_preset(dir.path()).is_err());
}
