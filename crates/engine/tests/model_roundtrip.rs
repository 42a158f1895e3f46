use mnemo_engine::{
    load_model, model_digest, save_model, EngineError, Model, ModelConfig, TrainOptions,
};
use std::fs;

fn sample_model() -> Model {
    let mut config = ModelConfig::new(3, 2);
    config.memory_capacity = 4;
    config.weight_seed = Some(21);
    let mut model = Model::new("roundtrip", config).unwrap();
    model
        .add_memory(&[1.0, 0.0, 0.0], &[0.9, 0.1, 0.0], Some("first"), 100)
        .unwrap();
    model
        .add_memory(&[0.0, 1.0, 0.0], &[0.2, 0.8, 0.0], None, 200)
        .unwrap();
    model
        .add_memory(&[0.0, 0.0, 1.0], &[0.5, 0.5, 0.0], Some("third"), 300)
        .unwrap();
    model
}

#[test]
fn save_then_load_preserves_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");

    let model = sample_model();
    save_model(&model, &path).unwrap();
    let loaded = load_model(&path).unwrap();

    assert_eq!(loaded.name(), model.name());
    assert_eq!(loaded.version(), model.version());
    assert_eq!(loaded.input_size(), model.input_size());
    assert_eq!(loaded.output_size(), model.output_size());
    assert_eq!(loaded.memory().capacity(), model.memory().capacity());
    assert_eq!(loaded.memory().len(), model.memory().len());

    // Bitwise-equal weights.
    assert_eq!(loaded.projection().weights(), model.projection().weights());

    // Memory contents, order included.
    let original: Vec<_> = model.memory().iter().cloned().collect();
    let restored: Vec<_> = loaded.memory().iter().cloned().collect();
    assert_eq!(original, restored);

    // The content fingerprint survives the trip too.
    assert_eq!(model_digest(&model).unwrap(), model_digest(&loaded).unwrap());
}

#[test]
fn ring_behavior_resumes_after_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");

    // Fill the ring to capacity before saving.
    let mut model = sample_model();
    model
        .add_memory(&[1.0, 1.0, 0.0], &[0.0, 0.0, 0.0], Some("fourth"), 400)
        .unwrap();
    save_model(&model, &path).unwrap();

    let mut loaded = load_model(&path).unwrap();
    let note = loaded
        .add_memory(&[0.5, 0.5, 0.0], &[0.0, 0.0, 0.0], Some("fifth"), 500)
        .unwrap()
        .expect("full ring should evict");
    assert_eq!(note.evicted_id.as_deref(), Some("first"));
}

#[test]
fn every_corrupted_byte_fails_closed() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");
    save_model(&sample_model(), &path).unwrap();

    let clean = fs::read(&path).unwrap();

    // Flip one byte in the weight section (just before the 32-byte trailer)
    // and a few spread across the body; each must fail closed.
    let weight_offset = clean.len() - 33;
    let probes = [weight_offset, clean.len() / 2, 16, 60];
    for &offset in &probes {
        let mut tampered = clean.clone();
        tampered[offset] ^= 0x01;
        fs::write(&path, &tampered).unwrap();

        let result = load_model(&path);
        assert!(
            !matches!(result, Ok(_)),
            "byte {} flipped but load succeeded",
            offset
        );
    }

    // Untouched bytes still load.
    fs::write(&path, &clean).unwrap();
    assert!(load_model(&path).is_ok());
}

#[test]
fn flipped_weight_byte_reports_integrity_violation() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");
    save_model(&sample_model(), &path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let weight_offset = bytes.len() - 40;
    bytes[weight_offset] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        load_model(&path),
        Err(EngineError::IntegrityViolation)
    ));
}

#[test]
fn truncated_file_reports_truncation() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");
    save_model(&sample_model(), &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 40]).unwrap();

    assert!(matches!(
        load_model(&path),
        Err(EngineError::Truncated(_))
    ));
}

#[test]
fn core_adopts_a_loaded_model_under_its_saved_name() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");

    let mut core = mnemo_engine::Core::new("core-io", tmp.path().join("ledger"));
    core.create_model("roundtrip", ModelConfig::new(3, 2)).unwrap();
    core.add_memory("roundtrip", &[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], None, 1)
        .unwrap();
    core.save_model("roundtrip", &path).unwrap();

    // Same name still owned: adoption is refused.
    assert!(matches!(
        core.load_model(&path),
        Err(EngineError::DuplicateModel(_))
    ));

    assert!(core.destroy_model("roundtrip"));
    let name = core.load_model(&path).unwrap();
    assert_eq!(name, "roundtrip");
    assert_eq!(core.model("roundtrip").unwrap().memory().len(), 1);
}

#[test]
fn trained_weights_survive_bitwise() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("model.bin");

    let mut core = mnemo_engine::Core::new("core-rt", tmp.path().join("ledger"));
    core.create_model("trained", ModelConfig::new(2, 1)).unwrap();
    core.train(
        "trained",
        "set-rt",
        &[vec![1.0, 0.0], vec![0.0, 1.0]],
        &[vec![1.0], vec![-1.0]],
        &TrainOptions {
            epochs: 40,
            seed: 3,
            ..TrainOptions::default()
        },
        1,
    )
    .unwrap();

    core.save_model("trained", &path).unwrap();
    let loaded = load_model(&path).unwrap();
    assert!(loaded.trained());
    assert_eq!(
        loaded.projection().weights(),
        core.model("trained").unwrap().projection().weights()
    );
}
