use mnemo_engine::{Context, Core, EngineError, ModelConfig, TrainOp, TrainOptions};

fn opts(epochs: usize, lr: f32, seed: u64) -> TrainOptions {
    TrainOptions {
        epochs,
        learning_rate: lr,
        l2_lambda: 0.0,
        lr_decay: 0.0,
        seed,
    }
}

#[test]
fn train_appends_to_the_chain_and_converges() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-1", tmp.path());

    let mut config = ModelConfig::new(2, 1);
    config.inject_on_infer = false;
    core.create_model("toy", config).unwrap();

    let inputs = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
    let targets = vec![vec![0.0], vec![1.0]];
    core.train("toy", "toy-set", &inputs, &targets, &opts(100, 0.01, 7), 1000)
        .unwrap();

    assert!(core.model("toy").unwrap().trained());

    // With memory injection off, infer is the pure (normalized) baseline.
    let high = core.infer("toy", &[1.0, 1.0], 1001).unwrap();
    let low = core.infer("toy", &[0.0, 0.0], 1002).unwrap();
    assert!(high[0] > 0.5, "expected > 0.5, got {}", high[0]);
    assert!(low[0] < 0.5, "expected < 0.5, got {}", low[0]);

    let report = core.audit_report("toy").unwrap();
    assert!(report.chain_ok);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].op, TrainOp::Train);
    assert_eq!(report.entries[0].dataset_id, "toy-set");
    assert_eq!(report.entries[0].timestamp, 1000);
    assert_eq!(report.head_hash, report.entries[0].entry_hash);
}

#[test]
fn attention_recalls_a_stored_exchange() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-1", tmp.path());

    let mut config = ModelConfig::new(2, 2);
    config.inject_on_infer = false;
    core.create_model("recall", config).unwrap();

    // Teach the baseline the same association the memory will hold.
    core.train(
        "recall",
        "pair-set",
        &[vec![0.2, 0.8]],
        &[vec![0.9, 0.1]],
        &opts(300, 0.1, 5),
        1,
    )
    .unwrap();

    core.add_memory("recall", &[0.2, 0.8], &[0.9, 0.1], Some("pair"), 2)
        .unwrap();

    let out = core.infer("recall", &[0.2, 0.8], 3).unwrap();
    let dist = ((out[0] - 0.9).powi(2) + (out[1] - 0.1).powi(2)).sqrt();
    assert!(dist < 0.2, "blended output {:?} strayed {} from memory", out, dist);
}

#[test]
fn control_plane_walks_the_full_op_set() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-ops", tmp.path());
    core.create_model("m", ModelConfig::new(2, 1)).unwrap();

    let inputs = vec![vec![1.0, 0.0]];
    let targets = vec![vec![1.0]];

    core.train("m", "d1", &inputs, &targets, &opts(10, 0.05, 1), 10)
        .unwrap();
    core.retrain("m", "d1", &inputs, &targets, &opts(10, 0.05, 1), 20)
        .unwrap();
    core.untrain("m", "d1", 30).unwrap();
    assert!(!core.model("m").unwrap().trained());
    assert!(core
        .model("m")
        .unwrap()
        .projection()
        .weights()
        .iter()
        .all(|w| *w == 0.0));

    core.erase("d1", 40).unwrap();

    let report = core.audit_report("m").unwrap();
    assert!(report.chain_ok);
    let ops: Vec<TrainOp> = report.entries.iter().map(|e| e.op).collect();
    assert_eq!(
        ops,
        vec![TrainOp::Train, TrainOp::Retrain, TrainOp::Untrain, TrainOp::Erase]
    );

    // Erase appended a tombstone; nothing was removed.
    assert_eq!(report.entries.len(), 4);
    assert!(core.verify_chain("m").unwrap());
}

#[test]
fn retrain_resets_before_training() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-rt", tmp.path());
    core.create_model("m", ModelConfig::new(2, 1)).unwrap();

    let first_inputs = vec![vec![1.0, 0.0]];
    let first_targets = vec![vec![1.0]];
    let second_inputs = vec![vec![0.0, 1.0]];
    let second_targets = vec![vec![-1.0]];
    let o = opts(50, 0.1, 2);

    core.train("m", "d1", &first_inputs, &first_targets, &o, 1)
        .unwrap();
    core.retrain("m", "d2", &second_inputs, &second_targets, &o, 2)
        .unwrap();
    let after_retrain = core.model("m").unwrap().projection().weights().to_vec();

    // A fresh model trained only on the second set matches exactly: retrain
    // carried nothing over.
    core.create_model("fresh", ModelConfig::new(2, 1)).unwrap();
    core.train("fresh", "d2", &second_inputs, &second_targets, &o, 3)
        .unwrap();
    assert_eq!(
        core.model("fresh").unwrap().projection().weights(),
        after_retrain.as_slice()
    );
}

#[test]
fn erase_touches_every_owned_model() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-erase", tmp.path());
    core.create_model("a", ModelConfig::new(2, 1)).unwrap();
    core.create_model("b", ModelConfig::new(2, 1)).unwrap();

    let heads = core.erase("shared-set", 5).unwrap();
    assert_eq!(heads.len(), 2);

    for name in ["a", "b"] {
        let report = core.audit_report(name).unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].op, TrainOp::Erase);
        assert_eq!(report.entries[0].dataset_id, "shared-set");
    }
}

#[test]
fn auto_detect_reports_a_clean_model() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-ad", tmp.path());
    core.create_model("m", ModelConfig::new(2, 2)).unwrap();
    core.add_memory("m", &[1.0, 0.0], &[0.0, 1.0], None, 1).unwrap();
    core.add_memory("m", &[0.0, 0.0], &[0.0, 0.0], None, 2).unwrap();

    let report = core.auto_detect("m").unwrap();
    assert!(report.clean());
    assert_eq!(report.memory_len, 2);
    assert_eq!(report.zero_embeddings, 1);

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"chain_ok\":true"));
}

#[test]
fn training_history_is_reproducible() {
    let tmp1 = tempfile::tempdir().unwrap();
    let tmp2 = tempfile::tempdir().unwrap();

    let mut heads = Vec::new();
    for root in [tmp1.path(), tmp2.path()] {
        let mut core = Core::new("core-x", root);
        core.create_model("m", ModelConfig::new(2, 1)).unwrap();
        core.train(
            "m",
            "d",
            &[vec![1.0, 0.0]],
            &[vec![1.0]],
            &opts(5, 0.1, 9),
            1,
        )
        .unwrap();
        core.untrain("m", "d", 2).unwrap();
        heads.push(core.audit_report("m").unwrap().head_hash);
    }
    assert_eq!(heads[0], heads[1]);
}

#[test]
fn context_hash_is_all_that_outlives_the_context() {
    let mut ctx = Context::new("session-9", 123);
    ctx.add_blob("text/plain", b"what is the anomaly".to_vec());
    ctx.add_blob("application/octet-stream", vec![1, 2, 3]);

    let digest = ctx.hash();
    drop(ctx);
    assert_eq!(digest.algorithm, "sha256");

    let mut again = Context::new("different-session", 456);
    again.add_blob("text/plain", b"what is the anomaly".to_vec());
    again.add_blob("x/y", vec![1, 2, 3]);
    assert_eq!(again.hash(), digest);
}

#[test]
fn dimension_mismatch_surfaces_from_every_entry_point() {
    let tmp = tempfile::tempdir().unwrap();
    let mut core = Core::new("core-dm", tmp.path());
    core.create_model("m", ModelConfig::new(3, 1)).unwrap();

    assert!(matches!(
        core.infer("m", &[1.0], 0),
        Err(EngineError::DimensionMismatch { expected: 3, got: 1 })
    ));
    assert!(matches!(
        core.add_memory("m", &[1.0, 2.0], &[0.0, 0.0, 0.0], None, 0),
        Err(EngineError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        core.train(
            "m",
            "d",
            &[vec![1.0]],
            &[vec![1.0]],
            &TrainOptions::default(),
            0
        ),
        Err(EngineError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        core.train("m", "d", &[], &[], &TrainOptions::default(), 0),
        Err(EngineError::EmptyTrainingSet)
    ));
}
