//! Integration tests for the training and conversion stages
//!
//! Runs the full pipeline on a synthetic 63-feature landmark dataset and
//! checks the artifacts and the converted graph, scored by ONNX Runtime,
//! against the native model.

use handsign_ai_core::onnx::OnnxError;
use handsign_ai_core::{
    convert_artifact, convert_forest, describe_io, load_artifact, load_onnx, save_onnx,
    ConvertOptions, ForestModel, ForestParams, OrtSession, TreeEnsembleSession, FEATURE_COUNT,
};
use handsign_ai_trainer::{
    load_dataset, run, stratified_split, train_and_save, train_model_from_csv, TrainConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const LETTERS: [&str; 4] = ["C", "A", "D", "B"];
const ROWS_PER_LETTER: usize = 15;

/// Letters written out of order so class sorting is observable
fn write_dataset(path: &Path, letters: &[&str]) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut csv = String::new();

    let header: Vec<String> = (0..FEATURE_COUNT).map(|i| format!("f{}", i)).collect();
    writeln!(csv, "{},label", header.join(",")).unwrap();

    for row in 0..ROWS_PER_LETTER * letters.len() {
        let class = row % letters.len();
        let values: Vec<String> = (0..FEATURE_COUNT)
            .map(|f| {
                let centre = if f % letters.len() == class { 1.0 } else { 0.0 };
                format!("{:.4}", centre + rng.gen_range(-0.2..0.2))
            })
            .collect();
        writeln!(csv, "{},{}", values.join(","), letters[class]).unwrap();
    }

    std::fs::write(path, csv).unwrap();
}

fn setup_with(letters: &[&str], n_estimators: usize) -> (TempDir, TrainConfig) {
    let dir = tempdir().unwrap();
    let input = dir.path().join("asl_static_dataset.csv");
    write_dataset(&input, letters);

    let config = TrainConfig {
        input,
        output: dir.path().join("asl_model.pkl"),
        forest: ForestParams {
            n_estimators,
            ..Default::default()
        },
        ..Default::default()
    };
    (dir, config)
}

fn setup() -> (TempDir, TrainConfig) {
    setup_with(&LETTERS, 12)
}

fn assert_matches_native(model: &ForestModel, rows: &[Vec<f32>], session: &mut OrtSession) {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    let output = session.run(&flat, FEATURE_COUNT).unwrap();

    assert_eq!(output.labels, model.predict(rows).unwrap());
    assert_eq!(output.n_classes, model.num_classes());

    for (i, row) in rows.iter().enumerate() {
        let native = model.predict_proba_row(row).unwrap();
        let converted = output.row(i);
        assert_eq!(converted.len(), native.len());
        for (a, b) in native.iter().zip(converted) {
            assert!((a - b).abs() < 1e-5, "row {}: {} vs {}", i, a, b);
        }
    }
}

fn output_in(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn test_split_sizes_and_coverage() {
    let (_dir, config) = setup();
    let loaded = load_dataset(&config).unwrap();
    let labels = &loaded.dataset.labels;

    let split = stratified_split(labels, 0.2, 42).unwrap();
    assert_eq!(split.test.len(), 12); // ceil(0.2 * 60)
    assert_eq!(split.train.len(), 48);

    let all: BTreeSet<&str> = LETTERS.iter().copied().collect();
    let train: BTreeSet<&str> = split.train.iter().map(|&i| labels[i].as_str()).collect();
    let test: BTreeSet<&str> = split.test.iter().map(|&i| labels[i].as_str()).collect();
    assert_eq!(train, all);
    assert_eq!(test, all);
}

#[test]
fn test_training_is_byte_identical() {
    let (dir, config) = setup();

    let first = run(&config).unwrap();
    let bytes1 = std::fs::read(&config.output).unwrap();

    let second_config = TrainConfig {
        output: output_in(&dir, "again.pkl"),
        ..config.clone()
    };
    let second = run(&second_config).unwrap();
    let bytes2 = std::fs::read(&second_config.output).unwrap();

    assert_eq!(bytes1, bytes2, "Artifacts should be byte-identical");
    assert_eq!(first.model_hash, second.model_hash);
    assert_eq!(first.artifact_hash, second.artifact_hash);
    assert_eq!(first.report, second.report);
}

#[test]
fn test_artifact_round_trip_predicts_identically() {
    let (_dir, config) = setup();
    let loaded = load_dataset(&config).unwrap();
    let (model, _) = train_and_save(&config, &loaded).unwrap();

    let restored = load_artifact(&config.output).unwrap();
    assert_eq!(restored, model);
    assert_eq!(
        restored.predict(&loaded.dataset.features).unwrap(),
        model.predict(&loaded.dataset.features).unwrap()
    );
}

#[test]
fn test_json_artifact_round_trip() {
    let (dir, config) = setup();
    let config = TrainConfig {
        output: output_in(&dir, "asl_model.json"),
        ..config
    };
    let loaded = load_dataset(&config).unwrap();
    let (model, _) = train_and_save(&config, &loaded).unwrap();

    let text = std::fs::read_to_string(&config.output).unwrap();
    assert!(text.starts_with('{'));
    assert_eq!(load_artifact(&config.output).unwrap(), model);
}

#[test]
fn test_class_order_is_sorted() {
    let (_dir, config) = setup();
    let outcome = run(&config).unwrap();
    assert_eq!(outcome.classes, vec!["A", "B", "C", "D"]);

    let model = load_artifact(&config.output).unwrap();
    let onnx = convert_forest(&model, &ConvertOptions::default()).unwrap();
    let session = TreeEnsembleSession::from_model(&onnx).unwrap();
    assert_eq!(session.classes(), model.classes.as_slice());
}

#[test]
fn test_converted_graph_matches_native_model() {
    let (dir, config) = setup();
    let loaded = load_dataset(&config).unwrap();
    let (model, _) = train_and_save(&config, &loaded).unwrap();

    let onnx_path = output_in(&dir, "asl_model.onnx");
    convert_artifact(&config.output, &onnx_path, &ConvertOptions::default()).unwrap();

    let mut session = OrtSession::open(&onnx_path).unwrap();
    assert_eq!(session.input_name(), "float_input");
    assert_eq!(session.output_names(), vec!["label", "probabilities"]);
    assert_matches_native(&model, &loaded.dataset.features, &mut session);
}

#[test]
fn test_two_letter_graph_matches_native_model() {
    // Odd tree count keeps the vote away from an exact 0.5 tie
    let (dir, config) = setup_with(&["B", "A"], 11);
    let loaded = load_dataset(&config).unwrap();
    let (model, _) = train_and_save(&config, &loaded).unwrap();
    assert_eq!(model.classes, vec!["A", "B"]);

    let onnx_path = output_in(&dir, "asl_model.onnx");
    convert_artifact(&config.output, &onnx_path, &ConvertOptions::default()).unwrap();

    let mut session = OrtSession::open(&onnx_path).unwrap();
    assert_matches_native(&model, &loaded.dataset.features, &mut session);
}

#[test]
fn test_builtin_evaluator_agrees_with_onnx_runtime() {
    let (dir, config) = setup();
    let loaded = load_dataset(&config).unwrap();
    train_and_save(&config, &loaded).unwrap();

    let onnx_path = output_in(&dir, "asl_model.onnx");
    convert_artifact(&config.output, &onnx_path, &ConvertOptions::default()).unwrap();

    let flat: Vec<f32> = loaded.dataset.features.iter().flatten().copied().collect();
    let runtime = OrtSession::open(&onnx_path).unwrap().run(&flat, FEATURE_COUNT).unwrap();
    let builtin = TreeEnsembleSession::from_model(&load_onnx(&onnx_path).unwrap())
        .unwrap()
        .run(&flat, FEATURE_COUNT)
        .unwrap();

    assert_eq!(builtin.labels, runtime.labels);
    assert_eq!(builtin.n_classes, runtime.n_classes);
    for (a, b) in builtin.probabilities.iter().zip(&runtime.probabilities) {
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    }
}

#[test]
fn test_graph_io_declaration() {
    let (dir, config) = setup();
    run(&config).unwrap();

    let model = load_artifact(&config.output).unwrap();
    let onnx_path = output_in(&dir, "asl_model.onnx");
    save_onnx(&onnx_path, &convert_forest(&model, &ConvertOptions::default()).unwrap()).unwrap();

    let io = describe_io(&load_onnx(&onnx_path).unwrap()).unwrap();
    assert_eq!(io.input_names(), vec!["float_input"]);
    assert_eq!(io.inputs[0].dims, Some(vec![None, Some(63)]));
    assert_eq!(io.output_names(), vec!["label", "probabilities"]);
    assert_eq!(io.outputs[1].dims, Some(vec![None, Some(4)]));
}

#[test]
fn test_zipmap_adds_map_output() {
    let (dir, config) = setup();
    run(&config).unwrap();

    let options = ConvertOptions {
        zipmap: true,
        ..Default::default()
    };
    let zip_path = output_in(&dir, "zip.onnx");
    let io = convert_artifact(&config.output, &zip_path, &options).unwrap();
    assert_eq!(io.output_names(), vec!["label", "output_probability"]);
    assert_eq!(io.outputs[1].dims, None);

    let model = load_artifact(&config.output).unwrap();
    let loaded = load_dataset(&config).unwrap();
    let flat: Vec<f32> = loaded.dataset.features.iter().flatten().copied().collect();

    let mut session = OrtSession::open(&zip_path).unwrap();
    assert_eq!(session.output_names(), vec!["label", "output_probability"]);
    assert!(!session.has_probabilities());
    assert_eq!(
        session.predict(&flat, FEATURE_COUNT).unwrap(),
        model.predict(&loaded.dataset.features).unwrap()
    );
    assert!(matches!(
        session.run(&flat, FEATURE_COUNT),
        Err(OnnxError::Unsupported(_))
    ));
}

#[test]
fn test_heldout_accuracy_on_separable_data() {
    let (_dir, config) = setup();
    let outcome = run(&config).unwrap();
    assert_eq!(outcome.n_test, 12);
    assert!(outcome.report.accuracy >= 0.75, "accuracy {}", outcome.report.accuracy);
}

#[test]
fn test_train_model_from_csv_uses_all_rows() {
    let (_dir, config) = setup();
    let params = ForestParams {
        n_estimators: 5,
        ..Default::default()
    };
    let model = train_model_from_csv(&config.input, params).unwrap();
    assert_eq!(model.num_trees(), 5);
    assert_eq!(model.feature_count, FEATURE_COUNT);
}
