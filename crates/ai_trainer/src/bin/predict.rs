//! Handsign prediction CLI
//!
//! Scores landmark rows with a converted ONNX model, treating the rows as
//! consecutive frames for the confidence gate and rolling vote. Graphs run in
//! ONNX Runtime unless `--builtin` selects the in-process evaluator.

use anyhow::{Context, Result};
use clap::Parser;
use handsign_ai_core::landmarks::from_flat;
use handsign_ai_core::onnx::OnnxError;
use handsign_ai_core::{
    is_hand_open, load_onnx, normalize_and_flatten, OrtSession, PredictionSmoother,
    SmoothingConfig, TreeEnsembleSession,
};
use handsign_ai_trainer::{CsvOptions, Dataset};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "handsign-predict")]
#[command(author = "Handsign Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a converted hand-sign model over landmark rows", long_about = None)]
struct Args {
    /// ONNX model produced by handsign-convert
    #[arg(short, long, default_value = "asl_model.onnx")]
    model: PathBuf,

    /// CSV of feature rows; a `label` column is optional
    #[arg(short, long)]
    input: PathBuf,

    /// Rows hold absolute landmark coordinates and need wrist normalisation
    #[arg(long)]
    raw_landmarks: bool,

    /// Print raw per-frame predictions only
    #[arg(long)]
    no_smoothing: bool,

    /// Evaluate the graph in-process instead of through ONNX Runtime
    #[arg(long)]
    builtin: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

enum Scorer {
    Runtime(OrtSession),
    Builtin(TreeEnsembleSession),
}

impl Scorer {
    fn score(&mut self, row: &[f32]) -> Result<(String, Vec<f32>), OnnxError> {
        match self {
            Scorer::Runtime(session) => session.run_row(row),
            Scorer::Builtin(session) => session.run_row(row),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let graph = load_onnx(&args.model)
        .with_context(|| format!("Failed to load {}", args.model.display()))?;
    let builtin = TreeEnsembleSession::from_model(&graph).context("Unsupported model graph")?;
    info!(
        "Loaded {} ({} classes, input '{}')",
        args.model.display(),
        builtin.classes().len(),
        builtin.input_name()
    );
    let n_features = builtin.n_features();

    let mut scorer = if args.builtin {
        Scorer::Builtin(builtin)
    } else {
        let session = OrtSession::open(&args.model).context("Failed to start ONNX Runtime")?;
        if !session.has_probabilities() {
            anyhow::bail!(
                "{} exposes probabilities only through ZipMap; convert it without --zipmap",
                args.model.display()
            );
        }
        Scorer::Runtime(session)
    };

    let options = CsvOptions {
        expected_features: n_features,
        require_label: false,
        ..Default::default()
    };
    let dataset = Dataset::from_csv_with(&args.input, &options)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let mut smoother = PredictionSmoother::new(SmoothingConfig::default());
    let mut agree = 0usize;

    for (i, row) in dataset.features.iter().enumerate() {
        let features = if args.raw_landmarks {
            let landmarks = from_flat(row)?;
            debug!("row {}: hand open = {}", i, is_hand_open(&landmarks)?);
            normalize_and_flatten(&landmarks)?
        } else {
            row.clone()
        };

        let (label, probabilities) = scorer.score(&features)?;
        let confidence = probabilities.iter().copied().fold(0.0f32, f32::max);
        debug!("row {}: {:?}", i, probabilities);

        if dataset.has_labels() && dataset.labels[i] == label {
            agree += 1;
        }

        if args.no_smoothing {
            println!("{:>5}  {:<6} {:.3}", i, label, confidence);
            continue;
        }

        match smoother.push(&label, &probabilities) {
            Some(letter) => {
                println!("{:>5}  {:<6} {:.3}  -> {}", i, label, confidence, letter)
            }
            None => println!("{:>5}  {:<6} {:.3}", i, label, confidence),
        }
    }

    if dataset.has_labels() {
        println!(
            "\nAgreement with labels: {}/{} ({:.2}%)",
            agree,
            dataset.len(),
            100.0 * agree as f64 / dataset.len() as f64
        );
    }

    Ok(())
}
