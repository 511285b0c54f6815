//! Handsign Trainer CLI
//!
//! Deterministic offline trainer for the hand-sign letter classifier.

use anyhow::{Context, Result};
use clap::Parser;
use handsign_ai_trainer::{load_dataset, train_and_save, TrainConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "handsign-train")]
#[command(author = "Handsign Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the random-forest hand-sign letter classifier", long_about = None)]
struct Args {
    /// Labeled landmark CSV (f0..f62,label)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Native artifact path (`.json` writes canonical JSON instead of bincode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with `[split]` and `[forest]` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Seed for both the split and the forest
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of rows held out for evaluation
    #[arg(long)]
    test_size: Option<f64>,

    /// Write the classification report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_toml_file(path)?,
            None => TrainConfig::default(),
        };

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(trees) = self.trees {
            config.forest.n_estimators = trees;
        }
        if let Some(seed) = self.seed {
            config.forest.seed = seed;
            config.split.seed = seed;
        }
        if let Some(test_size) = self.test_size {
            config.split.test_size = test_size;
        }
        if let Some(report) = self.report {
            config.report_path = Some(report);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
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

    info!("Handsign Random Forest Trainer v{}", handsign_ai_trainer::VERSION);

    let config = args.into_config().context("Invalid training configuration")?;
    info!("Training configuration:");
    info!("  Trees: {}", config.forest.n_estimators);
    info!("  Forest seed: {}", config.forest.seed);
    info!("  Split: test_size={} seed={}", config.split.test_size, config.split.seed);

    let loaded = load_dataset(&config).context("Failed to load dataset")?;

    println!("Dataset shape: {:?}", loaded.dataset.shape());
    println!("\nSamples per letter:");
    for (label, count) in loaded.class_counts() {
        println!("{:<8}{:>6}", label, count);
    }

    let (_model, outcome) = train_and_save(&config, &loaded).context("Training failed")?;

    println!("\nClassification Report:");
    println!("{}", outcome.report);
    println!("\nModel saved to {}", outcome.artifact_path);

    info!("✓ Training completed successfully");
    info!("  Model hash: {}", outcome.model_hash);
    info!("  Artifact hash: {}", outcome.artifact_hash);
    info!("  Dataset hash: {}", outcome.dataset_hash);

    Ok(())
}
