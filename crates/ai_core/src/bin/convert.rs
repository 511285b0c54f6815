//! Handsign ONNX converter CLI
//!
//! Converts a native forest artifact into an ONNX graph and prints the
//! declared input/output tensor names of the written file.

use anyhow::{Context, Result};
use clap::Parser;
use handsign_ai_core::{convert_artifact, ConvertOptions, FEATURE_COUNT};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "handsign-convert")]
#[command(author = "Handsign Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert a trained hand-sign forest to ONNX", long_about = None)]
struct Args {
    /// Native model artifact produced by handsign-train
    #[arg(short, long, default_value = "asl_model.pkl")]
    input: PathBuf,

    /// Output ONNX file
    #[arg(short, long, default_value = "asl_model.onnx")]
    output: PathBuf,

    /// Name of the graph input tensor
    #[arg(long, default_value = "float_input")]
    input_name: String,

    /// Declared feature width of the input tensor
    #[arg(long, default_value_t = FEATURE_COUNT)]
    features: usize,

    /// Emit per-class maps (ZipMap) instead of a flat probability array
    #[arg(long)]
    zipmap: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
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

    let options = ConvertOptions {
        input_name: args.input_name,
        n_features: args.features,
        zipmap: args.zipmap,
        ..Default::default()
    };

    info!("Converting {} (zipmap={})", args.input.display(), options.zipmap);
    let io = convert_artifact(&args.input, &args.output, &options)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    println!("Saved {}", args.output.display());
    println!("Inputs:  {:?}", io.input_names());
    println!("Outputs: {:?}", io.output_names());

    Ok(())
}
