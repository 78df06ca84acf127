use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facemark_core::{DetectionModel, EncodingDatabase, OnnxFaceEngine};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod annotate;
mod config;
mod encode;
mod layout;
mod present;
mod recognize;
#[cfg(test)]
mod testing;

use annotate::Annotator;
use config::Config;
use encode::{EncodeOptions, EncodeOutcome};
use layout::Layout;
use present::DirectoryPresenter;
use recognize::{RecognizeOptions, RecognizeOutcome};

#[derive(Parser)]
#[command(name = "facemark", about = "Encode known faces and recognize them in validation images")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Detection model: "fast" (SCRFD 500M) or "accurate" (SCRFD 10G)
    #[arg(long, global = true)]
    model: Option<DetectionModel>,

    /// Encoding database path
    #[arg(long, global = true)]
    encodings: Option<PathBuf>,

    /// Maximum embedding distance for a match
    #[arg(long, global = true)]
    tolerance: Option<f32>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Encode training faces, then recognize validation images (default)
    Run,
    /// Encode the faces under the training directory
    Encode,
    /// Recognize faces in the validation directory
    Recognize,
    /// Summarize the encoding database as JSON
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(model) = cli.model {
        config.detection_model = model;
    }
    if let Some(path) = cli.encodings {
        config.encodings_path = path;
    }
    if let Some(tolerance) = cli.tolerance {
        config.match_tolerance = tolerance;
    }

    let layout = Layout::from_config(&config);
    layout.ensure()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut engine = load_engine(&config)?;
            run_encode(&mut engine, &config)?;
            run_recognize(&mut engine, &config);
        }
        Commands::Encode => {
            let mut engine = load_engine(&config)?;
            run_encode(&mut engine, &config)?;
        }
        Commands::Recognize => {
            let mut engine = load_engine(&config)?;
            run_recognize(&mut engine, &config);
        }
        Commands::List => list(&config)?,
    }

    Ok(())
}

fn load_engine(config: &Config) -> Result<OnnxFaceEngine> {
    OnnxFaceEngine::load(&config.model_dir, config.detection_model)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))
}

fn run_encode(engine: &mut OnnxFaceEngine, config: &Config) -> Result<()> {
    let opts = EncodeOptions {
        training_dir: &config.training_dir,
        encodings_path: &config.encodings_path,
        model: config.detection_model,
    };

    match encode::encode_known_faces(engine, &opts)? {
        EncodeOutcome::EmptyTrainingDir => {
            println!("The training directory {} is empty.", config.training_dir.display());
        }
        EncodeOutcome::NoEncodings { .. } => println!("No encodings to save."),
        EncodeOutcome::Saved { path, records, identities, .. } => {
            println!(
                "Encodings saved successfully: {records} faces of {identities} identities in {}",
                path.display()
            );
        }
    }
    Ok(())
}

/// Failures are reported here and never propagate: the recognizer is the
/// last stage and has no caller to hand them to.
fn run_recognize(engine: &mut OnnxFaceEngine, config: &Config) {
    let annotator = Annotator::load(&config.font_path);
    if !annotator.draws_labels() {
        println!("No label font at {}; drawing boxes only.", config.font_path.display());
    }
    let mut presenter = DirectoryPresenter::new(&config.annotated_dir);
    let opts = RecognizeOptions {
        validation_dir: &config.validation_dir,
        encodings_path: &config.encodings_path,
        model: config.detection_model,
        tolerance: config.match_tolerance,
    };

    match recognize::recognize_faces(engine, &annotator, &mut presenter, &opts) {
        RecognizeOutcome::DatabaseMissing { path } => {
            println!(
                "File {} not found. Please ensure the encoding process was successful.",
                path.display()
            );
        }
        RecognizeOutcome::Finished { reports, load_failures } => {
            for report in &reports {
                println!("{}: {}", report.path.display(), report.labels().join(", "));
            }
            println!(
                "Recognized {} images ({load_failures} skipped); annotated copies in {}",
                reports.len(),
                config.annotated_dir.display()
            );
        }
        RecognizeOutcome::Aborted { reports, error } => {
            println!(
                "An error occurred while recognizing faces after {} images: {error:#}",
                reports.len()
            );
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let db = EncodingDatabase::load(&config.encodings_path)?;
    let labels: serde_json::Map<String, serde_json::Value> = db
        .label_counts()
        .into_iter()
        .map(|(label, count)| (label.to_string(), count.into()))
        .collect();

    let summary = serde_json::json!({
        "path": config.encodings_path.display().to_string(),
        "records": db.len(),
        "labels": labels,
        "detection_model": db.detection_model,
        "embedding_model": db.embedding_model,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
