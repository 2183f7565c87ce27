use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use tov_engine::aggregate;
use tov_engine::data::load_training_data;
use tov_engine::estimate::FitOptions;
use tov_engine::profile::InputProfile;
use tov_engine::registry::ModelRegistry;
use tov_engine::train::{TrainOptions, decompose_and_train};

#[derive(Parser)]
#[command(
    name = "tov",
    about = "Train one-vs-rest risk sub-models and aggregate categorical distributions",
    long_about = "Decomposes multi-valued categorical targets into independent binary \
                  classifiers, persists them as keyed artifacts, and assembles per-profile \
                  percentage distributions with deterministic fallbacks for missing sub-models."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train every sub-model from a labeled CSV dataset
    #[command(about = "Train sub-models (outputs: tov_r1_<key>.toml artifacts)")]
    Train {
        /// Path to the labeled CSV dataset with feature and target_ columns
        #[arg(env = "DATA_PATH")]
        data: PathBuf,

        /// Directory to persist model artifacts into
        #[arg(long, env = "MODEL_DIR", default_value = "models")]
        model_dir: PathBuf,

        /// Fraction of each class held out for the report-only test AUC
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Number of stratified cross-validation folds
        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Seed for the stratified shuffles
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Ridge penalty applied to non-intercept coefficients
        #[arg(long, default_value = "1e-4")]
        ridge: f64,
    },

    /// Score one respondent profile against the loaded registry
    #[command(about = "Aggregate distributions for one profile (outputs: JSON on stdout)")]
    Predict {
        /// Path to a JSON file holding one respondent profile
        input: PathBuf,

        /// Directory holding the persisted model artifacts
        #[arg(long, env = "MODEL_DIR", default_value = "models")]
        model_dir: PathBuf,

        /// Per-request scoring deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Train {
            data,
            model_dir,
            test_fraction,
            cv_folds,
            seed,
            ridge,
        } => train_command(&data, &model_dir, test_fraction, cv_folds, seed, ridge),
        Commands::Predict {
            input,
            model_dir,
            timeout_ms,
        } => predict_command(&input, &model_dir, timeout_ms),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn train_command(
    data_path: &std::path::Path,
    model_dir: &std::path::Path,
    test_fraction: f64,
    cv_folds: usize,
    seed: u64,
    ridge: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load_training_data(data_path)?;
    println!(
        "Loaded {} rows with {} target column(s)",
        dataset.profiles.len(),
        dataset.targets.len()
    );

    let options = TrainOptions {
        test_fraction,
        cv_folds,
        seed,
        fit: FitOptions {
            ridge,
            ..FitOptions::default()
        },
    };
    let summary = decompose_and_train(&dataset, model_dir, &options)?;

    println!(
        "Persisted {} sub-model(s) to: {}",
        summary.trained.len(),
        model_dir.display()
    );
    for (key, error) in &summary.failed {
        println!("Skipped sub-model '{key}': {error}");
    }
    Ok(())
}

fn predict_command(
    input_path: &std::path::Path,
    model_dir: &std::path::Path,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::load(model_dir)?;
    log::info!(
        "Registry holds {} sub-model(s): {:?}",
        registry.len(),
        registry.keys()
    );

    let profile: InputProfile = serde_json::from_reader(File::open(input_path)?)?;
    let response = match timeout_ms {
        Some(ms) => aggregate::infer_within(&registry, &profile, Duration::from_millis(ms))?,
        None => aggregate::infer(&registry, &profile),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
