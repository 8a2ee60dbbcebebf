//! Retrofit prediction CLI
//!
//! Predicts energy use intensity and CO2e emissions for every building in a
//! CSV or Excel file and writes the input rows back out with both
//! predictions appended.

use anyhow::{Context, Result};
use clap::Parser;
use retrofit_core::selector::resolve_bundle_dir;
use retrofit_core::{
    PredictionSummary, Predictor, ResolverOptions, Table, EMISSIONS_OUTPUT_COLUMN,
    ENERGY_OUTPUT_COLUMN,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "retrofit-predict")]
#[command(author = "Retrofit Predictor Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Make predictions using trained multi-target models", long_about = None)]
struct Args {
    /// Input CSV or Excel (.xlsx, .xls) file
    input_file: PathBuf,

    /// Directory holding the trained artifacts
    #[arg(long, default_value = "output/models")]
    models_dir: PathBuf,

    /// Where to write predictions (default: next to the models directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Building type used to select a bundle under the models directory
    #[arg(long, requires = "location")]
    building_type: Option<String>,

    /// Location used to select a bundle under the models directory
    #[arg(long, requires = "building_type")]
    location: Option<String>,

    /// Load artifacts even when their version stamps differ
    #[arg(long)]
    no_verify_versions: bool,

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

    info!("Retrofit Predictor v{}", retrofit_core::VERSION);
    info!("═══════════════════════════════════════════");

    run(&args)?;
    Ok(())
}

fn run(args: &Args) -> Result<PathBuf> {
    let models_dir = match (&args.building_type, &args.location) {
        (Some(building_type), Some(location)) => {
            let bundle = resolve_bundle_dir(building_type, location)
                .context("Failed to select a model bundle")?;
            info!("Selected bundle {} for {} in {}", bundle, building_type, location);
            args.models_dir.join(bundle)
        }
        _ => args.models_dir.clone(),
    };

    let options = ResolverOptions {
        verify_versions: !args.no_verify_versions,
    };
    let predictor = Predictor::from_directory(&models_dir, &options)
        .with_context(|| format!("Failed to load models from {}", models_dir.display()))?;
    info!("Model: {}", predictor.bundle().model_label());

    info!("Loading data from: {}", args.input_file.display());
    let input = Table::read_path(&args.input_file)
        .with_context(|| format!("Failed to read {}", args.input_file.display()))?;
    info!("Loaded {} rows, {} columns", input.len(), input.n_columns());

    let predicted = predictor
        .predict(&input.rows)
        .context("Prediction failed")?;

    if let Some(summary) = PredictionSummary::from_results(predicted.iter().map(|p| p.result)) {
        info!("Prediction summary:");
        info!(
            "  {}: mean={:.4}, std={:.4}, min={:.4}, max={:.4}",
            ENERGY_OUTPUT_COLUMN,
            summary.energy.mean,
            summary.energy.std,
            summary.energy.min,
            summary.energy.max
        );
        info!(
            "  {}: mean={:.4}, std={:.4}, min={:.4}, max={:.4}",
            EMISSIONS_OUTPUT_COLUMN,
            summary.emissions.mean,
            summary.emissions.std,
            summary.emissions.min,
            summary.emissions.max
        );
    }

    let output = Table {
        headers: output_headers(&input.headers),
        rows: predicted.into_iter().map(|p| p.row).collect(),
    };

    let output_path = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&models_dir, &args.input_file, &timestamp()),
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    let file = File::create(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    output
        .write_csv(BufWriter::new(file))
        .context("Failed to write predictions")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Predictions saved to: {}", output_path.display());
    info!("  Predicted {} samples successfully", output.len());

    Ok(output_path)
}

/// Input headers followed by the two prediction columns
fn output_headers(input: &[String]) -> Vec<String> {
    let mut headers = input.to_vec();
    for column in [ENERGY_OUTPUT_COLUMN, EMISSIONS_OUTPUT_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            headers.push(column.to_string());
        }
    }
    headers
}

/// `<models_dir>/../predictions_<input stem>_<timestamp>.csv`
fn default_output_path(models_dir: &Path, input_file: &Path, timestamp: &str) -> PathBuf {
    let stem = input_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let base = models_dir.parent().unwrap_or_else(|| Path::new("."));
    base.join(format!("predictions_{stem}_{timestamp}.csv"))
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = r#"{
        "version": 1,
        "name": "XGBoost",
        "n_features": 2,
        "targets": [
            {"name": "energy", "base_score": 1.5, "trees": [
                {"nodes": [
                    {"id":0,"left":1,"right":2,"feature_idx":1,"threshold":100.0,"default_left":true,"leaf":null},
                    {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":0.5},
                    {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":1.0}
                ]}
            ]},
            {"name": "emissions", "base_score": 40.0, "trees": []}
        ]
    }"#;

    fn write_bundle(dir: &Path) {
        let files = [
            ("best_model_multitarget_XGBoost_20250101_000000.json", MODEL),
            (
                "scaler_20250101_000000.json",
                r#"{"kind":"standard","mean":[0.0,0.0],"scale":[1.0,1.0]}"#,
            ),
            (
                "label_encoders_20250101_000000.json",
                r#"{"type":{"classes":["Office","School"]}}"#,
            ),
            (
                "feature_columns_20250101_000000.json",
                r#"{"feature_columns":["type","sqft"],"categorical_features":["type"],"numerical_features":["sqft"]}"#,
            ),
        ];
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn default_output_sits_beside_models_dir() {
        let path = default_output_path(
            Path::new("output/models"),
            Path::new("data/input_data.xlsx"),
            "20250101_120000",
        );
        assert_eq!(
            path,
            PathBuf::from("output/predictions_input_data_20250101_120000.csv")
        );
    }

    #[test]
    fn prediction_columns_are_appended_once() {
        let headers = output_headers(&["a".to_string(), ENERGY_OUTPUT_COLUMN.to_string()]);
        assert_eq!(
            headers,
            vec![
                "a".to_string(),
                ENERGY_OUTPUT_COLUMN.to_string(),
                EMISSIONS_OUTPUT_COLUMN.to_string()
            ]
        );
    }

    #[test]
    fn building_type_requires_location() {
        assert!(
            Args::try_parse_from(["retrofit-predict", "in.csv", "--building-type", "MidRise"])
                .is_err()
        );
        assert!(Args::try_parse_from(["retrofit-predict", "in.csv"]).is_ok());
    }

    #[test]
    fn predicts_csv_file_end_to_end() {
        let workspace = TempDir::new().unwrap();
        let models = workspace.path().join("models");
        fs::create_dir(&models).unwrap();
        write_bundle(&models);

        let input = workspace.path().join("buildings.csv");
        fs::write(&input, "id,type,sqft\n1,School,50\n2,Office,NA\n3,Office,500\n").unwrap();
        let output = workspace.path().join("out/predictions.csv");

        let args = Args::try_parse_from([
            "retrofit-predict",
            input.to_str().unwrap(),
            "--models-dir",
            models.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();

        let written = run(&args).unwrap();
        assert_eq!(written, output);

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            format!("id,type,sqft,{ENERGY_OUTPUT_COLUMN},{EMISSIONS_OUTPUT_COLUMN}")
        );
        assert_eq!(lines[1], "1,School,50,2,40");
        // missing sqft imputes to 0
        assert_eq!(lines[2], "2,Office,,2,40");
        assert_eq!(lines[3], "3,Office,500,2.5,40");
    }

    #[test]
    fn unknown_bundle_selection_fails() {
        let workspace = TempDir::new().unwrap();
        let args = Args::try_parse_from([
            "retrofit-predict",
            "in.csv",
            "--models-dir",
            workspace.path().to_str().unwrap(),
            "--building-type",
            "unknown-type",
            "--location",
            "Nowhere",
        ])
        .unwrap();
        assert!(run(&args).is_err());
    }
}
