//! Artifact bundle discovery and loading
//!
//! A bundle directory holds any number of timestamped exports of the four
//! artifact classes. The file sorting last by name wins in each class.

use crate::encoder::EncoderSet;
use crate::errors::{Result, RetrofitError};
use crate::gbdt::MultiTargetGbdt;
use crate::scaler::FeatureScaler;
use crate::schema::FeatureSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The four artifact classes produced by a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Scaler,
    Encoders,
    Schema,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Model,
        ArtifactKind::Scaler,
        ArtifactKind::Encoders,
        ArtifactKind::Schema,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Model => "best_model_multitarget_",
            ArtifactKind::Scaler => "scaler_",
            ArtifactKind::Encoders => "label_encoders_",
            ArtifactKind::Schema => "feature_columns_",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Encoders => "encoders",
            ArtifactKind::Schema => "schema",
        }
    }

    pub fn matches(self, file_name: &str) -> bool {
        file_name.starts_with(self.prefix()) && file_name.ends_with(ARTIFACT_EXTENSION)
    }

    /// File name for an export stamped with `version`
    pub fn file_name(self, version: &str) -> String {
        format!("{}{}{}", self.prefix(), version, ARTIFACT_EXTENSION)
    }
}

pub const ARTIFACT_EXTENSION: &str = ".json";

/// Resolver behaviour switches
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Require scaler, encoders and schema to carry the model's version stamp
    pub verify_versions: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            verify_versions: true,
        }
    }
}

/// Names of the files a bundle was loaded from
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ArtifactFiles {
    pub model: String,
    pub scaler: String,
    pub encoders: String,
    pub schema: String,
}

/// Everything needed to turn input rows into predictions. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub model: MultiTargetGbdt,
    pub scaler: FeatureScaler,
    pub encoders: EncoderSet,
    pub schema: FeatureSchema,
    pub files: ArtifactFiles,
    /// Version stamp of the model file, when it carries one
    pub version: Option<String>,
    pub directory: PathBuf,
}

impl ArtifactBundle {
    /// Load the latest artifacts in `directory` with default options
    pub fn load_latest<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::load_latest_with(directory, &ResolverOptions::default())
    }

    pub fn load_latest_with<P: AsRef<Path>>(directory: P, options: &ResolverOptions) -> Result<Self> {
        let directory = directory.as_ref();
        info!(directory = %directory.display(), "Loading trained multi-target model");

        let names = list_artifact_files(directory)?;
        let latest = |kind: ArtifactKind| -> Result<String> {
            names
                .iter()
                .filter(|name| kind.matches(name))
                .max()
                .cloned()
                .ok_or_else(|| RetrofitError::ArtifactNotFound {
                    kind: kind.label(),
                    directory: directory.display().to_string(),
                })
        };

        let files = ArtifactFiles {
            model: latest(ArtifactKind::Model)?,
            scaler: latest(ArtifactKind::Scaler)?,
            encoders: latest(ArtifactKind::Encoders)?,
            schema: latest(ArtifactKind::Schema)?,
        };

        let version = version_stamp(ArtifactKind::Model, &files.model);
        if options.verify_versions {
            if let Some(model_version) = &version {
                for (kind, name) in [
                    (ArtifactKind::Scaler, &files.scaler),
                    (ArtifactKind::Encoders, &files.encoders),
                    (ArtifactKind::Schema, &files.schema),
                ] {
                    if let Some(found) = version_stamp(kind, name) {
                        if &found != model_version {
                            return Err(RetrofitError::ArtifactVersionMismatch {
                                kind: kind.label(),
                                model: model_version.clone(),
                                found,
                            });
                        }
                    }
                }
            }
        }

        let model: MultiTargetGbdt = read_json(directory, &files.model)?;
        model
            .validate()
            .map_err(|e| format_error(&files.model, e.to_string()))?;
        info!(file = %files.model, trees = model.num_trees(), "Loaded multi-target model");

        let scaler: FeatureScaler = read_json(directory, &files.scaler)?;
        scaler
            .validate()
            .map_err(|reason| format_error(&files.scaler, reason))?;
        info!(file = %files.scaler, "Loaded scaler");

        let encoders: EncoderSet = read_json(directory, &files.encoders)?;
        if let Some((column, _)) = encoders.iter().find(|(_, enc)| enc.classes.is_empty()) {
            return Err(format_error(
                &files.encoders,
                format!("encoder for {column:?} has no classes"),
            ));
        }
        info!(file = %files.encoders, columns = encoders.len(), "Loaded label encoders");

        let schema: FeatureSchema = read_json(directory, &files.schema)?;
        schema
            .validate()
            .map_err(|reason| format_error(&files.schema, reason))?;
        info!(file = %files.schema, features = schema.width(), "Loaded feature info");

        if scaler.n_features() != schema.width() {
            return Err(RetrofitError::ShapeMismatch(format!(
                "scaler fitted on {} columns, schema lists {}",
                scaler.n_features(),
                schema.width()
            )));
        }
        if model.n_features != schema.width() {
            return Err(RetrofitError::ShapeMismatch(format!(
                "model expects {} features, schema lists {}",
                model.n_features,
                schema.width()
            )));
        }

        info!(version = ?version, "All models and preprocessing objects loaded");

        Ok(Self {
            model,
            scaler,
            encoders,
            schema,
            files,
            version,
            directory: directory.to_path_buf(),
        })
    }

    /// Human-readable identifier used in API responses
    pub fn model_label(&self) -> String {
        let stem = self
            .files
            .model
            .strip_suffix(ARTIFACT_EXTENSION)
            .unwrap_or(&self.files.model);
        let name = if self.model.name.is_empty() {
            "GBDT"
        } else {
            self.model.name.as_str()
        };
        format!("{name} Multi-Target ({stem})")
    }
}

/// Sorted names of every artifact file in `directory`.
///
/// A missing directory counts as holding no artifacts.
pub fn list_artifact_files<P: AsRef<Path>>(directory: P) -> Result<Vec<String>> {
    let directory = directory.as_ref();
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(directory = %directory.display(), "Artifact directory does not exist");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if ArtifactKind::ALL.iter().any(|kind| kind.matches(name)) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Trailing run of all-digit `_` segments, e.g. `20240101_000000`
pub fn version_stamp(kind: ArtifactKind, file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_prefix(kind.prefix())?
        .strip_suffix(ARTIFACT_EXTENSION)?;

    let mut segments: Vec<&str> = stem
        .rsplit('_')
        .take_while(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
        .collect();
    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(segments.join("_"))
}

fn read_json<T: DeserializeOwned>(directory: &Path, name: &str) -> Result<T> {
    let content = fs::read_to_string(directory.join(name))?;
    serde_json::from_str(&content).map_err(|e| format_error(name, e.to_string()))
}

fn format_error(file: &str, reason: String) -> RetrofitError {
    RetrofitError::ArtifactFormat {
        file: file.to_string(),
        reason,
    }
}
