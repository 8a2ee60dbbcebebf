//! Retrofit energy and emissions prediction core
//!
//! Loads a trained multi-target model bundle from disk and turns building
//! records into energy use intensity and CO2e emission predictions.
//!
//! Modules:
//! - `artifacts`: Latest-by-name resolution and loading of bundle files
//! - `gbdt`: Multi-target gradient boosted tree evaluator
//! - `scaler`, `encoder`, `schema`: Preprocessing objects fitted at training time
//! - `features`: Input rows and alignment into the model's feature matrix
//! - `predictor`: Inference facade over a loaded bundle
//! - `selector`: (building type, location) → bundle directory lookup
//! - `tabular`: CSV/spreadsheet reading and CSV writing

pub mod artifacts;
pub mod encoder;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod predictor;
pub mod scaler;
pub mod schema;
pub mod selector;
pub mod tabular;

pub use artifacts::{ArtifactBundle, ArtifactFiles, ArtifactKind, ResolverOptions};
pub use encoder::{EncoderSet, LabelEncoder};
pub use errors::{Result, RetrofitError};
pub use features::{align, AlignedMatrix, CellValue, InputRow};
pub use gbdt::{MultiTargetGbdt, TargetEnsemble};
pub use predictor::{
    PredictedRow, PredictionResult, PredictionSummary, Predictor, TargetStats,
    EMISSIONS_OUTPUT_COLUMN, ENERGY_OUTPUT_COLUMN,
};
pub use scaler::FeatureScaler;
pub use schema::FeatureSchema;
pub use selector::{location_from_epw, resolve_bundle_dir, supported_models};
pub use tabular::{validate_upload, FileKind, Table};

/// Crate version string reported by the service and CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
