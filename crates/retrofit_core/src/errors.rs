//! Error types for the retrofit prediction core

use thiserror::Error;

/// Errors raised while loading artifacts, preparing features or predicting
#[derive(Error, Debug)]
pub enum RetrofitError {
    /// No file of the given artifact class exists in the bundle directory
    #[error("No {kind} artifact found in {directory}")]
    ArtifactNotFound { kind: &'static str, directory: String },

    /// Latest files of two artifact classes carry different version stamps
    #[error("Artifact version mismatch: model is {model}, {kind} is {found}")]
    ArtifactVersionMismatch {
        kind: &'static str,
        model: String,
        found: String,
    },

    /// An artifact file exists but does not describe a usable object
    #[error("Invalid artifact {file}: {reason}")]
    ArtifactFormat { file: String, reason: String },

    /// Input lacks required feature columns
    #[error("Missing required features: {0:?}")]
    MissingFeatures(Vec<String>),

    /// A cell could not be interpreted as a number
    #[error("Invalid value {value:?} in column {column} (row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Matrix, scaler or model widths disagree
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Uploaded file extension is not supported
    #[error("Invalid file type: {0}. Please upload an Excel file (.xlsx, .xls) or CSV file")]
    UnsupportedFileType(String),

    /// Too many rows in a single request
    #[error("Maximum {limit} buildings per request, got {rows}. Please split your data.")]
    TooManyRows { rows: usize, limit: usize },

    /// Too few columns in an uploaded file
    #[error("File should have at least {required} input columns. Found only {found} columns.")]
    TooFewColumns { found: usize, required: usize },

    /// Input contains no data rows
    #[error("Input contains no data rows")]
    EmptyInput,

    /// The model call itself failed or produced an unusable output
    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    /// The selector has no bundle for the requested combination
    #[error("No model available for building type {building_type:?} in {location:?}")]
    NoModelForCombination {
        building_type: String,
        location: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet error
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl RetrofitError {
    /// Whether the error stems from caller input rather than server state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RetrofitError::MissingFeatures(_)
                | RetrofitError::InvalidValue { .. }
                | RetrofitError::UnsupportedFileType(_)
                | RetrofitError::TooManyRows { .. }
                | RetrofitError::TooFewColumns { .. }
                | RetrofitError::EmptyInput
                | RetrofitError::Csv(_)
                | RetrofitError::Spreadsheet(_)
                | RetrofitError::NoModelForCombination { .. }
        )
    }
}

/// Result type for retrofit core operations
pub type Result<T> = std::result::Result<T, RetrofitError>;
