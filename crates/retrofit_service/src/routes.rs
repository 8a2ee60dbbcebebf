//! Request handlers for the root app and the `/retrofit` prediction API

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use retrofit_core::artifacts::{list_artifact_files, ArtifactFiles};
use retrofit_core::tabular::validate_upload;
use retrofit_core::{supported_models, InputRow, Predictor, RetrofitError, Table};
use serde::{Deserialize, Serialize};
use sysinfo::{CpuExt, System, SystemExt};
use tracing::{debug, info, warn};

use crate::report::{BatchPredictionOutput, PredictionOutput, TEMPLATE_TARGET_COLUMNS};
use crate::server::{ApiError, SharedState};

/// Field carrying the uploaded file in multipart requests
const UPLOAD_FIELD: &str = "file";
const TEMPLATE_FILE_NAME: &str = "comstock_input_template.csv";
/// Pause between the two CPU samples taken for `/retrofit/health`
const CPU_SAMPLE_INTERVAL_MS: u64 = 200;

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub async fn root() -> String {
    format!(
        "Retrofit Planner API v{} - prediction endpoints are under /retrofit",
        retrofit_core::VERSION
    )
}

#[derive(Debug, Serialize)]
pub struct AppHealthResponse {
    status: &'static str,
    service: &'static str,
    message: &'static str,
}

pub async fn app_health() -> Json<AppHealthResponse> {
    Json(AppHealthResponse {
        status: "ok",
        service: "retrofit-planner",
        message: "Retrofit Planner API is healthy",
    })
}

/// Predict one building given as a JSON object of column → value
pub async fn predict(
    State(state): State<SharedState>,
    payload: Result<Json<InputRow>, JsonRejection>,
) -> Result<Json<PredictionOutput>, ApiError> {
    let started = Instant::now();
    let Json(building) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let predictor = state.predictor()?;

    let predicted = predictor.predict(std::slice::from_ref(&building))?;
    let first = predicted
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::internal("Prediction failed: model returned no rows"))?;
    if !first.result.is_finite() {
        return Err(ApiError::internal(
            "Prediction failed: model returned a non-finite value",
        ));
    }

    let model_used = predictor.bundle().model_label();
    Ok(Json(PredictionOutput::new(
        0,
        &building,
        first.result,
        &model_used,
        elapsed_ms(started),
    )))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub buildings: Vec<InputRow>,
}

/// Predict many buildings; rows that cannot be predicted are counted, not fatal
pub async fn batch_predict(
    State(state): State<SharedState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchPredictionOutput>, ApiError> {
    let started = Instant::now();
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if request.buildings.is_empty() {
        return Err(ApiError::bad_request("No buildings provided"));
    }
    let limit = state.config.upload.max_rows;
    if request.buildings.len() > limit {
        return Err(RetrofitError::TooManyRows {
            rows: request.buildings.len(),
            limit,
        }
        .into());
    }

    let predictor = state.predictor()?;
    predict_rows(predictor, &request.buildings, started).map(Json)
}

/// Predict every building in an uploaded `.csv`, `.xlsx` or `.xls` file
pub async fn upload_and_predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<BatchPredictionOutput>, ApiError> {
    let started = Instant::now();

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Invalid multipart body: {err}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("Could not read uploaded file: {err}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload
        .ok_or_else(|| ApiError::bad_request(format!("Missing multipart field {UPLOAD_FIELD:?}")))?;

    let table = Table::read_bytes(&file_name, bytes.to_vec())?;
    let limits = &state.config.upload;
    validate_upload(&table, limits.min_columns, limits.max_rows)?;
    debug!(file = %file_name, rows = table.len(), columns = table.n_columns(), "Upload accepted");

    let predictor = state.predictor()?;
    let missing = predictor
        .bundle()
        .schema
        .missing_features(|column| table.headers.iter().any(|header| header == column));
    if !missing.is_empty() {
        return Err(RetrofitError::MissingFeatures(missing).into());
    }

    info!(file = %file_name, buildings = table.len(), "Running predictions on uploaded file");
    predict_rows(predictor, &table.rows, started).map(Json)
}

/// Validate rows one by one, then predict the valid ones in a single batch
fn predict_rows(
    predictor: &Predictor,
    rows: &[InputRow],
    started: Instant,
) -> Result<BatchPredictionOutput, ApiError> {
    let mut failed = 0;
    let mut valid = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        match predictor.prepare(std::slice::from_ref(row)) {
            Ok(_) => valid.push(index),
            Err(err) if err.is_client_error() => {
                warn!(row = index, error = %err, "Failed to predict for building");
                failed += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut predictions = Vec::with_capacity(valid.len());
    if !valid.is_empty() {
        let batch: Vec<InputRow> = valid.iter().map(|&index| rows[index].clone()).collect();
        let model_started = Instant::now();
        let predicted = predictor.predict(&batch)?;
        let per_row_ms = elapsed_ms(model_started) / batch.len() as f64;
        let model_used = predictor.bundle().model_label();

        for (&index, predicted) in valid.iter().zip(&predicted) {
            if !predicted.result.is_finite() {
                warn!(row = index, "Model returned a non-finite prediction");
                failed += 1;
                continue;
            }
            predictions.push(PredictionOutput::new(
                index,
                &rows[index],
                predicted.result,
                &model_used,
                per_row_ms,
            ));
        }
    }

    Ok(BatchPredictionOutput {
        successful_predictions: predictions.len(),
        predictions,
        total_buildings: rows.len(),
        failed_predictions: failed,
        total_processing_time_ms: elapsed_ms(started),
    })
}

/// Sample input file, or a header-only template derived from the schema
pub async fn download_template(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let template = &state.config.template;

    let table = if template.path.exists() {
        Table::read_path(&template.path)
            .map_err(|err| ApiError::internal(format!("Error creating template: {err}")))?
            .head(template.sample_rows)
    } else if let Some(predictor) = &state.predictor {
        let mut headers = predictor.bundle().schema.feature_columns.clone();
        headers.extend(TEMPLATE_TARGET_COLUMNS.iter().map(|column| column.to_string()));
        Table {
            headers,
            rows: Vec::new(),
        }
    } else {
        return Err(ApiError::not_found(format!(
            "Template file not found at: {}",
            template.path.display()
        )));
    };

    let mut body = Vec::new();
    table
        .write_csv(&mut body)
        .map_err(|err| ApiError::internal(format!("Error creating template: {err}")))?;

    let disposition = format!("attachment; filename={TEMPLATE_FILE_NAME}");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct ModelsInfoResponse {
    models_directory: String,
    total_models: usize,
    model_files: Vec<String>,
    status: &'static str,
    loaded: ArtifactFiles,
    version: Option<String>,
    model_used: String,
    n_features: usize,
    n_targets: usize,
    num_trees: usize,
    supported_models: BTreeMap<&'static str, Vec<&'static str>>,
}

pub async fn models_info(
    State(state): State<SharedState>,
) -> Result<Json<ModelsInfoResponse>, ApiError> {
    let predictor = state
        .predictor
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Models not loaded"))?;
    let bundle = predictor.bundle();

    let model_files = list_artifact_files(&state.models_dir)
        .map_err(|err| ApiError::internal(format!("failed to list model files: {err}")))?;

    Ok(Json(ModelsInfoResponse {
        models_directory: state.models_dir.display().to_string(),
        total_models: model_files.len(),
        status: if model_files.is_empty() {
            "No models found"
        } else {
            "Models available"
        },
        model_files,
        loaded: bundle.files.clone(),
        version: bundle.version.clone(),
        model_used: bundle.model_label(),
        n_features: bundle.model.n_features,
        n_targets: bundle.model.n_outputs(),
        num_trees: bundle.model.num_trees(),
        supported_models: supported_models(),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    service: &'static str,
    status: &'static str,
    models_available: bool,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_error: Option<String>,
}

pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let loaded = state.models_loaded();
    Json(StatusResponse {
        service: "retrofit_prediction",
        status: if loaded {
            "operational"
        } else {
            "models_not_loaded"
        },
        models_available: loaded,
        timestamp: timestamp(),
        load_error: state.load_error.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    cpu_usage_percent: f32,
    memory_total_gb: f64,
    memory_available_gb: f64,
    memory_used_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    models_loaded: bool,
    uptime_secs: u64,
    system_info: Option<SystemInfo>,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let system_info = match tokio::task::spawn_blocking(sample_system_info).await {
        Ok(info) => Some(info),
        Err(err) => {
            warn!("Failed to sample system info: {}", err);
            None
        }
    };

    let loaded = state.models_loaded();
    Json(HealthResponse {
        status: if loaded { "healthy" } else { "models_not_loaded" },
        timestamp: timestamp(),
        version: retrofit_core::VERSION,
        models_loaded: loaded,
        uptime_secs: state.uptime_seconds(),
        system_info,
    })
}

fn sample_system_info() -> SystemInfo {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu();
    std::thread::sleep(std::time::Duration::from_millis(CPU_SAMPLE_INTERVAL_MS));
    sys.refresh_cpu();

    let total = sys.total_memory() as f64;
    let available = sys.available_memory() as f64;
    let used_percent = if total > 0.0 {
        (total - available) / total * 100.0
    } else {
        0.0
    };

    SystemInfo {
        cpu_usage_percent: sys.global_cpu_info().cpu_usage(),
        memory_total_gb: round2(total / GB),
        memory_available_gb: round2(available / GB),
        memory_used_percent: round2(used_percent),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
