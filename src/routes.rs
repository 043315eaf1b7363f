use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::PredictError;
use crate::model::Classifier;
use crate::prediction::{probability_from_output, Prediction};
use crate::preprocess::preprocess;

const FILE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    classifier: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        AppState { classifier }
    }
}

pub fn create_app(state: AppState, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, PredictError> {
    // Anything that isn't a multipart form simply has no file in it.
    let mut multipart = multipart.map_err(|_| PredictError::MissingFile)?;
    let image_data = read_file_field(&mut multipart).await?;

    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classify(classifier.as_ref(), &image_data))
        .await
        .map_err(|err| PredictError::Worker(err.to_string()))??;

    tracing::info!(
        probability = prediction.prediction,
        label = ?prediction.classe,
        "prediction served"
    );
    Ok(Json(prediction))
}

/// Returns the bytes of the first file part named `file`. Plain form fields
/// with that name are not uploads and are skipped. Any failure reading the
/// stream, including a body over the size limit, is reported as `Upload`.
async fn read_file_field(multipart: &mut Multipart) -> Result<Vec<u8>, PredictError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PredictError::Upload(err.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) && field.file_name().is_some() {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| PredictError::Upload(err.to_string()))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(PredictError::MissingFile)
}

pub fn classify(classifier: &dyn Classifier, image_data: &[u8]) -> Result<Prediction, PredictError> {
    let batch = preprocess(image_data)?;
    let output = classifier.forward(&batch)?;
    let probability = probability_from_output(&output)?;
    Ok(Prediction::from_probability(probability))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}
