//! Error types for the prediction service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const NO_FILE_MESSAGE: &str = "Aucun fichier envoyé";

/// Errors raised while serving a single `/predict` request.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// The request carried no `file` part.
    #[error("{}", NO_FILE_MESSAGE)]
    MissingFile,

    /// The multipart stream could not be read.
    #[error("{0}")]
    Upload(String),

    /// The uploaded bytes are not a supported image.
    #[error("{0}")]
    Decode(#[from] image::ImageError),

    /// The model rejected the input or produced an unusable output.
    #[error("{0}")]
    Inference(String),

    /// The blocking worker running preprocessing and inference died.
    #[error("{0}")]
    Worker(String),
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::MissingFile | PredictError::Upload(_) => StatusCode::BAD_REQUEST,
            PredictError::Decode(_) | PredictError::Inference(_) | PredictError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "prediction failed");
        } else {
            tracing::warn!(error = %self, "rejected prediction request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors raised while loading the model artifact at startup.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to import graph from '{path}': {detail}")]
    Import { path: String, detail: String },

    #[error("failed to open session: {0}")]
    Session(String),

    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("invalid bind address '{0}'")]
    BindAddr(String),
}

/// Errors raised while fetching a missing model artifact.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid GITHUB_TOKEN header value")]
    Token,

    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
