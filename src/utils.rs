use std::{
    env,
    path::{Path, PathBuf},
};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::error::DownloadError;

async fn download_file(url: &str, path: &Path) -> Result<(), DownloadError> {
    tracing::info!(url, path = %path.display(), "downloading model artifact");

    let mut header_map = HeaderMap::new();
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value =
            HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| DownloadError::Token)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let request_error = |source| DownloadError::Request {
        url: url.to_string(),
        source,
    };

    let response = reqwest::Client::new()
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(request_error)?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(request_error)?;

    let write_error = |source| DownloadError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    // Only a complete artifact may appear at `path`.
    let partial = partial_path(path);
    let written = match tokio::fs::write(&partial, &bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(write_error(err));
    }

    tracing::info!(bytes = bytes.len(), "model artifact written");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Fetches the model artifact when it is missing and a source URL is known.
/// Without a URL a missing artifact is left for the loader to report.
pub async fn ensure_model_exists(model_path: &Path, model_url: Option<&str>) -> Result<(), DownloadError> {
    if model_path.exists() {
        return Ok(());
    }

    match model_url {
        Some(url) => download_file(url, model_path).await,
        None => {
            tracing::warn!(path = %model_path.display(), "model artifact missing and MODEL_URL not set");
            Ok(())
        }
    }
}
