use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod model;
mod prediction;
mod preprocess;
mod routes;
mod utils;

use config::Config;
use model::TensorflowClassifier;
use routes::{create_app, AppState};
use utils::ensure_model_exists;

const DEFAULT_LOG_FILTER: &str = "infection_classifier_rs=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let addr = config.bind_addr()?;

    ensure_model_exists(&config.model_path, config.model_url.as_deref())
        .await
        .context("failed to fetch model artifact")?;

    let classifier = TensorflowClassifier::load(&config.model_path, &config.input_op, &config.output_op)
        .context("failed to load model")?;
    let state = AppState::new(Arc::new(classifier));

    let app = create_app(state, config.body_limit_bytes);

    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
