/// loudnorm-batch - two-pass loudness normalization of a configured file list
mod config;

use crate::config::BatchConfig;
use loudnorm::{normalize_batch, Corrector, FfmpegRunner};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loudnorm=info,loudnorm_batch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BatchConfig::load()?;
    config.validate()?;

    info!(
        files = config.batch.inputs.len(),
        target_lufs = config.batch.target_lufs,
        output_folder = ?config.batch.output_folder,
        "Starting loudness normalization"
    );

    let settings = Arc::new(config.normalizer.clone());
    let cancel = CancellationToken::new();
    let runner =
        Arc::new(FfmpegRunner::from_settings(&settings).with_cancellation(cancel.clone()));

    // Ctrl+C stops the running tool and skips the remaining files
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            cancel.cancel();
        }
    });

    let corrector = Corrector::new(runner, settings);
    let report = normalize_batch(
        &corrector,
        &config.batch.inputs,
        config.batch.target_lufs,
        &config.batch.output_folder,
    )
    .await;

    for outcome in report.reports().iter().filter(|r| !r.success) {
        error!(
            file = ?outcome.file,
            stage = ?outcome.stage,
            error = outcome.error.as_deref().unwrap_or_default(),
            "File was not normalized"
        );
    }

    if let Some(report_path) = &config.batch.report_path {
        tokio::fs::write(report_path, report.to_json()?).await?;
        info!(path = ?report_path, "Wrote outcome report");
    }

    if report.failed() > 0 || !report.skipped.is_empty() {
        anyhow::bail!(
            "{} of {} files failed, {} skipped",
            report.failed(),
            config.batch.inputs.len(),
            report.skipped.len()
        );
    }

    Ok(())
}
