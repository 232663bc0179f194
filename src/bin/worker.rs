use quality_cert::{
    app_state::{issuance_worker, Stores},
    config::AppConfig,
    db, describe_metrics,
    services::{issuance::IssuanceWorker, notifier::build_notifier, provider::build_provider},
};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting credential issuance worker");

    let config = AppConfig::from_env()?;
    describe_metrics();

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    let provider = build_provider(&config)?;
    let notifier = build_notifier(config.notification_url.as_deref());
    let stores = Stores::postgres(db_pool);
    let worker = issuance_worker(&config, &stores, provider, notifier);

    tracing::info!(
        provider_mode = %config.provider_mode,
        poll_interval_ms = config.worker_poll_interval_ms,
        "Worker ready, starting issuance loop"
    );

    run(&worker, config.worker_poll_interval()).await;
    Ok(())
}

/// Drain the queue forever. Errors here are storage failures; job failures
/// are recorded on the job itself.
async fn run(worker: &IssuanceWorker, poll_interval: std::time::Duration) {
    loop {
        match worker.process_next().await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(poll_interval).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}
