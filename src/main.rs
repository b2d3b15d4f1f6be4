use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pg_backup::config::{self, BackupArgs, BackupConfig};
use pg_backup::job::BackupJob;
use pg_backup::scheduler::BackupScheduler;
use pg_backup::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = config::load_env_file(Path::new("."));
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pg_backup=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pg-backup");
    match env_file {
        Ok(path) => tracing::info!("loaded env vars from {}", path.display()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(".env file does not exist. Skip loading env vars.")
        }
        Err(e) => tracing::warn!("error loading the .env file: {}. Skip loading env vars.", e),
    }

    let config = BackupConfig::from(BackupArgs::parse());

    let job = Arc::new(BackupJob::new(&config));
    job.conn().summary();

    if config.once {
        let report = job.run().await;
        tracing::info!("backup finished: {:?}", report);
        return Ok(());
    }

    let scheduler = BackupScheduler::new(config.schedule, job)
        .await
        .context("could not create the backup scheduler")?;
    tracing::info!("backup job id: {}", scheduler.job_id());

    let token = CancellationToken::new();
    shutdown::cancel_on_signal(token.clone());

    scheduler.run(token).await?;

    Ok(())
}
