//! Daily trigger for the backup job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Schedule;
use crate::error::{BackupError, Result};
use crate::job::BackupJob;
use crate::shutdown::shutdown_signal;

/// How long `run` waits for an in-flight backup after shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, job registered, not ticking yet.
    Idle,
    Running,
    Stopped,
}

/// Owns the cron scheduler and the single backup job registered on it.
pub struct BackupScheduler {
    scheduler: JobScheduler,
    job: Arc<BackupJob>,
    schedule: Schedule,
    job_id: Uuid,
    state: SchedulerState,
    drain_timeout: Duration,
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("schedule", &self.schedule)
            .field("job_id", &self.job_id)
            .field("state", &self.state)
            .field("drain_timeout", &self.drain_timeout)
            .finish()
    }
}

impl BackupScheduler {
    /// Creates the scheduler and registers `job` to run daily at `schedule`.
    pub async fn new(schedule: Schedule, job: Arc<BackupJob>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        let cron = schedule.cron_expression();
        let task_job = Arc::clone(&job);
        let task = CronJob::new_async(cron.as_str(), move |_uuid, _lock| {
            let job = Arc::clone(&task_job);
            Box::pin(async move {
                let report = job.run().await;
                tracing::debug!("backup run finished: {:?}", report);
            })
        })?;

        let job_id = scheduler.add(task).await?;
        tracing::info!("Registered: backup `{}` (daily at {})", cron, schedule);

        Ok(Self {
            scheduler,
            job,
            schedule,
            job_id,
            state: SchedulerState::Idle,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// When the backup job fires next, if the scheduler knows.
    pub async fn next_run(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.scheduler.next_tick_for_job(self.job_id).await?)
    }

    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SchedulerState::Idle => {}
            SchedulerState::Running => return Err(BackupError::InvalidState("already running")),
            SchedulerState::Stopped => return Err(BackupError::InvalidState("stopped")),
        }
        self.scheduler.start().await?;
        self.state = SchedulerState::Running;
        tracing::info!("Backup scheduler started");
        Ok(())
    }

    /// Stops the scheduler. Does nothing if it is already stopped.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == SchedulerState::Stopped {
            return Ok(());
        }
        self.state = SchedulerState::Stopped;
        self.scheduler.shutdown().await?;
        tracing::info!("Backup scheduler shut down");
        Ok(())
    }

    /// Starts the scheduler and keeps it running until `token` is cancelled.
    ///
    /// After shutdown a backup that is already running gets up to the drain
    /// timeout to finish, so its dump is compressed and removed. A second
    /// signal stops the wait.
    pub async fn run(mut self, token: CancellationToken) -> Result<()> {
        self.start().await?;

        match self.next_run().await {
            Ok(Some(next)) => tracing::info!("Next backup at {}", next),
            Ok(None) => {}
            Err(e) => tracing::warn!("could not compute next backup time: {}", e),
        }

        token.cancelled().await;
        tracing::info!("Shutting down the backup system.");

        if let Err(e) = self.shutdown().await {
            tracing::error!("{}", e);
        }

        tokio::select! {
            idle = self.job.wait_idle(self.drain_timeout) => {
                if !idle {
                    tracing::warn!(
                        "backup still running after {:?}, exiting",
                        self.drain_timeout
                    );
                }
            }
            _ = shutdown_signal() => {
                tracing::warn!("not waiting for the running backup");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackupConfig, DatabaseConfig};
    use chrono::Timelike;

    fn job() -> Arc<BackupJob> {
        let dir = std::env::temp_dir();
        Arc::new(BackupJob::new(&BackupConfig {
            schedule: Schedule { hour: 2, minute: 30 },
            database: DatabaseConfig::default(),
            backup_dir: dir,
            dump_program: "/nonexistent/pg_dump".into(),
            once: false,
        }))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registers_one_daily_job() {
        let schedule = Schedule { hour: 2, minute: 30 };
        let mut scheduler = BackupScheduler::new(schedule, job()).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.schedule().cron_expression(), "0 30 2 * * *");

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let next = scheduler.next_run().await.unwrap().unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (2, 30, 0));
        assert!(next > Utc::now());

        scheduler.shutdown().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_invalid_transitions() {
        let schedule = Schedule { hour: 0, minute: 0 };
        let mut scheduler = BackupScheduler::new(schedule, job()).await.unwrap();

        scheduler.start().await.unwrap();
        assert!(matches!(
            scheduler.start().await,
            Err(BackupError::InvalidState(_))
        ));

        scheduler.shutdown().await.unwrap();
        scheduler.shutdown().await.unwrap();
        assert!(matches!(
            scheduler.start().await,
            Err(BackupError::InvalidState(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_returns_once_cancelled() {
        let schedule = Schedule { hour: 4, minute: 15 };
        let scheduler = BackupScheduler::new(schedule, job()).await.unwrap();
        let token = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(token.clone()));
        token.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
