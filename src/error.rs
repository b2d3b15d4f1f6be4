use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Our crate's top level error type.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("io error `{0}`")]
    Io(#[from] std::io::Error),
    #[error("error compressing backup file")]
    Compression(#[source] std::io::Error),
    #[error("scheduler error `{0}`")]
    Scheduler(String),
    #[error("scheduler is {0}")]
    InvalidState(&'static str),
}

impl From<JobSchedulerError> for BackupError {
    fn from(err: JobSchedulerError) -> BackupError {
        BackupError::Scheduler(err.to_string())
    }
}

pub type Result<T, E = BackupError> = std::result::Result<T, E>;
