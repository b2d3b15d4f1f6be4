use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::compress::compress_backup;
use crate::config::BackupConfig;
use crate::db::{BackupStatus, DbConn};
use crate::timestamp::{backup_file_name, timestamp};

#[derive(Debug)]
pub enum JobOutcome {
    /// The `.sql.gz` exists; `cleanup_error` is set if the `.sql` could not be removed.
    Archived {
        archive: PathBuf,
        cleanup_error: Option<String>,
    },
    /// Compression failed, the uncompressed dump (if any) was kept.
    ///
    /// Compression is attempted even after a failed dump, since `pg_dump` may
    /// have written a partial file. When it wrote nothing, `reason` is the
    /// missing `source_file` error and [`JobReport::dump`] holds the real cause.
    CompressionFailed { source_file: PathBuf, reason: String },
    /// A previous run was still in progress.
    Skipped,
}

#[derive(Debug)]
pub struct JobReport {
    pub dump: Option<BackupStatus>,
    pub outcome: JobOutcome,
}

/// Dump, compress, remove the dump.
pub struct BackupJob {
    conn: DbConn,
    backup_dir: PathBuf,
    dump_program: PathBuf,
    running: Mutex<()>,
}

impl BackupJob {
    pub fn new(config: &BackupConfig) -> Self {
        BackupJob {
            conn: DbConn::new(&config.database),
            backup_dir: config.backup_dir.clone(),
            dump_program: config.dump_program.clone(),
            running: Mutex::new(()),
        }
    }

    pub fn conn(&self) -> &DbConn {
        &self.conn
    }

    /// Waits up to `timeout` for an in-flight run to finish. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.running.lock())
            .await
            .is_ok()
    }

    pub async fn run(&self) -> JobReport {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("previous backup still running, skipping this trigger");
            return JobReport {
                dump: None,
                outcome: JobOutcome::Skipped,
            };
        };

        let file_name = backup_file_name(&timestamp());
        let source_file = self.backup_dir.join(&file_name);

        let dump = self
            .conn
            .backup(&self.backup_dir, &file_name, &self.dump_program)
            .await;

        let path = source_file.clone();
        let compressed = tokio::task::spawn_blocking(move || compress_backup(&path))
            .await
            .map_err(|e| e.to_string())
            .and_then(|res| res.map_err(|e| format!("{:#}", anyhow::Error::from(e))));

        let archive = match compressed {
            Ok(archive) => archive,
            Err(reason) => {
                tracing::error!("compression error : {}", reason);
                return JobReport {
                    dump: Some(dump),
                    outcome: JobOutcome::CompressionFailed {
                        source_file,
                        reason,
                    },
                };
            }
        };

        let cleanup_error = match tokio::fs::remove_file(&source_file).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("error removing the backup file {} : {}", file_name, e);
                Some(e.to_string())
            }
        };

        JobReport {
            dump: Some(dump),
            outcome: JobOutcome::Archived {
                archive,
                cleanup_error,
            },
        }
    }
}
