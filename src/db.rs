//! Connection parameters and the `pg_dump` call.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use tokio::process::Command;

use crate::config::DatabaseConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort result of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    Succeeded,
    Failed(String),
}

impl BackupStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BackupStatus::Succeeded)
    }
}

#[derive(Clone)]
pub struct DbConn {
    host: String,
    port: String,
    user: String,
    db_name: String,
    password: String,
}

impl fmt::Debug for DbConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConn")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("db_name", &self.db_name)
            .field("password", &mask(&self.password))
            .finish()
    }
}

fn mask(password: &str) -> String {
    "*".repeat(password.chars().count())
}

impl DbConn {
    pub fn new(config: &DatabaseConfig) -> Self {
        DbConn {
            host: config.host.clone(),
            port: config.port.clone(),
            user: config.user.clone(),
            db_name: config.db_name.clone(),
            password: config.password.clone(),
        }
    }

    pub fn summary(&self) {
        tracing::info!("Host: {}", self.host);
        tracing::info!("Port: {}", self.port);
        tracing::info!("User: {}", self.user);
        tracing::info!("Password: {}", mask(&self.password));
        tracing::info!("DB Name: {}", self.db_name);
    }

    fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        let mut opts = PgConnectOptions::new().ssl_mode(PgSslMode::Disable);
        if !self.host.is_empty() {
            opts = opts.host(&self.host);
        }
        if !self.port.is_empty() {
            let port: u16 = self
                .port
                .parse()
                .with_context(|| format!("invalid port `{}`", self.port))?;
            opts = opts.port(port);
        }
        if !self.user.is_empty() {
            opts = opts.username(&self.user);
        }
        if !self.password.is_empty() {
            opts = opts.password(&self.password);
        }
        if !self.db_name.is_empty() {
            opts = opts.database(&self.db_name);
        }
        Ok(opts)
    }

    /// Opens a connection and closes it again.
    pub async fn probe(&self) -> anyhow::Result<()> {
        let opts = self.connect_options()?;
        let conn = tokio::time::timeout(PROBE_TIMEOUT, opts.connect())
            .await
            .context("timed out connecting to the database")??;
        conn.close().await?;
        Ok(())
    }

    /// Dumps the database to `dir/file_name` with `dump_program`.
    ///
    /// Never returns an error: a failed probe is only logged, a failed dump is
    /// logged and reported as [`BackupStatus::Failed`].
    pub async fn backup(
        &self,
        dir: &Path,
        file_name: &str,
        dump_program: &Path,
    ) -> BackupStatus {
        if let Err(e) = self.probe().await {
            tracing::error!("Error connecting to the database: {:#}", e);
        }

        let target = dir.join(file_name);
        // the password only ever lives in the child's environment
        let output = Command::new(dump_program)
            .env("PGPASSWORD", &self.password)
            .arg("-h")
            .arg(&self.host)
            .arg("-p")
            .arg(&self.port)
            .arg("-U")
            .arg(&self.user)
            .arg("-d")
            .arg(&self.db_name)
            .arg("-f")
            .arg(&target)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let reason = format!("failed to run {}: {}", dump_program.display(), e);
                tracing::error!("Error running pg_dump command: {}", reason);
                return BackupStatus::Failed(reason);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::info!("{}", stdout.trim_end());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("{}: {}", output.status, stderr.trim());
            tracing::error!("Error running pg_dump command: {}", reason);
            return BackupStatus::Failed(reason);
        }

        tracing::info!("Backup completed successfully: {}", target.display());
        BackupStatus::Succeeded
    }
}
