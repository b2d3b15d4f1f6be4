use std::path::{Path, PathBuf};

#[derive(clap::Parser, Clone)]
#[clap(name = "pg-backup", version, about)]
pub struct BackupArgs {
    #[clap(long, env, value_parser = clap::value_parser!(u32).range(0..=23))]
    pub backup_hour: u32,
    #[clap(long, env, value_parser = clap::value_parser!(u32).range(0..=59))]
    pub backup_minute: u32,
    #[clap(long, env, default_value = "")]
    pub postgres_host: String,
    #[clap(long, env, default_value = "")]
    pub postgres_port: String,
    #[clap(long, env, default_value = "")]
    pub postgres_user: String,
    #[clap(long, env, default_value = "")]
    pub postgres_db: String,
    /// Only ever read from the environment, never from the command line.
    #[clap(skip = std::env::var("PGPASSWORD").unwrap_or_default())]
    pub pgpassword: String,
    #[clap(long, env, default_value = "/backups")]
    pub backup_dir: PathBuf,
    #[clap(long, env = "PG_DUMP_PATH", default_value = "pg_dump")]
    pub pg_dump: PathBuf,
    /// Run the backup once and exit instead of scheduling it
    #[clap(long, env = "BACKUP_ONCE")]
    pub once: bool,
}

/// Loads `dir/.env` into the environment. Parent directories are not searched.
pub fn load_env_file(dir: &Path) -> dotenv::Result<PathBuf> {
    let path = dir.join(".env");
    dotenv::from_path(&path)?;
    Ok(path)
}

/// Daily trigger time, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub hour: u32,
    pub minute: u32,
}

impl Schedule {
    /// Six-field cron expression firing once a day at `hour:minute:00`.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02} UTC", self.hour, self.minute)
    }
}

#[derive(Clone, Default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub db_name: String,
    pub password: String,
}

#[derive(Clone)]
pub struct BackupConfig {
    pub schedule: Schedule,
    pub database: DatabaseConfig,
    pub backup_dir: PathBuf,
    pub dump_program: PathBuf,
    pub once: bool,
}

impl From<BackupArgs> for BackupConfig {
    fn from(args: BackupArgs) -> Self {
        BackupConfig {
            schedule: Schedule {
                hour: args.backup_hour,
                minute: args.backup_minute,
            },
            database: DatabaseConfig {
                host: args.postgres_host,
                port: args.postgres_port,
                user: args.postgres_user,
                db_name: args.postgres_db,
                password: args.pgpassword,
            },
            backup_dir: args.backup_dir,
            dump_program: args.pg_dump,
            once: args.once,
        }
    }
}
