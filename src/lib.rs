pub mod compress;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod shutdown;
pub mod timestamp;
