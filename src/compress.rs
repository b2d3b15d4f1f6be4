//! gzip the finished dump next to itself.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::{write::GzEncoder, Compression};

use crate::error::{BackupError, Result};

/// `backup.sql` -> `backup.sql.gz`
pub fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Writes a gzip copy of `path` to `path.gz` and returns the new path.
///
/// The original file is left in place. The destination is created before the
/// source is read, so an unwritable destination fails without consuming any
/// input. A partially written `.gz` is not removed on a copy error.
pub fn compress_backup(path: &Path) -> Result<PathBuf> {
    let source = File::open(path)?;
    let mut source = BufReader::new(source);

    let gz = gz_path(path);
    let dest = File::create(&gz)?;

    let mut encoder = GzEncoder::new(BufWriter::new(dest), Compression::default());
    io::copy(&mut source, &mut encoder).map_err(BackupError::Compression)?;
    encoder
        .finish()
        .and_then(|mut w| w.flush())
        .map_err(BackupError::Compression)?;

    tracing::info!("Backup compressed successfully: {}", gz.display());
    Ok(gz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn gz_path_appends_suffix() {
        assert_eq!(
            gz_path(Path::new("/backups/backup_1.sql")),
            PathBuf::from("/backups/backup_1.sql.gz")
        );
    }

    #[test]
    fn compressed_output_decodes_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.sql");
        let content: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let gz = compress_backup(&path).unwrap();
        assert_eq!(gz, dir.path().join("backup.sql.gz"));
        assert!(path.exists());

        let mut decoded = Vec::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, content);
    }

    #[test]
    fn missing_input_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sql");

        let err = compress_backup(&path).unwrap_err();
        assert!(matches!(err, BackupError::Io(_)));
        assert!(!gz_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn read_failure_keeps_the_io_error_as_source() {
        let dir = tempfile::tempdir().unwrap();
        // opening a directory succeeds, reading from it does not
        let path = dir.path().join("dump.sql");
        std::fs::create_dir(&path).unwrap();

        let err = compress_backup(&path).unwrap_err();
        assert!(matches!(err, BackupError::Compression(_)));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<io::Error>().is_some());
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert!(chain.starts_with("error compressing backup file: "));
    }

    #[test]
    fn unwritable_destination_leaves_input_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.sql");
        std::fs::write(&path, b"select 1;\n").unwrap();
        // a directory in the way cannot be opened as a file, even by root
        std::fs::create_dir(gz_path(&path)).unwrap();

        let err = compress_backup(&path).unwrap_err();
        assert!(matches!(err, BackupError::Io(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"select 1;\n");
        assert!(gz_path(&path).is_dir());
    }
}
