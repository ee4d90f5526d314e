// Durable cron checkpoint: the modification time of a marker file.
//
// The marker's mtime is the instant through which the service is known to
// have applied its daily reset. File content is never read.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no cron checkpoint at `{}`", .path.display())]
    NotFound { path: PathBuf },

    #[error("cron checkpoint I/O error at `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CheckpointError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path: path.to_path_buf() }
        } else {
            Self::Io { path: path.to_path_buf(), source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Marker file whose mtime records the last known reset.
///
/// No locking: concurrent invocations against the same path may race.
#[derive(Debug, Clone)]
pub struct CronCheckpoint {
    path: PathBuf,
}

impl CronCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<DateTime<Utc>, CheckpointError> {
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|error| CheckpointError::io(&self.path, error))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Set the checkpoint to `ts`, creating the marker and its parent
    /// directories if needed.
    pub fn write(&self, ts: DateTime<Utc>) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| CheckpointError::io(parent, error))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| CheckpointError::io(&self.path, error))?;

        let stamp = FileTime::from_system_time(ts.into());
        filetime::set_file_times(&self.path, stamp, stamp)
            .map_err(|error| CheckpointError::io(&self.path, error))?;
        debug!(path = %self.path.display(), checkpoint = %ts, "wrote cron checkpoint");
        Ok(())
    }

    /// Move the checkpoint forward to `ts`. An existing later checkpoint is
    /// kept, so the recorded instant never decreases. Returns the
    /// checkpoint in effect afterwards.
    pub fn advance(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, CheckpointError> {
        match self.read() {
            Ok(current) if current >= ts => {
                debug!(%current, requested = %ts, "cron checkpoint already ahead");
                Ok(current)
            }
            Ok(_) => self.write(ts).map(|()| ts),
            Err(error) if error.is_not_found() => self.write(ts).map(|()| ts),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn sample_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn missing_marker_reads_as_not_found() {
        let tmp = tempdir().unwrap();
        let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));

        assert!(!checkpoint.exists());
        let error = checkpoint.read().expect_err("missing marker should not read");
        assert!(error.is_not_found());
    }

    #[test]
    fn write_creates_parent_directories_and_sets_mtime() {
        let tmp = tempdir().unwrap();
        let checkpoint = CronCheckpoint::new(tmp.path().join("cache").join("habits").join("cron"));

        checkpoint.write(sample_ts()).expect("write should succeed");

        assert!(checkpoint.exists());
        assert_eq!(checkpoint.read().unwrap(), sample_ts());
    }

    #[test]
    fn repeated_write_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cron");
        let checkpoint = CronCheckpoint::new(&path);

        checkpoint.write(sample_ts()).unwrap();
        let first = (checkpoint.read().unwrap(), fs::read(&path).unwrap());
        checkpoint.write(sample_ts()).unwrap();
        let second = (checkpoint.read().unwrap(), fs::read(&path).unwrap());

        assert_eq!(first, second);
    }

    #[test]
    fn write_can_move_backwards_but_advance_cannot() {
        let tmp = tempdir().unwrap();
        let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
        let later = sample_ts();
        let earlier = later - Duration::hours(5);

        checkpoint.write(later).unwrap();
        assert_eq!(checkpoint.advance(earlier).unwrap(), later);
        assert_eq!(checkpoint.read().unwrap(), later);

        checkpoint.write(earlier).unwrap();
        assert_eq!(checkpoint.read().unwrap(), earlier);
    }

    #[test]
    fn advance_creates_missing_marker() {
        let tmp = tempdir().unwrap();
        let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));

        assert_eq!(checkpoint.advance(sample_ts()).unwrap(), sample_ts());
        assert_eq!(checkpoint.read().unwrap(), sample_ts());
    }

    #[test]
    fn subsecond_precision_survives_round_trip() {
        let tmp = tempdir().unwrap();
        let checkpoint = CronCheckpoint::new(tmp.path().join("cron"));
        let ts = sample_ts() + Duration::milliseconds(250);

        checkpoint.write(ts).unwrap();
        assert_eq!(checkpoint.read().unwrap(), ts);
    }
}
