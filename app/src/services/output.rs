//! Output files: `AFFIX_<yyyyMMdd_HHmmss><ext>` in one directory.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use affix_engine::{OutputSink, SinkFactory};
use chrono::{Local, NaiveDateTime};

const FILE_PREFIX: &str = "AFFIX_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_SUFFIX: u32 = 999;

/// Creates timestamped output files, never overwriting an existing one.
#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    dir: PathBuf,
}

impl FileSinkFactory {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a sink named after `stamp`, adding `_1`, `_2`, ... on collision.
    pub fn create_at(&self, stamp: NaiveDateTime, extension: &str) -> io::Result<OutputSink> {
        fs::create_dir_all(&self.dir)?;
        let base = format!("{FILE_PREFIX}{}", stamp.format(TIMESTAMP_FORMAT));

        for attempt in 0..=MAX_SUFFIX {
            let name = if attempt == 0 {
                format!("{base}{extension}")
            } else {
                format!("{base}_{attempt}{extension}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), "Created output file");
                    return Ok(OutputSink::new(path, file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {base}{extension}"),
        ))
    }
}

impl SinkFactory for FileSinkFactory {
    fn create(&self, extension: &str) -> io::Result<OutputSink> {
        self.create_at(Local::now().naive_local(), extension)
    }

    fn discard(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "Removed partial output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_file_name_uses_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = FileSinkFactory::new(dir.path().join("PhotoAffix"));

        let sink = sinks.create_at(stamp(), ".png").unwrap();
        assert_eq!(
            sink.path.file_name().unwrap(),
            "AFFIX_20240309_140507.png"
        );
        assert!(sink.path.starts_with(sinks.dir()));
        assert!(sink.path.exists());
    }

    #[test]
    fn test_collisions_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = FileSinkFactory::new(dir.path().to_path_buf());

        let first = sinks.create_at(stamp(), ".jpg").unwrap();
        let second = sinks.create_at(stamp(), ".jpg").unwrap();
        assert_eq!(first.path.file_name().unwrap(), "AFFIX_20240309_140507.jpg");
        assert_eq!(
            second.path.file_name().unwrap(),
            "AFFIX_20240309_140507_1.jpg"
        );
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = FileSinkFactory::new(dir.path().to_path_buf());

        let OutputSink { path, mut writer } = sinks.create_at(stamp(), ".png").unwrap();
        writer.write_all(b"partial").unwrap();
        drop(writer);

        sinks.discard(&path);
        assert!(!path.exists());
        // Discarding twice is harmless.
        sinks.discard(&path);
    }
}
