//! Watermark state persisted between runs
//!
//! The pipeline keeps exactly one value across runs: the modification
//! timestamp up to which source changes have already been synchronized.
//! An absent value is valid and means "no run has completed yet", which
//! makes the next extraction a full one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Wire format of the stored watermark, e.g. `2024-01-02 03:04:05.123456+00`
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f+00";

/// Result type for watermark store operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Error types for the watermark store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("watermark io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid watermark {value:?}: {source}")]
    Invalid {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Timestamp marking the boundary between already-processed and
/// not-yet-processed source changes.
///
/// Stored and parsed in the fixed [`WATERMARK_FORMAT`]. The in-memory
/// value is truncated to microseconds so a round-trip through the store
/// yields an identical watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// Current time, used to advance the watermark after a successful run
    pub fn now() -> Self {
        let now = Utc::now();
        Self::from_datetime(now)
    }

    /// Build a watermark from an arbitrary timestamp, truncating to
    /// microsecond precision
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        let truncated = DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts);
        Watermark(truncated)
    }

    /// The timestamp bound into incremental queries
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parse a stored watermark value
    pub fn parse(value: &str) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), WATERMARK_FORMAT).map_err(
            |source| StateError::Invalid {
                value: value.trim().to_string(),
                source,
            },
        )?;
        Ok(Watermark(naive.and_utc()))
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(WATERMARK_FORMAT))
    }
}

impl std::str::FromStr for Watermark {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Watermark::parse(s)
    }
}

/// One durable read/write slot holding the pipeline watermark.
///
/// `read` returning `Ok(None)` is the "no watermark" state; the driver
/// responds with a full extraction. Implementations must survive process
/// restarts.
pub trait WatermarkStore: Send + Sync {
    /// The stored watermark, or `None` if no value has ever been written
    fn read(&self) -> Result<Option<Watermark>>;

    /// Overwrite the slot with a new watermark
    fn write(&self, watermark: &Watermark) -> Result<()>;
}

/// Watermark slot backed by a single file
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn read(&self) -> Result<Option<Watermark>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::Io(e)),
        };

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            // a zero-length file can be left behind by a crash before the
            // first write completed; same meaning as no file at all
            return Ok(None);
        }

        Watermark::parse(trimmed).map(Some)
    }

    fn write(&self, watermark: &Watermark) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // write-then-rename so a crash mid-write never leaves a torn value
        let tmp = self.temp_path();
        fs::write(&tmp, watermark.to_string())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_in(dir: &tempfile::TempDir) -> FileWatermarkStore {
        FileWatermarkStore::new(dir.path().join("watermark.txt"))
    }

    #[test]
    fn formats_in_the_fixed_wire_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::microseconds(123456);
        let watermark = Watermark::from_datetime(ts);
        assert_eq!(watermark.to_string(), "2024-01-02 03:04:05.123456+00");
    }

    #[test]
    fn parses_what_it_formats() {
        let watermark = Watermark::parse("2024-01-01 00:00:00.000000+00").unwrap();
        assert_eq!(watermark.to_string(), "2024-01-01 00:00:00.000000+00");

        let now = Watermark::now();
        let round_tripped = Watermark::parse(&now.to_string()).unwrap();
        assert_eq!(round_tripped, now);
    }

    #[test]
    fn rejects_values_outside_the_format() {
        assert!(Watermark::parse("2024-01-01T00:00:00Z").is_err());
        assert!(Watermark::parse("not a timestamp").is_err());
        assert!(Watermark::parse("2024-01-01 00:00:00").is_err());
    }

    #[test]
    fn watermarks_order_chronologically() {
        let earlier = Watermark::parse("2024-01-01 00:00:00.000000+00").unwrap();
        let later = Watermark::parse("2024-01-02 00:00:00.000000+00").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn read_reports_absent_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn read_reports_absent_for_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "").unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let watermark = Watermark::parse("2024-06-15 12:30:00.500000+00").unwrap();
        store.write(&watermark).unwrap();

        assert_eq!(store.read().unwrap(), Some(watermark));
    }

    #[test]
    fn write_overwrites_the_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = Watermark::parse("2024-01-01 00:00:00.000000+00").unwrap();
        let second = Watermark::parse("2024-02-01 00:00:00.000000+00").unwrap();
        store.write(&first).unwrap();
        store.write(&second).unwrap();

        assert_eq!(store.read().unwrap(), Some(second));
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWatermarkStore::new(dir.path().join("state").join("watermark.txt"));

        store.write(&Watermark::now()).unwrap();
        assert!(store.read().unwrap().is_some());
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.write(&Watermark::now()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("watermark.txt")]);
    }

    #[test]
    fn read_surfaces_io_errors_other_than_absence() {
        let dir = tempfile::tempdir().unwrap();
        // the watermark path is a directory, so reading it fails with
        // something other than NotFound
        let store = FileWatermarkStore::new(dir.path());
        assert!(matches!(store.read(), Err(StateError::Io(_))));
    }

    #[test]
    fn read_surfaces_corrupt_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "corrupted beyond repair").unwrap();
        assert!(matches!(store.read(), Err(StateError::Invalid { .. })));
    }

    #[test]
    fn store_is_usable_as_a_trait_object() {
        let dir = tempfile::tempdir().unwrap();
        let store: Box<dyn WatermarkStore> = Box::new(store_in(&dir));
        assert!(store.read().unwrap().is_none());
    }
}
