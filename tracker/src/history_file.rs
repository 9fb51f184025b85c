use crate::history::HistoryStore;
use chrono::NaiveDate;
use subreddit_stats_config::is_valid_subreddit_name;
use std::{
    fs::{
        self,
        File,
    },
    io::{
        self,
        BufRead as _,
        BufReader,
        BufWriter,
        Write as _,
    },
    num::ParseIntError,
    path::{
        Path,
        PathBuf,
    },
};

const FILE_PREFIX: &str = "r-";
const FILE_SUFFIX: &str = "-subscribers.txt";
const BACKUP_EXTENSION: &str = "bak";

#[derive(Debug, thiserror::Error)]
pub enum HistoryFileError {
    #[error("history file {path:?} could not be accessed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line} of history file {path:?} has an invalid subscriber count {value:?}: {source}")]
    InvalidCount {
        path: PathBuf,
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Result of reading a history file.
#[derive(Debug, Clone)]
pub struct LoadedHistory {
    pub history: HistoryStore,
    /// Every line read, including the ones that were skipped.
    pub records_read: usize,
    /// Count from the last accepted line in file order.
    pub last_subscribers: Option<i64>,
}

/// The on-disk history of one subreddit: `<date>,<count>` lines in ascending date
/// order plus a `.bak` sibling holding the previous generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_subreddit(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(Self::file_name(name)))
    }

    pub fn file_name(name: &str) -> String {
        format!("{FILE_PREFIX}{name}{FILE_SUFFIX}")
    }

    /// Extracts `<name>` from `r-<name>-subscribers.txt`, keeping its case. Names that
    /// cannot be used in an API request are rejected.
    pub fn subreddit_from_file_name(file_name: &str) -> Option<&str> {
        file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)
            .filter(|name| is_valid_subreddit_name(name))
    }

    /// Name of the history file a directory entry belongs to: the entry itself, or the
    /// file it backs up.
    pub fn live_file_name(file_name: &str) -> &str {
        file_name
            .strip_suffix(BACKUP_EXTENSION)
            .and_then(|name| name.strip_suffix('.'))
            .unwrap_or(file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, BACKUP_EXTENSION)
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.exists() || self.backup_path().exists()
    }

    /// Absolute form of the path for display; falls back to the path as configured.
    pub fn absolute_path(&self) -> PathBuf {
        std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    /// Reads the history file into a store bounded to `max_len` entries.
    ///
    /// Lines that do not have exactly two fields or whose date does not parse are
    /// skipped with a warning. A count that is not an integer fails the whole load.
    /// If only the backup exists, it is copied back into place first.
    pub fn load(&self, max_len: usize) -> Result<LoadedHistory, HistoryFileError> {
        self.restore_backup_if_missing()?;

        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let mut loaded = LoadedHistory {
            history: HistoryStore::new(max_len),
            records_read: 0,
            last_subscribers: None,
        };

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| self.io_error(source))?;
            loaded.records_read += 1;

            let mut fields = line.split(',').map(str::trim).collect::<Vec<_>>();
            while fields.last() == Some(&"") {
                fields.pop();
            }
            let [date, count] = fields.as_slice() else {
                warn!(path = ?self.path, line = index + 1, "Badly formatted history record: {line:?}");
                continue;
            };

            let date = match date.parse::<NaiveDate>() {
                Ok(date) => date,
                Err(err) => {
                    warn!(path = ?self.path, line = index + 1, "Unable to parse history date {date:?}: {err}");
                    continue;
                }
            };
            let count = count.parse::<i64>().map_err(|source| HistoryFileError::InvalidCount {
                path: self.path.clone(),
                line: index + 1,
                value: count.to_string(),
                source,
            })?;

            loaded.history.upsert(date, count);
            loaded.last_subscribers = Some(count);
        }

        debug!(path = ?self.path, records = loaded.records_read, kept = loaded.history.len(), "History loaded");
        Ok(loaded)
    }

    /// Writes the complete history, keeping the previous file as `.bak`.
    ///
    /// The new content is written to a temporary sibling and synced before any
    /// existing file is touched. The previous generation is copied to the backup and
    /// the temporary file then replaces the current one in a single rename, so the
    /// current file exists at every step. Returns the number of records written.
    pub fn save(&self, history: &HistoryStore) -> Result<usize, HistoryFileError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }

        let temp_path = self.temp_path();
        let written = match write_records(&temp_path, history) {
            Ok(written) => written,
            Err(source) => {
                let _ = fs::remove_file(&temp_path);
                return Err(self.io_error(source));
            }
        };

        if self.path.exists() {
            let backup_path = self.backup_path();
            debug!(path = ?self.path, backup = ?backup_path, "Copying history file to backup");
            fs::copy(&self.path, &backup_path).map_err(|source| self.io_error(source))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|source| self.io_error(source))?;

        info!(path = ?self.path, records = written, "History file written");
        Ok(written)
    }

    fn restore_backup_if_missing(&self) -> Result<(), HistoryFileError> {
        let backup_path = self.backup_path();
        if !self.path.exists() && backup_path.exists() {
            warn!(path = ?self.path, backup = ?backup_path, "History file missing, restoring it from the backup");
            fs::copy(&backup_path, &self.path).map_err(|source| self.io_error(source))?;
        }
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> HistoryFileError {
        HistoryFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn write_records(path: &Path, history: &HistoryStore) -> io::Result<usize> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for (date, count) in history {
        writeln!(writer, "{date},{count}")?;
        written += 1;
    }
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    Ok(written)
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 8, 23).unwrap() + chrono::Days::new(n)
    }

    fn history_of(values: &[(u64, i64)]) -> HistoryStore {
        let mut history = HistoryStore::new(100);
        for (n, value) in values {
            history.upsert(day(*n), *value);
        }
        history
    }

    #[test]
    fn file_names() {
        assert_eq!(HistoryFile::file_name("Arduino"), "r-Arduino-subscribers.txt");
        assert_eq!(
            HistoryFile::subreddit_from_file_name("r-Arduino-subscribers.txt"),
            Some("Arduino")
        );
        assert_eq!(
            HistoryFile::subreddit_from_file_name("r-my-sub-subscribers.txt"),
            Some("my-sub")
        );
        assert_eq!(HistoryFile::subreddit_from_file_name("r--subscribers.txt"), None);
        assert_eq!(HistoryFile::subreddit_from_file_name("r-arduino-subscribers.txt.bak"), None);
        assert_eq!(HistoryFile::subreddit_from_file_name("arduino.txt"), None);
        assert_eq!(HistoryFile::subreddit_from_file_name("r-foo?x-subscribers.txt"), None);
        assert_eq!(HistoryFile::subreddit_from_file_name("r-foo#x-subscribers.txt"), None);
        assert_eq!(HistoryFile::subreddit_from_file_name("r-a b-subscribers.txt"), None);

        assert_eq!(
            HistoryFile::live_file_name("r-esp32-subscribers.txt.bak"),
            "r-esp32-subscribers.txt"
        );
        assert_eq!(
            HistoryFile::live_file_name("r-esp32-subscribers.txt"),
            "r-esp32-subscribers.txt"
        );
        assert_eq!(
            HistoryFile::live_file_name("r-esp32-subscribers.txt.tmp"),
            "r-esp32-subscribers.txt.tmp"
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        let history = history_of(&[(2, 110), (0, 100), (1, -1)]);

        assert_eq!(file.save(&history).unwrap(), 3);
        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "2022-08-23,100\n2022-08-24,-1\n2022-08-25,110\n"
        );

        let loaded = file.load(100).unwrap();
        assert_eq!(loaded.history.iter().collect::<Vec<_>>(), history.iter().collect::<Vec<_>>());
        assert_eq!(loaded.records_read, 3);
        assert_eq!(loaded.last_subscribers, Some(110));
        assert!(!dir.path().join("r-arduino-subscribers.txt.tmp").exists());
    }

    #[test]
    fn second_save_keeps_exactly_one_backup_of_the_first() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");

        file.save(&history_of(&[(0, 100), (1, 105)])).unwrap();
        let first = fs::read_to_string(file.path()).unwrap();
        file.save(&history_of(&[(0, 100), (1, 105), (2, 110)])).unwrap();

        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".bak"))
            .count();
        assert_eq!(backups, 1);
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), first);
    }

    #[test]
    fn backup_holds_previous_generation() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");

        file.save(&history_of(&[(0, 100)])).unwrap();
        let first = fs::read_to_string(file.path()).unwrap();
        file.save(&history_of(&[(0, 100), (1, 105)])).unwrap();

        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), first);
        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "2022-08-23,100\n2022-08-24,105\n"
        );
    }

    #[test]
    fn rotation_replaces_a_stale_temp_file_and_keeps_the_current_one() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        file.save(&history_of(&[(0, 100)])).unwrap();
        // left behind by a rotation that never finished
        fs::write(dir.path().join("r-arduino-subscribers.txt.tmp"), "2022-08-23,1\n").unwrap();

        file.save(&history_of(&[(0, 100), (1, 105)])).unwrap();

        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "2022-08-23,100\n2022-08-24,105\n"
        );
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), "2022-08-23,100\n");
        assert!(!dir.path().join("r-arduino-subscribers.txt.tmp").exists());
    }

    #[test]
    fn malformed_lines_are_skipped_but_counted() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        fs::write(file.path(), "2022-08-23,100\n2022-08-24\n").unwrap();

        let loaded = file.load(100).unwrap();
        assert_eq!(loaded.history.iter().collect::<Vec<_>>(), vec![(day(0), 100)]);
        assert_eq!(loaded.records_read, 2);
        assert_eq!(loaded.last_subscribers, Some(100));
    }

    #[test]
    fn unparsable_dates_and_extra_fields_are_skipped() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        fs::write(
            file.path(),
            "yesterday,90\n2022-08-23,100\n2022-08-24,105,extra\n\n2022-08-25,110,\n",
        )
        .unwrap();

        let loaded = file.load(100).unwrap();
        assert_eq!(
            loaded.history.iter().collect::<Vec<_>>(),
            vec![(day(0), 100), (day(2), 110)]
        );
        assert_eq!(loaded.records_read, 5);
        assert_eq!(loaded.last_subscribers, Some(110));
    }

    #[test]
    fn invalid_count_fails_the_load() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        fs::write(file.path(), "2022-08-23,100\n2022-08-24,lots\n").unwrap();

        let err = file.load(100).unwrap_err();
        assert!(
            matches!(err, HistoryFileError::InvalidCount { line: 2, ref value, .. } if value == "lots"),
            "{err}"
        );
    }

    #[test]
    fn load_respects_the_bound() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        fs::write(file.path(), "2022-08-23,100\n2022-08-24,105\n2022-08-25,110\n").unwrap();

        let loaded = file.load(2).unwrap();
        assert_eq!(loaded.history.iter().collect::<Vec<_>>(), vec![(day(1), 105), (day(2), 110)]);
        assert_eq!(loaded.records_read, 3);
    }

    #[test]
    fn missing_file_is_restored_from_backup() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        fs::write(file.backup_path(), "2022-08-23,100\n").unwrap();
        assert!(file.exists());

        let loaded = file.load(100).unwrap();
        assert_eq!(loaded.last_subscribers, Some(100));
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "2022-08-23,100\n");
        assert!(file.backup_path().exists());
    }

    #[test]
    fn missing_file_without_backup_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        assert!(!file.exists());
        assert!(matches!(file.load(100), Err(HistoryFileError::Io { .. })));
    }

    #[test]
    fn failed_write_keeps_the_current_file() {
        let dir = TempDir::new().unwrap();
        let file = HistoryFile::for_subreddit(dir.path(), "arduino");
        file.save(&history_of(&[(0, 100)])).unwrap();

        // a directory in place of the temporary file makes the write fail
        fs::create_dir(dir.path().join("r-arduino-subscribers.txt.tmp")).unwrap();
        assert!(file.save(&history_of(&[(0, 100), (1, 105)])).is_err());

        assert_eq!(fs::read_to_string(file.path()).unwrap(), "2022-08-23,100\n");
        assert!(!file.backup_path().exists());
    }
}
