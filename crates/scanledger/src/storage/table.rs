//! Append-only record tables
//!
//! One CSV table per dataset per calendar day, named
//! `{dataset}_{yyyy-MM-dd}.csv`. The first record is a header carrying the
//! dataset name and creation date; every later record is one committed
//! scan value. Appending rewrites the whole table to a temporary file and
//! renames it into place, so a reader (or a crash mid-append) never
//! observes a truncated table.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use super::StorageError;

/// Configuration for the record store.
#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    /// Root directory the scanner owns on the storage volume
    pub root: PathBuf,
    /// Subdirectory holding the record tables. The default matches the
    /// layout contract existing deployments read from.
    pub tables_dir: String,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/scanledger"),
            tables_dir: "ExcelFiles".to_string(),
        }
    }
}

impl RecordStoreConfig {
    /// Store rooted at `root` with the default table subdirectory.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}

/// A record table read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTable {
    /// Header fields: dataset name and creation date
    pub header: Vec<String>,
    /// One committed value per row, in commit order
    pub values: Vec<String>,
}

/// Durably appends scanned values to per-dataset-per-day tables.
pub struct RecordStore {
    config: RecordStoreConfig,
}

impl RecordStore {
    pub fn new(config: RecordStoreConfig) -> Self {
        Self { config }
    }

    /// Path of the table for `dataset` on `date`.
    pub fn table_path(&self, dataset: &str, date: NaiveDate) -> PathBuf {
        self.config
            .root
            .join(&self.config.tables_dir)
            .join(format!("{}_{}.csv", dataset, date.format("%Y-%m-%d")))
    }

    /// Append one scanned value to the table for `dataset` on the date of
    /// `timestamp`, creating the table and its header if absent.
    ///
    /// Every commit lands on a row strictly after all existing rows; no
    /// row is ever overwritten. A failure leaves the previous table
    /// contents intact and is NOT retried here; the caller surfaces it
    /// and the operator rescans.
    pub async fn append(
        &self,
        dataset: &str,
        value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let config = self.config.clone();
        let path = self.table_path(dataset, timestamp.date_naive());
        let dataset = dataset.to_string();
        let value = value.to_string();

        let join_path = path.clone();
        tokio::task::spawn_blocking(move || append_sync(&config, &path, &dataset, &value, timestamp))
            .await
            .map_err(|e| StorageError::PersistTable {
                path: join_path,
                source: io::Error::other(e),
            })?
    }

    /// Read a table back. Intended for displays and tests; the append
    /// path never goes through this.
    pub fn read_table(&self, dataset: &str, date: NaiveDate) -> Result<RecordTable, StorageError> {
        let path = self.table_path(dataset, date);
        let records = read_records(&path)?;
        let mut iter = records.into_iter();
        let header = iter.next().unwrap_or_default();
        let values = iter
            .map(|rec| rec.into_iter().next().unwrap_or_default())
            .collect();
        Ok(RecordTable { header, values })
    }
}

fn append_sync(
    config: &RecordStoreConfig,
    path: &Path,
    dataset: &str,
    value: &str,
    timestamp: DateTime<Utc>,
) -> Result<(), StorageError> {
    let dir = config.root.join(&config.tables_dir);
    fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    // A missing table (or a zero-row partial file) gets a fresh header;
    // existing records are preserved verbatim and only ever appended to.
    let mut records = if path.exists() {
        read_records(path)?
    } else {
        Vec::new()
    };
    let created = records.is_empty();
    if created {
        records.push(vec![
            dataset.to_string(),
            timestamp.date_naive().format("%Y-%m-%d").to_string(),
        ]);
    }
    records.push(vec![value.to_string()]);

    persist_records(path, &records)?;

    if created {
        info!(table = ?path, dataset, "created record table");
    }
    debug!(table = ?path, value, row = records.len() - 1, "appended record");
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<Vec<String>>, StorageError> {
    let read_err = |source| StorageError::ReadTable {
        path: path.to_path_buf(),
        source,
    };

    // flexible: the header has two fields, data rows one
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)
        .map_err(read_err)?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

/// Write the full record set to a sibling temp file, sync it, and rename
/// it over the table path.
fn persist_records(path: &Path, records: &[Vec<String>]) -> Result<(), StorageError> {
    let persist = |source| StorageError::PersistTable {
        path: path.to_path_buf(),
        source,
    };

    let tmp = path.with_extension("csv.tmp");
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record).map_err(io::Error::other).map_err(persist)?;
    }
    let encoded = writer
        .into_inner()
        .map_err(|e| persist(io::Error::other(e.error().to_string())))?;

    let result = (|| -> io::Result<()> {
        let file = File::create(&tmp)?;
        let mut out = BufWriter::new(file);
        out.write_all(&encoded)?;
        out.flush()?;
        out.get_ref().sync_data()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(persist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn store(root: &Path) -> RecordStore {
        RecordStore::new(RecordStoreConfig::rooted_at(root))
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_on_absence_writes_header_and_first_row() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.append("file_1", "ABC123", at(2024, 5, 1)).await.unwrap();

        let path = store.table_path("file_1", at(2024, 5, 1).date_naive());
        assert!(path.ends_with("ExcelFiles/file_1_2024-05-01.csv"));
        let table = store.read_table("file_1", at(2024, 5, 1).date_naive()).unwrap();
        assert_eq!(table.header, vec!["file_1", "2024-05-01"]);
        assert_eq!(table.values, vec!["ABC123"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_append_leaves_header_and_first_row_untouched() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.append("file_1", "ABC123", at(2024, 5, 1)).await.unwrap();
        store.append("file_1", "XYZ999", at(2024, 5, 1)).await.unwrap();

        let table = store.read_table("file_1", at(2024, 5, 1).date_naive()).unwrap();
        assert_eq!(table.header, vec!["file_1", "2024-05-01"]);
        assert_eq!(table.values, vec!["ABC123", "XYZ999"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn appends_preserve_commit_order() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        for value in ["a", "b", "c", "d"] {
            store.append("items", value, at(2024, 6, 2)).await.unwrap();
        }

        let table = store.read_table("items", at(2024, 6, 2).date_naive()).unwrap();
        assert_eq!(table.values, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn datasets_and_days_get_separate_tables() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.append("alpha", "1", at(2024, 5, 1)).await.unwrap();
        store.append("beta", "2", at(2024, 5, 1)).await.unwrap();
        store.append("alpha", "3", at(2024, 5, 2)).await.unwrap();

        let day1 = store.read_table("alpha", at(2024, 5, 1).date_naive()).unwrap();
        let day2 = store.read_table("alpha", at(2024, 5, 2).date_naive()).unwrap();
        let other = store.read_table("beta", at(2024, 5, 1).date_naive()).unwrap();
        assert_eq!(day1.values, vec!["1"]);
        assert_eq!(day2.values, vec!["3"]);
        assert_eq!(other.values, vec!["2"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_partial_file_gets_a_fresh_header() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.table_path("file_1", at(2024, 5, 1).date_naive());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();

        store.append("file_1", "ABC123", at(2024, 5, 1)).await.unwrap();

        let table = store.read_table("file_1", at(2024, 5, 1).date_naive()).unwrap();
        assert_eq!(table.header, vec!["file_1", "2024-05-01"]);
        assert_eq!(table.values, vec!["ABC123"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn directory_creation_failure_is_a_storage_error() {
        let dir = tempdir().unwrap();
        // Occupy the tables path with a plain file so create_dir_all fails
        fs::write(dir.path().join("ExcelFiles"), b"not a directory").unwrap();
        let store = store(dir.path());

        let err = store.append("file_1", "v", at(2024, 5, 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_temp_file_is_left_behind() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.append("file_1", "v", at(2024, 5, 1)).await.unwrap();

        let tables = dir.path().join("ExcelFiles");
        let names: Vec<String> = fs::read_dir(&tables)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["file_1_2024-05-01.csv"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn values_with_commas_round_trip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.append("file_1", "A,B \"quoted\"", at(2024, 5, 1)).await.unwrap();

        let table = store.read_table("file_1", at(2024, 5, 1).date_naive()).unwrap();
        assert_eq!(table.values, vec!["A,B \"quoted\""]);
    }
}
