//! Storage module for the persisted scanner layout
//!
//! Two artifacts live under the scanner's root directory:
//! - `ExcelFiles/`: one append-only record table per dataset per day
//! - `ProgramFiles/names.txt`: the operator-editable list of dataset names

pub mod names;
pub mod table;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use names::NamesRegistry;
pub use table::{RecordStore, RecordStoreConfig, RecordTable};

/// Directory/file I/O failures while touching the persisted layout.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Recursive directory creation failed.
    #[error("could not create directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An existing table could not be opened or parsed.
    #[error("could not read table {path:?}")]
    ReadTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The rewritten table could not be written, synced, or renamed into
    /// place. The previous table contents are still intact on disk.
    #[error("could not persist table {path:?}")]
    PersistTable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dataset-names file could not be read or initialized.
    #[error("could not load dataset names from {path:?}")]
    LoadNames {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
