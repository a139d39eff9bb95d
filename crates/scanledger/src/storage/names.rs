//! Dataset-name registry
//!
//! `ProgramFiles/names.txt` under the scanner root lists the dataset names
//! offered to the operator, one per line. A missing file is synthesized
//! with a two-entry default so a freshly provisioned device is usable
//! immediately.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use super::StorageError;

/// Names written when no registry file exists yet.
pub const DEFAULT_NAMES: [&str; 2] = ["file_1", "file_2"];

const PROGRAM_DIR: &str = "ProgramFiles";
const NAMES_FILE: &str = "names.txt";

/// Loads the operator-editable list of dataset names.
pub struct NamesRegistry {
    path: PathBuf,
}

impl NamesRegistry {
    /// Registry under the scanner root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            path: root.into().join(PROGRAM_DIR).join(NAMES_FILE),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read the dataset names, creating the file with [`DEFAULT_NAMES`]
    /// when it does not exist. Blank lines are skipped.
    pub fn load_or_init(&self) -> Result<Vec<String>, StorageError> {
        let load_names = |source| StorageError::LoadNames {
            path: self.path.clone(),
            source,
        };

        if !self.path.exists() {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&self.path, DEFAULT_NAMES.join("\n")).map_err(load_names)?;
            info!(path = ?self.path, "names file missing, wrote default list");
        }

        let contents = fs::read_to_string(&self.path).map_err(load_names)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_synthesized_with_defaults() {
        let dir = tempdir().unwrap();
        let registry = NamesRegistry::new(dir.path());

        let names = registry.load_or_init().unwrap();

        assert_eq!(names, vec!["file_1", "file_2"]);
        assert!(dir.path().join("ProgramFiles/names.txt").exists());
    }

    #[test]
    fn existing_file_is_read_as_is() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ProgramFiles")).unwrap();
        fs::write(
            dir.path().join("ProgramFiles/names.txt"),
            "receiving\n\n  inventory  \n",
        )
        .unwrap();

        let names = NamesRegistry::new(dir.path()).load_or_init().unwrap();

        assert_eq!(names, vec!["receiving", "inventory"]);
    }

    #[test]
    fn second_load_reads_the_synthesized_file() {
        let dir = tempdir().unwrap();
        let registry = NamesRegistry::new(dir.path());
        registry.load_or_init().unwrap();

        let names = registry.load_or_init().unwrap();
        assert_eq!(names, vec!["file_1", "file_2"]);
    }
}
