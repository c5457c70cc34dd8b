//! Partition Index
//!
//! Walks the storage tree on every call. Nothing is cached: the batch
//! writer adds partitions while the process runs, and a listing must
//! reflect the tree as it is now.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::partition::{
    DatasetKind, FileDescriptor, parse_partition_date, parse_partition_key, segment_value,
};

/// Failure to read the top of a dataset directory.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// The directory exists but could not be listed.
    #[error("failed to list {path}: {source}")]
    Io {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Filesystem view of the partitioned series store.
#[derive(Debug, Clone)]
pub struct PartitionIndex {
    root: PathBuf,
    extension: String,
}

impl PartitionIndex {
    /// Index files with `extension` under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: DatasetKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// List data files of one dataset, sorted by path.
    ///
    /// `symbol` must equal a `symbol=` segment exactly. Files whose path
    /// carries no date are kept regardless of `start`/`end`. A missing
    /// dataset directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Io`] if the dataset directory exists but
    /// cannot be read. Subdirectories that vanish or fail mid-walk are
    /// skipped.
    pub fn list_files(
        &self,
        kind: DatasetKind,
        symbol: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<FileDescriptor>, PartitionError> {
        let dir = self.kind_dir(kind);
        let Some(entries) = read_dir_if_exists(&dir)? else {
            return Ok(Vec::new());
        };

        let mut paths = Vec::new();
        for entry in entries.flatten() {
            self.collect_files(&entry, &mut paths);
        }
        paths.sort();

        let files = paths
            .into_iter()
            .map(|path| {
                let key = parse_partition_key(path.strip_prefix(&dir).unwrap_or(&path));
                FileDescriptor { path, kind, key }
            })
            .filter(|file| symbol.is_none_or(|s| file.key.has_symbol(s)))
            .filter(|file| file.key.within(start, end))
            .collect();

        Ok(files)
    }

    /// Symlinked directories are not descended into; symlinked files count
    /// when their target is a regular file.
    fn collect_files(&self, entry: &fs::DirEntry, files: &mut Vec<PathBuf>) {
        let Ok(file_type) = entry.file_type() else {
            return;
        };
        let path = entry.path();

        if file_type.is_dir() {
            match fs::read_dir(&path) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        self.collect_files(&entry, files);
                    }
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable directory");
                }
            }
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && self.is_data_file(&path)
        {
            files.push(path);
        }
    }

    fn is_data_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') || name.starts_with('_') {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// Symbols with a `symbol=` directory in any dataset.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Io`] if a dataset directory cannot be read.
    pub fn list_symbols(&self) -> Result<BTreeSet<String>, PartitionError> {
        let mut symbols = BTreeSet::new();
        for kind in DatasetKind::ALL {
            for (symbol, _) in self.symbol_dirs(kind)? {
                symbols.insert(symbol);
            }
        }
        Ok(symbols)
    }

    /// Dates with a `date=` directory in any dataset, optionally for one
    /// symbol only.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::Io`] if a dataset directory cannot be read.
    pub fn list_dates(&self, symbol: Option<&str>) -> Result<BTreeSet<NaiveDate>, PartitionError> {
        let mut dates = BTreeSet::new();
        for kind in DatasetKind::ALL {
            for (name, dir) in self.symbol_dirs(kind)? {
                if symbol.is_some_and(|s| s != name) {
                    continue;
                }
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                dates.extend(
                    entries
                        .flatten()
                        .filter(|entry| entry.path().is_dir())
                        .filter_map(|entry| {
                            let name = entry.file_name();
                            segment_value(name.to_str()?, "date").and_then(parse_partition_date)
                        }),
                );
            }
        }
        Ok(dates)
    }

    fn symbol_dirs(&self, kind: DatasetKind) -> Result<Vec<(String, PathBuf)>, PartitionError> {
        let Some(entries) = read_dir_if_exists(&self.kind_dir(kind))? else {
            return Ok(Vec::new());
        };

        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let symbol = segment_value(name, "symbol").filter(|s| !s.is_empty())?;
                Some((symbol.to_string(), path.clone()))
            })
            .collect())
    }
}

fn read_dir_if_exists(dir: &Path) -> Result<Option<fs::ReadDir>, PartitionError> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PartitionError::Io {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
