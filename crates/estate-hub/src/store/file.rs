use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::{StorageError, Table, TableBackend};

/// Stores each table as `<dir>/<table>.json`, replacing it through a temporary sibling file
/// and a rename so readers never observe a half-written table.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    sequence: AtomicU64,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.root.join(table.file_name())
    }

    fn temp_path(&self, table: Table) -> PathBuf {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}-{}.tmp",
            table.name(),
            std::process::id(),
            n
        ))
    }
}

impl TableBackend for FileBackend {
    fn load(&self, table: Table) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.table_path(table)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                table: table.name(),
                source,
            }),
        }
    }

    fn replace(&self, table: Table, contents: &[u8]) -> Result<(), StorageError> {
        let write_error = |source| StorageError::Write {
            table: table.name(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(write_error)?;
        let temp = self.temp_path(table);
        let staged = File::create(&temp)
            .and_then(|mut file| {
                file.write_all(contents)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp, self.table_path(table)));

        if let Err(source) = staged {
            let _ = fs::remove_file(&temp);
            return Err(write_error(source));
        }

        debug!(table = table.name(), bytes = contents.len(), "table replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        assert!(backend.load(Table::Users).expect("load").is_none());
    }

    #[test]
    fn replace_creates_directory_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path().join("nested"));

        backend.replace(Table::Listings, b"[]").expect("first write");
        backend.replace(Table::Listings, b"[{\"id\":1}]").expect("second write");

        let loaded = backend.load(Table::Listings).expect("load").expect("present");
        assert_eq!(loaded, b"[{\"id\":1}]");
        let entries: Vec<_> = fs::read_dir(backend.root())
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["listings.json".to_string()]);
    }

    #[test]
    fn failed_replace_keeps_previous_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path());
        backend.replace(Table::Listings, b"[1]").expect("seed");

        // The table file itself used as a data directory cannot be created.
        let blocked = FileBackend::new(dir.path().join("listings.json"));
        let err = blocked
            .replace(Table::Listings, b"[2]")
            .expect_err("cannot write beneath a file");
        assert!(matches!(err, StorageError::Write { table: "listings", .. }));

        let loaded = backend.load(Table::Listings).expect("load").expect("present");
        assert_eq!(loaded, b"[1]");
    }
}
