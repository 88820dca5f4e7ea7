use super::{ProcessRecord, StateStore};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

/// Records stored as `service-<name>.lid` files in one directory.
///
/// Writes go to a sibling temporary file that is renamed over the record, so
/// readers in other processes see either the old or the new record.
pub struct FileStateStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("service-{}.lid", name))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, name: &str) -> Result<ProcessRecord> {
        let path = self.record_path(name);
        match fs::read(&path) {
            Ok(bytes) => ProcessRecord::decode(&bytes, &path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::ProcessNotFound(name.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write(&self, name: &str, record: ProcessRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        let path = self.record_path(name);
        let tmp = self
            .dir
            .join(format!(".service-{}.lid.{}", name, std::process::id()));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(&tmp)?;
        file.write_all(&record.encode())?;
        file.flush()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }

        tracing::trace!(
            "Wrote {} pid={} to {}",
            record.status,
            record.pid,
            path.display()
        );
        Ok(())
    }

    fn location(&self, name: &str) -> Option<PathBuf> {
        Some(self.record_path(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ServiceStatus;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_missing_file_reads_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert_eq!(store.read("ghost").unwrap(), ProcessRecord::STOPPED);
        assert!(matches!(
            store.load("ghost"),
            Err(Error::ProcessNotFound(ref n)) if n == "ghost"
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let record = ProcessRecord::new(ServiceStatus::Running, 4242);

        store.write("api", record).unwrap();

        assert_eq!(store.read("api").unwrap(), record);
        let bytes = fs::read(dir.path().join("service-api.lid")).unwrap();
        assert_eq!(bytes, vec![3, 0x92, 0x10, 0, 0]);
    }

    #[test]
    fn test_write_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.write("api", ProcessRecord::STOPPED).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["service-api.lid".to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_distinct_from_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        fs::write(store.record_path("api"), b"garbage!").unwrap();

        let err = store.read("api").unwrap_err();
        assert!(matches!(err, Error::ProcessCorrupt { .. }));
    }

    #[test]
    fn test_permissions_honor_umask() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.write("api", ProcessRecord::STOPPED).unwrap();

        let mode = fs::metadata(store.record_path("api"))
            .unwrap()
            .permissions()
            .mode();
        // Never wider than 0666, and always readable by the owner.
        assert_eq!(mode & 0o111, 0);
        assert_ne!(mode & 0o400, 0);
    }
}
