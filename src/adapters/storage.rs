use crate::core::change_feed::{Subscription, DEFAULT_FEED_CAPACITY};
use crate::core::selection::decode_snapshot;
use crate::domain::model::{Origin, SelectionChange};
use crate::domain::ports::{ChangeFeed, DurableStorage};
use crate::utils::error::Result;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// One JSON file per key under a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
    last_written: Arc<Mutex<HashMap<String, String>>>,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            last_written: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn written(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.last_written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True unless `payload` is what this handle itself last wrote under `key`.
    /// A foreign write also forgets our own record, so a later write of the
    /// same bytes by someone else is not mistaken for ours.
    pub(crate) fn take_foreign_write(&self, key: &str, payload: &str) -> bool {
        let mut written = self.written();
        match written.get(key) {
            Some(own) if own == payload => false,
            _ => {
                written.remove(key);
                true
            }
        }
    }
}

impl DurableStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, payload: &str) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;

        let full_path = self.path_for(key);
        let tmp_path = self.base_path.join(format!(".{}.json.tmp", key));

        self.written().insert(key.to_string(), payload.to_string());
        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &full_path)?;

        tracing::debug!("Wrote {} bytes to {}", payload.len(), full_path.display());
        Ok(())
    }
}

struct MemoryShared {
    entries: Mutex<HashMap<String, String>>,
    signals: broadcast::Sender<SelectionChange>,
    next_handle: AtomicU64,
}

/// In-memory storage. Handles made with [`MemoryStorage::connect`] share the
/// same entries and behave like separate processes: a write signals every
/// handle except the writer.
#[derive(Clone)]
pub struct MemoryStorage {
    handle: u64,
    shared: Arc<MemoryShared>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(DEFAULT_FEED_CAPACITY);
        Self {
            handle: 0,
            shared: Arc::new(MemoryShared {
                entries: Mutex::new(HashMap::new()),
                signals,
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    pub fn connect(&self) -> Self {
        Self {
            handle: self.shared.next_handle.fetch_add(1, Ordering::Relaxed),
            shared: Arc::clone(&self.shared),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, payload: &str) -> Result<()> {
        self.entries().insert(key.to_string(), payload.to_string());

        let change = SelectionChange {
            origin: Origin::Storage(self.handle),
            key: key.to_string(),
            items: decode_snapshot(payload),
        };
        // No other handle listening is fine.
        let _ = self.shared.signals.send(change);
        Ok(())
    }
}

impl ChangeFeed for MemoryStorage {
    /// The write itself is the signal.
    fn publish(&self, _change: &SelectionChange) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.shared.signals.subscribe()).mute(Origin::Storage(self.handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"));

        assert_eq!(storage.load("compare-items").unwrap(), None);
        storage.save("compare-items", r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(
            storage.load("compare-items").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
        assert!(storage.path_for("compare-items").exists());
        assert!(!temp_dir.path().join("nested/.compare-items.json.tmp").exists());
    }

    #[test]
    fn file_storage_recognizes_own_writes() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.save("compare-items", "[]").unwrap();

        assert!(!storage.take_foreign_write("compare-items", "[]"));
        assert!(storage.take_foreign_write("compare-items", r#"[{"id":"2"}]"#));
        // After a foreign write, even our old payload counts as foreign.
        assert!(storage.take_foreign_write("compare-items", "[]"));
    }

    #[test]
    fn memory_handles_share_entries() {
        let first = MemoryStorage::new();
        let second = first.connect();
        first.save("k", "[]").unwrap();
        assert_eq!(second.load("k").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn memory_write_signals_other_handles_only() {
        let first = MemoryStorage::new();
        let second = first.connect();
        let mut first_sub = first.subscribe();
        let mut second_sub = second.subscribe();

        first.save("k", r#"[{"id":"1"}]"#).unwrap();

        assert!(first_sub.try_next().is_none());
        let change = second_sub.try_next().unwrap();
        assert_eq!(change.origin, Origin::Storage(0));
        assert_eq!(change.items.len(), 1);
    }
}
