use crate::adapters::storage::FileStorage;
use crate::core::change_feed::{Subscription, DEFAULT_FEED_CAPACITY};
use crate::core::selection::decode_snapshot;
use crate::domain::model::{Origin, SelectionChange};
use crate::domain::ports::{ChangeFeed, DurableStorage};
use crate::utils::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::fs;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Cross-process change feed for [`FileStorage`]: watches the key's file and
/// emits the snapshot whenever another process rewrites it. Writes made
/// through the same storage handle are not echoed back.
pub struct FileWatchFeed {
    tx: broadcast::Sender<SelectionChange>,
    _watcher: Mutex<RecommendedWatcher>,
}

impl FileWatchFeed {
    pub fn new(storage: &FileStorage, key: &str) -> Result<Self> {
        fs::create_dir_all(storage.base_path())?;

        let (tx, _) = broadcast::channel(DEFAULT_FEED_CAPACITY);
        let mut handler = WatchHandler {
            storage: storage.clone(),
            key: key.to_string(),
            file_name: format!("{}.json", key).into(),
            tx: tx.clone(),
            last_seen: None,
        };

        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<Event>| handler.handle(event))?;
        watcher.watch(storage.base_path(), RecursiveMode::NonRecursive)?;

        tracing::debug!(
            "Watching {} for selection changes",
            storage.path_for(key).display()
        );
        Ok(Self {
            tx,
            _watcher: Mutex::new(watcher),
        })
    }
}

impl ChangeFeed for FileWatchFeed {
    /// Writing the file is the signal, so there is nothing to send.
    fn publish(&self, _change: &SelectionChange) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }
}

struct WatchHandler {
    storage: FileStorage,
    key: String,
    file_name: OsString,
    tx: broadcast::Sender<SelectionChange>,
    last_seen: Option<String>,
}

impl WatchHandler {
    fn handle(&mut self, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Storage watcher error: {}", e);
                return;
            }
        };

        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        let touches_key = event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(self.file_name.as_os_str()));
        if !touches_key {
            return;
        }

        // Always re-read: one write usually fires several events.
        let payload = match self.storage.load(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => "[]".to_string(),
            Err(e) => {
                tracing::warn!("Could not read changed selection file: {}", e);
                return;
            }
        };

        if self.last_seen.as_deref() == Some(payload.as_str()) {
            return;
        }
        self.last_seen = Some(payload.clone());

        if !self.storage.take_foreign_write(&self.key, &payload) {
            return;
        }

        tracing::debug!("Selection file changed by another process");
        let change = SelectionChange {
            origin: Origin::External,
            key: self.key.clone(),
            items: decode_snapshot(&payload),
        };
        let _ = self.tx.send(change);
    }
}
