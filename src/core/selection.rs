//! The comparison set: a small, deduplicated, durably persisted selection that
//! stays in step across every store instance sharing the same storage.
//!
//! Every mutation writes the whole snapshot under one storage key before
//! returning and then publishes it on each attached change feed. Snapshots
//! published by other instances are queued and adopted after the publisher's
//! call has returned, either by a dispatcher task or on the next access.

use crate::core::change_feed::Subscription;
use crate::domain::model::{CatalogRecord, Origin, SelectionChange, SelectionItem};
use crate::domain::ports::{ChangeFeed, DurableStorage};
use crate::utils::error::{CatalogError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_STORAGE_KEY: &str = "compare-items";
pub const DEFAULT_MAX_ITEMS: usize = 4;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    pub storage_key: String,
    pub max_items: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    /// The item has no usable identity; nothing happened.
    InvalidIdentity,
}

/// Decodes a stored snapshot. Anything unreadable counts as an empty set, and
/// individual entries that fail to decode are dropped.
pub fn decode_snapshot(payload: &str) -> Vec<SelectionItem> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Stored selection is unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };

    match value {
        serde_json::Value::Array(entries) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => {
            tracing::debug!("Stored selection is not a list, starting empty");
            Vec::new()
        }
    }
}

/// Drops entries without identity and duplicates, then caps the length.
fn sanitize(items: Vec<SelectionItem>, max_items: usize) -> Vec<SelectionItem> {
    let mut seen = HashSet::new();
    let mut clean: Vec<SelectionItem> = items
        .into_iter()
        .filter_map(|mut item| {
            let id = item.identity()?.to_string();
            if !seen.insert(id.clone()) {
                return None;
            }
            item.id = id;
            Some(item)
        })
        .collect();

    if clean.len() > max_items {
        tracing::warn!(
            "Selection snapshot holds {} items, keeping the first {}",
            clean.len(),
            max_items
        );
        clean.truncate(max_items);
    }
    clean
}

struct Inner {
    state: StoreState,
    items: Vec<SelectionItem>,
    subscriptions: Vec<Subscription>,
}

struct StoreCore {
    id: u64,
    config: SelectionConfig,
    storage: Arc<dyn DurableStorage>,
    feeds: Mutex<Vec<Arc<dyn ChangeFeed>>>,
    inner: Mutex<Inner>,
    view: watch::Sender<Vec<SelectionItem>>,
}

/// One view's handle on the comparison set.
///
/// Inside a Tokio runtime every attached feed gets a dispatcher task that
/// adopts incoming snapshots after the publisher's call has returned and
/// pushes them to [`SelectionStore::watch`] receivers. Without a runtime,
/// snapshots are adopted on the next read or mutation.
pub struct SelectionStore {
    core: Arc<StoreCore>,
    dispatchers: Vec<JoinHandle<()>>,
}

impl SelectionStore {
    pub fn new(config: SelectionConfig, storage: Arc<dyn DurableStorage>) -> Self {
        let (view, _) = watch::channel(Vec::new());
        Self {
            core: Arc::new(StoreCore {
                id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
                config,
                storage,
                feeds: Mutex::new(Vec::new()),
                inner: Mutex::new(Inner {
                    state: StoreState::Uninitialized,
                    items: Vec::new(),
                    subscriptions: Vec::new(),
                }),
                view,
            }),
            dispatchers: Vec::new(),
        }
    }

    /// Publishes every mutation on `feed` and adopts snapshots other instances publish there.
    pub fn with_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        let origin = self.origin();
        self.core
            .lock()
            .subscriptions
            .push(feed.subscribe().mute(origin));

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let wake = feed.subscribe().mute(origin);
            self.dispatchers
                .push(runtime.spawn(dispatch(Arc::downgrade(&self.core), wake)));
        }

        lock_feeds(&self.core.feeds).push(feed);
        self
    }

    pub fn origin(&self) -> Origin {
        Origin::Store(self.core.id)
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.core.config
    }

    pub fn state(&self) -> StoreState {
        self.core.lock().state
    }

    /// Loads the durable snapshot. Runs once; later calls do nothing.
    pub fn initialize(&self) {
        let mut inner = self.core.lock();
        self.core.ensure_ready(&mut inner);
    }

    /// Adopts any snapshots other instances have published since the last call.
    pub fn refresh(&self) {
        self.core.refresh();
    }

    pub fn items(&self) -> Vec<SelectionItem> {
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);
        inner.items.clone()
    }

    pub fn len(&self) -> usize {
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);
        inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.core.config.max_items
    }

    pub fn contains(&self, id: &str) -> bool {
        let id = id.trim();
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);
        inner.items.iter().any(|item| item.id == id)
    }

    /// Appends `item` unless it is already present or has no identity.
    /// A full set rejects the item with [`CatalogError::CapacityExceeded`].
    pub fn add(&self, mut item: SelectionItem) -> Result<AddOutcome> {
        let Some(id) = item.identity().map(str::to_string) else {
            return Ok(AddOutcome::InvalidIdentity);
        };

        let max_items = self.core.config.max_items;
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);

        if inner.items.iter().any(|existing| existing.id == id) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        if inner.items.len() >= max_items {
            tracing::debug!(id = %id, "Comparison set is full, rejecting");
            return Err(CatalogError::CapacityExceeded { max: max_items });
        }

        item.id = id;
        inner.items.push(item);
        self.core.commit(&inner.items);
        Ok(AddOutcome::Added)
    }

    pub fn add_record(&self, record: &CatalogRecord) -> Result<AddOutcome> {
        match SelectionItem::from_record(record) {
            Some(item) => self.add(item),
            None => Ok(AddOutcome::InvalidIdentity),
        }
    }

    /// Returns whether something was removed.
    pub fn remove(&self, id: &str) -> bool {
        let id = id.trim();
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);

        let before = inner.items.len();
        inner.items.retain(|item| item.id != id);
        if inner.items.len() == before {
            return false;
        }
        self.core.commit(&inner.items);
        true
    }

    pub fn clear(&self) {
        let mut inner = self.core.lock();
        self.core.sync(&mut inner);
        inner.items.clear();
        self.core.commit(&inner.items);
    }

    /// Receiver that always holds the current items, for count badges and trays.
    pub fn watch(&self) -> watch::Receiver<Vec<SelectionItem>> {
        self.refresh();
        self.core.view.subscribe()
    }
}

impl Drop for SelectionStore {
    fn drop(&mut self) {
        for dispatcher in &self.dispatchers {
            dispatcher.abort();
        }
    }
}

/// The incoming message only wakes the task; adoption drains the store's own
/// queue so a snapshot already superseded by a local mutation is never replayed.
async fn dispatch(core: Weak<StoreCore>, mut wake: Subscription) {
    while wake.next().await.is_some() {
        let Some(store) = core.upgrade() else {
            break;
        };
        store.refresh();
    }
}

fn lock_feeds(
    feeds: &Mutex<Vec<Arc<dyn ChangeFeed>>>,
) -> MutexGuard<'_, Vec<Arc<dyn ChangeFeed>>> {
    feeds.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StoreCore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh(&self) {
        let mut inner = self.lock();
        self.sync(&mut inner);
    }

    fn ensure_ready(&self, inner: &mut Inner) {
        if inner.state == StoreState::Ready {
            return;
        }

        let items = match self.storage.load(&self.config.storage_key) {
            Ok(Some(payload)) => decode_snapshot(&payload),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Could not read stored selection, starting empty: {}", e);
                Vec::new()
            }
        };

        inner.items = sanitize(items, self.config.max_items);
        inner.state = StoreState::Ready;
        self.view.send_replace(inner.items.clone());
        tracing::debug!(
            key = %self.config.storage_key,
            count = inner.items.len(),
            "Selection store ready"
        );
    }

    fn sync(&self, inner: &mut Inner) {
        self.ensure_ready(inner);

        let key = &self.config.storage_key;
        let mut latest = None;
        for subscription in inner.subscriptions.iter_mut() {
            while let Some(change) = subscription.try_next() {
                if &change.key == key {
                    latest = Some(change);
                }
            }
        }

        if let Some(change) = latest {
            let items = sanitize(change.items, self.config.max_items);
            if items != inner.items {
                tracing::debug!(
                    origin = ?change.origin,
                    count = items.len(),
                    "Adopting selection published elsewhere"
                );
                inner.items = items;
                self.view.send_replace(inner.items.clone());
            }
        }
    }

    /// Persists the full snapshot, then tells everyone else. Failures are logged, not returned.
    fn commit(&self, items: &[SelectionItem]) {
        match serde_json::to_string(items) {
            Ok(payload) => {
                if let Err(e) = self.storage.save(&self.config.storage_key, &payload) {
                    tracing::warn!("Selection not persisted, it will not survive a reload: {}", e);
                }
            }
            Err(e) => tracing::warn!("Could not serialize selection: {}", e),
        }

        let change = SelectionChange {
            origin: Origin::Store(self.id),
            key: self.config.storage_key.clone(),
            items: items.to_vec(),
        };
        for feed in lock_feeds(&self.feeds).iter() {
            if let Err(e) = feed.publish(&change) {
                tracing::warn!("Selection change not broadcast: {}", e);
            }
        }

        self.view.send_replace(items.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::core::change_feed::InProcessFeed;

    fn item(id: &str) -> SelectionItem {
        SelectionItem::new(id, format!("Item {}", id))
    }

    fn ids(store: &SelectionStore) -> Vec<String> {
        store.items().into_iter().map(|i| i.id).collect()
    }

    fn store_on(storage: &MemoryStorage) -> SelectionStore {
        let storage: Arc<dyn DurableStorage> = Arc::new(storage.clone());
        SelectionStore::new(SelectionConfig::default(), storage)
    }

    struct BrokenStorage;

    impl DurableStorage for BrokenStorage {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Err(CatalogError::Io(std::io::Error::other("disk gone")))
        }

        fn save(&self, _key: &str, _payload: &str) -> Result<()> {
            Err(CatalogError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn initialize_runs_once() {
        let storage = MemoryStorage::new();
        storage.save(DEFAULT_STORAGE_KEY, r#"[{"id":"1","title":"One"}]"#).unwrap();
        let store = store_on(&storage);
        assert_eq!(store.state(), StoreState::Uninitialized);

        store.initialize();
        assert_eq!(store.state(), StoreState::Ready);

        storage.save(DEFAULT_STORAGE_KEY, "[]").unwrap();
        store.initialize();
        assert_eq!(ids(&store), vec!["1"]);
    }

    #[test]
    fn repeated_add_is_idempotent() {
        let store = store_on(&MemoryStorage::new());
        assert_eq!(store.add(item("7")).unwrap(), AddOutcome::Added);
        assert_eq!(store.add(item("7")).unwrap(), AddOutcome::AlreadyPresent);
        assert_eq!(store.add(item(" 7 ")).unwrap(), AddOutcome::AlreadyPresent);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fifth_item_is_rejected() {
        let store = store_on(&MemoryStorage::new());
        for id in ["1", "2", "3", "4"] {
            assert_eq!(store.add(item(id)).unwrap(), AddOutcome::Added);
        }

        let err = store.add(item("5")).unwrap_err();
        assert!(matches!(err, CatalogError::CapacityExceeded { max: 4 }));
        assert_eq!(ids(&store), vec!["1", "2", "3", "4"]);
        assert!(store.is_full());
    }

    #[test]
    fn size_never_exceeds_max() {
        let store = store_on(&MemoryStorage::new());
        for round in 0..20 {
            let id = (round % 7).to_string();
            if round % 3 == 0 {
                store.remove(&id);
            } else {
                let _ = store.add(item(&id));
            }
            assert!(store.len() <= DEFAULT_MAX_ITEMS);
        }
    }

    #[test]
    fn item_without_identity_is_ignored() {
        let storage = MemoryStorage::new();
        let store = store_on(&storage);
        assert_eq!(store.add(item("  ")).unwrap(), AddOutcome::InvalidIdentity);
        assert_eq!(
            store.add_record(&CatalogRecord::default()).unwrap(),
            AddOutcome::InvalidIdentity
        );
        assert!(store.is_empty());
        assert!(storage.load(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn removing_non_member_changes_nothing() {
        let storage = MemoryStorage::new();
        let store = store_on(&storage);
        store.add(item("1")).unwrap();
        let persisted = storage.load(DEFAULT_STORAGE_KEY).unwrap();

        assert!(!store.remove("2"));
        assert_eq!(ids(&store), vec!["1"]);
        assert_eq!(storage.load(DEFAULT_STORAGE_KEY).unwrap(), persisted);
    }

    #[test]
    fn every_mutation_writes_the_full_snapshot() {
        let storage = MemoryStorage::new();
        let store = store_on(&storage);

        store.add(item("1")).unwrap();
        store.add(item("2")).unwrap();
        let saved = decode_snapshot(&storage.load(DEFAULT_STORAGE_KEY).unwrap().unwrap());
        assert_eq!(saved.len(), 2);

        assert!(store.remove("1"));
        let saved = decode_snapshot(&storage.load(DEFAULT_STORAGE_KEY).unwrap().unwrap());
        assert_eq!(saved, vec![item("2")]);
    }

    #[test]
    fn clear_then_initialize_is_empty() {
        let storage = MemoryStorage::new();
        let store = store_on(&storage);
        store.add(item("1")).unwrap();
        store.add(item("2")).unwrap();
        store.clear();

        let reloaded = store_on(&storage);
        reloaded.initialize();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let storage = MemoryStorage::new();
        storage.save(DEFAULT_STORAGE_KEY, "{not-valid").unwrap();
        let store = store_on(&storage);
        store.initialize();
        assert!(store.is_empty());
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[test]
    fn stored_snapshot_is_sanitized() {
        let storage = MemoryStorage::new();
        storage
            .save(
                DEFAULT_STORAGE_KEY,
                r#"[{"id":"1"},{"id":"1"},{"id":""},{"id":"2"},{"nope":true},{"id":"3"},{"id":"4"},{"id":"5"}]"#,
            )
            .unwrap();
        let store = store_on(&storage);
        assert_eq!(ids(&store), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let store = SelectionStore::new(SelectionConfig::default(), Arc::new(BrokenStorage));
        store.initialize();
        assert_eq!(store.add(item("1")).unwrap(), AddOutcome::Added);
        assert!(store.contains("1"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn sibling_store_sees_changes_after_the_call_returns() {
        let storage = MemoryStorage::new();
        let feed: Arc<dyn ChangeFeed> = Arc::new(InProcessFeed::new());
        let list_view = store_on(&storage).with_feed(feed.clone());
        let tray = store_on(&storage).with_feed(feed.clone());
        tray.initialize();

        list_view.add(item("1")).unwrap();
        list_view.add(item("2")).unwrap();
        assert_eq!(ids(&tray), vec!["1", "2"]);

        assert!(tray.remove("1"));
        assert_eq!(ids(&list_view), vec!["2"]);
    }

    #[test]
    fn other_keys_are_ignored() {
        let storage = MemoryStorage::new();
        let feed: Arc<dyn ChangeFeed> = Arc::new(InProcessFeed::new());
        let store = store_on(&storage).with_feed(feed.clone());
        store.initialize();

        feed.publish(&SelectionChange {
            origin: Origin::Store(u64::MAX),
            key: "wishlist".to_string(),
            items: vec![item("9")],
        })
        .unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn watch_tracks_current_items() {
        let store = store_on(&MemoryStorage::new());
        let rx = store.watch();
        store.add(item("1")).unwrap();
        assert_eq!(rx.borrow().len(), 1);
        store.clear();
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn other_process_write_is_adopted() {
        let storage = MemoryStorage::new();
        let other_process = storage.connect();

        let shared: Arc<MemoryStorage> = Arc::new(storage);
        let store = SelectionStore::new(SelectionConfig::default(), shared.clone())
            .with_feed(shared.clone());
        store.add(item("1")).unwrap();

        let remote = store_on(&other_process);
        remote.add(item("2")).unwrap();

        assert_eq!(ids(&store), vec!["1", "2"]);
    }
}
