//! Two-tier key-value storage.
//!
//! The page tier lives as long as one session; the durable tier survives page
//! loads and process restarts. [`TieredStore`] rehydrates the page tier from
//! the durable one when a session opens and writes every mutation through to
//! both.
use std::ops::Deref;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use runner_logging::{runner_debug, runner_warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::persist::{PersistError, StoreDocument};

pub type StoreMap = Map<String, Value>;

const STORE_FILENAME: &str = "store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable store is unavailable")]
    Unavailable,
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("store document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A value change observed by a subscriber. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

pub trait KeyValueStore {
    /// Returns the present values among `keys`; absent keys are omitted.
    fn get(&self, keys: &[&str]) -> StoreMap;
    fn set(&mut self, entries: StoreMap);
    fn remove(&mut self, keys: &[&str]);
    /// Notifies about every later change of `key`, from any writer.
    fn subscribe(&mut self, key: &str) -> Subscription;
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    changes: Receiver<StoreChange>,
    _alive: Arc<()>,
}

impl Deref for Subscription {
    type Target = Receiver<StoreChange>;

    fn deref(&self) -> &Self::Target {
        &self.changes
    }
}

#[derive(Debug)]
struct Subscriber {
    key: String,
    sender: Sender<StoreChange>,
    alive: Weak<()>,
}

#[derive(Debug, Default)]
struct Subscribers {
    entries: Vec<Subscriber>,
}

impl Subscribers {
    fn add(&mut self, key: &str) -> Subscription {
        self.prune();
        let (sender, changes) = mpsc::channel();
        let alive = Arc::new(());
        self.entries.push(Subscriber {
            key: key.to_string(),
            sender,
            alive: Arc::downgrade(&alive),
        });
        Subscription {
            changes,
            _alive: alive,
        }
    }

    fn prune(&mut self) {
        self.entries
            .retain(|subscriber| subscriber.alive.strong_count() > 0);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn notify(&mut self, changes: &[StoreChange]) {
        self.prune();
        if changes.is_empty() {
            return;
        }
        self.entries.retain(|subscriber| {
            changes
                .iter()
                .filter(|change| change.key == subscriber.key)
                .all(|change| subscriber.sender.send(change.clone()).is_ok())
        });
    }
}

fn apply_set(values: &mut StoreMap, entries: StoreMap) -> Vec<StoreChange> {
    let mut changes = Vec::new();
    for (key, value) in entries {
        let old_value = values.insert(key.clone(), value.clone());
        if old_value.as_ref() != Some(&value) {
            changes.push(StoreChange {
                key,
                old_value,
                new_value: Some(value),
            });
        }
    }
    changes
}

fn apply_remove(values: &mut StoreMap, keys: &[&str]) -> Vec<StoreChange> {
    keys.iter()
        .filter_map(|key| {
            values.remove(*key).map(|old| StoreChange {
                key: key.to_string(),
                old_value: Some(old),
                new_value: None,
            })
        })
        .collect()
}

fn select(values: &StoreMap, keys: &[&str]) -> StoreMap {
    keys.iter()
        .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

/// Page-lifetime tier: plain memory, gone with the session that owns it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: StoreMap,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Live subscriptions; dropped ones are not counted.
    pub fn subscriber_count(&mut self) -> usize {
        self.subscribers.prune();
        self.subscribers.len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> StoreMap {
        select(&self.values, keys)
    }

    fn set(&mut self, entries: StoreMap) {
        let changes = apply_set(&mut self.values, entries);
        self.subscribers.notify(&changes);
    }

    fn remove(&mut self, keys: &[&str]) {
        let changes = apply_remove(&mut self.values, keys);
        self.subscribers.notify(&changes);
    }

    fn subscribe(&mut self, key: &str) -> Subscription {
        self.subscribers.add(key)
    }
}

#[derive(Debug, Default)]
struct FileStoreInner {
    /// `None` when the backing directory could not be used.
    document: Option<StoreDocument>,
    values: StoreMap,
    subscribers: Subscribers,
}

impl FileStoreInner {
    fn write_back(&self) -> Result<(), StoreError> {
        let document = self.document.as_ref().ok_or(StoreError::Unavailable)?;
        let content = serde_json::to_string_pretty(&self.values)?;
        document.replace(&content)?;
        Ok(())
    }
}

/// Durable tier backed by a JSON document in a directory.
///
/// Cloning yields another handle onto the same values and subscribers, so the
/// settings surface and a session observe each other's writes. When the
/// directory cannot be used every operation degrades to a no-op or an empty
/// read.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    inner: Arc<Mutex<FileStoreInner>>,
}

impl FileStore {
    pub fn open(dir: &Path) -> Self {
        match Self::try_open(dir) {
            Ok(store) => store,
            Err(err) => {
                runner_warn!(
                    "Durable store at {:?} unavailable, progress will not survive page loads: {}",
                    dir,
                    err
                );
                Self::unavailable()
            }
        }
    }

    fn try_open(dir: &Path) -> Result<Self, StoreError> {
        let document = StoreDocument::claim(dir, STORE_FILENAME)?;
        let values = match document.load()? {
            Some(text) => match serde_json::from_str::<StoreMap>(&text) {
                Ok(values) => values,
                Err(err) => {
                    runner_warn!(
                        "Discarding malformed store document {:?}: {}",
                        document.path(),
                        err
                    );
                    StoreMap::new()
                }
            },
            None => StoreMap::new(),
        };
        runner_debug!(
            "Opened durable store {:?} with {} keys",
            document.path(),
            values.len()
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(FileStoreInner {
                document: Some(document),
                values,
                subscribers: Subscribers::default(),
            })),
        })
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.lock().document.is_some()
    }

    /// Live subscriptions across every handle; dropped ones are not counted.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.prune();
        inner.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, FileStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, keys: &[&str]) -> StoreMap {
        let inner = self.lock();
        if inner.document.is_none() {
            return StoreMap::new();
        }
        select(&inner.values, keys)
    }

    fn set(&mut self, entries: StoreMap) {
        let mut inner = self.lock();
        if inner.document.is_none() {
            return;
        }
        let changes = apply_set(&mut inner.values, entries);
        if changes.is_empty() {
            return;
        }
        if let Err(err) = inner.write_back() {
            runner_warn!("Failed to persist store: {}", err);
        }
        inner.subscribers.notify(&changes);
    }

    fn remove(&mut self, keys: &[&str]) {
        let mut inner = self.lock();
        if inner.document.is_none() {
            return;
        }
        let changes = apply_remove(&mut inner.values, keys);
        if changes.is_empty() {
            return;
        }
        if let Err(err) = inner.write_back() {
            runner_warn!("Failed to persist store: {}", err);
        }
        inner.subscribers.notify(&changes);
    }

    fn subscribe(&mut self, key: &str) -> Subscription {
        self.lock().subscribers.add(key)
    }
}

/// Page tier in front of the durable tier.
#[derive(Debug)]
pub struct TieredStore {
    page: MemoryStore,
    durable: FileStore,
}

impl TieredStore {
    pub fn new(durable: FileStore) -> Self {
        Self {
            page: MemoryStore::new(),
            durable,
        }
    }

    /// Copies every present durable value among `keys` into the page tier.
    pub fn rehydrate(&mut self, keys: &[&str]) {
        let values = self.durable.get(keys);
        runner_debug!("Rehydrating {} of {} keys", values.len(), keys.len());
        self.page.set(values);
    }

    pub fn page(&self) -> &MemoryStore {
        &self.page
    }

    pub fn durable(&self) -> &FileStore {
        &self.durable
    }
}

impl KeyValueStore for TieredStore {
    fn get(&self, keys: &[&str]) -> StoreMap {
        self.page.get(keys)
    }

    fn set(&mut self, entries: StoreMap) {
        self.page.set(entries.clone());
        self.durable.set(entries);
    }

    fn remove(&mut self, keys: &[&str]) {
        self.page.remove(keys);
        self.durable.remove(keys);
    }

    /// Subscribes on the durable tier, where writers from other surfaces land.
    fn subscribe(&mut self, key: &str) -> Subscription {
        self.durable.subscribe(key)
    }
}
