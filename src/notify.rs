//! Shared settings handles with change notification.
//!
//! A [`Settings`] handle is cloned between whoever edits the values (an
//! inspector, the HTTP server, a test) and the preview that reacts to them.
//! Every edit goes through [`Settings::update`], which validates the new
//! values and sends a [`SettingsChanged`] to each live subscription.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsKind {
    Mesh,
    HeightMap,
    Erosion,
    Texture,
}

/// A settings type that can live behind a [`Settings`] handle.
pub trait UpdatableSettings: Clone + Send + Sync + 'static {
    const KIND: SettingsKind;

    /// Clamp fields into their legal ranges after an edit.
    fn validate_values(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Identity of one settings object, shared by all clones of its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingsId(u64);

static NEXT_SETTINGS_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettingsChanged {
    pub source: SettingsKind,
    /// The settings object that was edited.
    pub settings: SettingsId,
}

#[derive(Default)]
struct ListenerSet {
    next_id: AtomicU64,
    senders: Mutex<BTreeMap<ListenerId, Sender<SettingsChanged>>>,
}

impl ListenerSet {
    fn insert(&self, tx: Sender<SettingsChanged>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        id
    }

    fn remove(&self, id: ListenerId) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    fn len(&self) -> usize {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn broadcast(&self, event: SettingsChanged) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        // Receivers that went away take their subscription with them.
        senders.retain(|_, tx| tx.send(event).is_ok());
    }
}

/// Registration on one settings handle. Revoked explicitly or on drop.
pub struct Subscription {
    kind: SettingsKind,
    id: ListenerId,
    listeners: Arc<ListenerSet>,
}

impl Subscription {
    pub fn kind(&self) -> SettingsKind {
        self.kind
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Unsubscribe now rather than when the handle goes out of scope.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listeners.remove(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

struct Inner<T> {
    id: SettingsId,
    value: RwLock<T>,
    listeners: Arc<ListenerSet>,
}

/// Cloneable handle to one settings object.
pub struct Settings<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Settings<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: UpdatableSettings + Default> Default for Settings<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: UpdatableSettings> Settings<T> {
    pub fn new(mut value: T) -> Self {
        value.validate_values();
        Self {
            inner: Arc::new(Inner {
                id: SettingsId(NEXT_SETTINGS_ID.fetch_add(1, Ordering::Relaxed)),
                value: RwLock::new(value),
                listeners: Arc::new(ListenerSet::default()),
            }),
        }
    }

    pub fn kind(&self) -> SettingsKind {
        T::KIND
    }

    pub fn id(&self) -> SettingsId {
        self.inner.id
    }

    /// Snapshot of the current values.
    pub fn get(&self) -> T {
        self.read(T::clone)
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Edit the values, clamp them, then notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = {
            let mut guard = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
            let out = f(&mut guard);
            guard.validate_values();
            out
        };
        self.notify_of_updated_values();
        out
    }

    pub fn replace(&self, value: T) {
        self.update(|v| *v = value);
    }

    pub fn notify_of_updated_values(&self) {
        self.inner.listeners.broadcast(SettingsChanged {
            source: T::KIND,
            settings: self.id(),
        });
    }

    pub fn subscribe(&self, tx: Sender<SettingsChanged>) -> Subscription {
        let id = self.inner.listeners.insert(tx);
        Subscription {
            kind: T::KIND,
            id,
            listeners: Arc::clone(&self.inner.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// True when both handles point at the same settings object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: std::fmt::Debug + UpdatableSettings> std::fmt::Debug for Settings<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.read(|v| f.debug_tuple("Settings").field(v).finish())
    }
}
