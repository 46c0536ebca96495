//! Configuration store - the single mutation point for every loaded document.
//!
//! `update_config` runs the mutator against the latest in-memory document
//! while holding the store lock, so two surfaces editing the same document
//! never overwrite each other with stale snapshots. Listeners are called
//! after the lock is released and receive the revision of the change they
//! are looking at.

use crate::application::lock;
use crate::application::persistence_gateway::{PersistMode, PersistenceGateway};
use crate::domain::document::ConfigDocument;
use crate::domain::error::ConfigError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Identifies the surface (grid container, settings control) behind a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub name: String,
    pub revision: u64,
    pub origin: Option<SurfaceId>,
    pub document: Arc<ConfigDocument>,
}

type Listener = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

struct Entry {
    document: Arc<ConfigDocument>,
    revision: u64,
    listeners: Vec<(u64, Listener)>,
}

struct StoreInner {
    entries: Mutex<HashMap<String, Entry>>,
    gateway: Arc<PersistenceGateway>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
                gateway,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.inner.gateway
    }

    /// Load a document into memory, defaulting it when storage has none.
    /// Returns the in-memory document if it is already loaded.
    pub async fn load(&self, name: &str) -> Result<Arc<ConfigDocument>, ConfigError> {
        if let Some(document) = self.get(name) {
            return Ok(document);
        }

        let document = match self.inner.gateway.load(name).await? {
            Some(mut document) => {
                if document.name != name {
                    tracing::warn!(config = %name, stored = %document.name, "Stored document name differs, using requested name");
                    document.name = name.to_string();
                }
                tracing::info!(config = %name, categories = document.categories.len(), "Loaded configuration");
                document
            }
            None => {
                tracing::info!(config = %name, "No stored configuration, using defaults");
                ConfigDocument::new(name)
            }
        };

        let mut entries = lock(&self.inner.entries);
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            document: Arc::new(document),
            revision: 0,
            listeners: Vec::new(),
        });
        Ok(entry.document.clone())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ConfigDocument>> {
        lock(&self.inner.entries)
            .get(name)
            .map(|entry| entry.document.clone())
    }

    /// Current document together with its revision
    pub fn snapshot(&self, name: &str) -> Option<(Arc<ConfigDocument>, u64)> {
        lock(&self.inner.entries)
            .get(name)
            .map(|entry| (entry.document.clone(), entry.revision))
    }

    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.entries).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn register_surface(&self) -> SurfaceId {
        SurfaceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn update_config<F>(&self, name: &str, mutator: F, mode: PersistMode) -> Result<Arc<ConfigDocument>, ConfigError>
    where
        F: FnOnce(&ConfigDocument) -> Result<ConfigDocument, ConfigError>,
    {
        self.update_config_from(None, name, mutator, mode)
    }

    /// Apply `mutator` to the latest document, notify listeners once and
    /// schedule one save. A failing mutator leaves everything untouched.
    pub fn update_config_from<F>(
        &self,
        origin: Option<SurfaceId>,
        name: &str,
        mutator: F,
        mode: PersistMode,
    ) -> Result<Arc<ConfigDocument>, ConfigError>
    where
        F: FnOnce(&ConfigDocument) -> Result<ConfigDocument, ConfigError>,
    {
        let (change, listeners) = {
            let mut entries = lock(&self.inner.entries);
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| ConfigError::NotLoaded(name.to_string()))?;

            let next = mutator(entry.document.as_ref()).inspect_err(|e| {
                tracing::debug!(config = %name, error = %e, "Mutation rejected");
            })?;
            if next.name != entry.document.name {
                return Err(ConfigError::IdentityChanged {
                    from: entry.document.name.clone(),
                    to: next.name,
                });
            }

            entry.revision += 1;
            entry.document = Arc::new(next);
            self.inner
                .gateway
                .schedule(name, entry.document.clone(), entry.revision, mode);

            let change = ConfigChange {
                name: name.to_string(),
                revision: entry.revision,
                origin,
                document: entry.document.clone(),
            };
            let listeners: Vec<Listener> = entry.listeners.iter().map(|(_, l)| l.clone()).collect();
            (change, listeners)
        };

        tracing::debug!(config = %name, revision = change.revision, ?mode, listeners = listeners.len(), "Applied mutation");
        for listener in &listeners {
            listener(&change);
        }
        Ok(change.document)
    }

    /// Register a listener for every successful update of `name`.
    /// The listener stays registered until the returned handle is dropped.
    pub fn subscribe<F>(&self, name: &str, listener: F) -> Result<Subscription, ConfigError>
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = lock(&self.inner.entries);
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| ConfigError::NotLoaded(name.to_string()))?;
        entry.listeners.push((id, Arc::new(listener)));

        Ok(Subscription {
            store: Arc::downgrade(&self.inner),
            name: name.to_string(),
            id,
        })
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        lock(&self.inner.entries)
            .get(name)
            .map_or(0, |entry| entry.listeners.len())
    }
}

/// Deregisters its listener when dropped
pub struct Subscription {
    store: Weak<StoreInner>,
    name: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            let mut entries = lock(&inner.entries);
            if let Some(entry) = entries.get_mut(&self.name) {
                entry.listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
