//! services/planner/src/realtime/manager.rs
//!
//! Multiplexes live queries under string keys.
//!
//! Each key owns at most one open live query. Every snapshot it pushes is
//! cached under the key and fanned out to the subscriber's handler and then
//! to any number of extra callbacks. A callback that joins late is handed the
//! cached snapshot straight away.
//!
//! Two locks are involved and are always taken in this order:
//! - `gate`, a re-entrant mutex serializing deliveries with registry swaps,
//!   so that once `subscribe`/`unsubscribe` returns nothing from the replaced
//!   query is delivered. Re-entrancy lets callbacks call back into the
//!   manager from inside a delivery.
//! - `registry`, a plain mutex that is never held while user code runs.

use futures::StreamExt;
use parking_lot::{Mutex, ReentrantMutex};
use planner_core::{Document, DocumentStore, PortResult, WatchTarget};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One result set of a live query.
pub type Snapshot = Arc<Vec<Document>>;

/// What subscribers and callbacks receive.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Snapshot(Snapshot),
    /// The live query failed and was closed. The key gets no further updates
    /// until it is subscribed again.
    Stalled { reason: String },
}

pub type Callback = Arc<dyn Fn(&LiveEvent) + Send + Sync>;

/// Handle for removing a callback added with [`RealtimeManager::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Diagnostic view of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeStatus {
    pub active_listeners: BTreeSet<String>,
    pub data_keys: BTreeSet<String>,
    /// Keys with at least one callback.
    pub callback_keys: BTreeSet<String>,
    pub stalled_keys: BTreeSet<String>,
}

/// Key under which a per-month feed is registered, e.g. `m:2024-6`.
pub fn month_key(year: i32, month: u32) -> String {
    format!("m:{}-{}", year, month)
}

struct Listener {
    generation: u64,
    cancel: CancellationToken,
    stalled: bool,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, Listener>,
    data: HashMap<String, Snapshot>,
    callbacks: HashMap<String, Vec<(CallbackId, Callback)>>,
    next_generation: u64,
    next_callback: u64,
}

impl Registry {
    fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.data.is_empty() && self.callbacks.is_empty()
    }
}

struct Shared {
    gate: ReentrantMutex<()>,
    registry: Mutex<Registry>,
}

impl Shared {
    /// Applies one pushed result of the listener registered as `generation`.
    /// Returns false when that listener has been replaced or removed, in
    /// which case nothing is delivered.
    fn deliver(
        &self,
        key: &str,
        generation: u64,
        result: PortResult<Vec<Document>>,
        on_snapshot: &Callback,
    ) -> bool {
        let _gate = self.gate.lock();

        let (event, callbacks) = {
            let mut registry = self.registry.lock();
            match registry.listeners.get_mut(key) {
                Some(listener) if listener.generation == generation => {}
                _ => {
                    debug!("Dropping stale update for '{}'", key);
                    return false;
                }
            }

            let event = match result {
                Ok(docs) => {
                    let snapshot: Snapshot = Arc::new(docs);
                    registry.data.insert(key.to_string(), snapshot.clone());
                    LiveEvent::Snapshot(snapshot)
                }
                Err(e) => {
                    if let Some(listener) = registry.listeners.get_mut(key) {
                        listener.stalled = true;
                    }
                    LiveEvent::Stalled {
                        reason: e.to_string(),
                    }
                }
            };
            let callbacks: Vec<Callback> = registry
                .callbacks
                .get(key)
                .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default();
            (event, callbacks)
        };

        on_snapshot(&event);
        for callback in &callbacks {
            callback(&event);
        }
        true
    }
}

pub struct RealtimeManager {
    store: Arc<dyn DocumentStore>,
    shared: Arc<Shared>,
}

impl RealtimeManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            shared: Arc::new(Shared {
                gate: ReentrantMutex::new(()),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Opens a live query for `target` under `key`, closing whatever query
    /// the key had before. Must be called from within a tokio runtime.
    pub fn subscribe<F>(&self, key: &str, target: &WatchTarget, on_snapshot: F) -> PortResult<()>
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        let _gate = self.shared.gate.lock();
        self.unsubscribe(key);

        let mut stream = self.store.watch(target)?;
        let cancel = CancellationToken::new();
        let generation = {
            let mut registry = self.shared.registry.lock();
            registry.next_generation += 1;
            let generation = registry.next_generation;
            registry.listeners.insert(
                key.to_string(),
                Listener {
                    generation,
                    cancel: cancel.clone(),
                    stalled: false,
                },
            );
            generation
        };

        let shared = Arc::clone(&self.shared);
        let on_snapshot: Callback = Arc::new(on_snapshot);
        let key = key.to_string();
        info!("Subscribed '{}' to {}", key, target.collection());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Live query for '{}' closed", key);
                        break;
                    }
                    next = stream.next() => match next {
                        Some(Ok(docs)) => {
                            if !shared.deliver(&key, generation, Ok(docs), &on_snapshot) {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Live query for '{}' failed: {}", key, e);
                            shared.deliver(&key, generation, Err(e), &on_snapshot);
                            break;
                        }
                        None => {
                            debug!("Live query for '{}' ended", key);
                            break;
                        }
                    },
                }
            }
        });
        Ok(())
    }

    /// Registers an extra callback for `key`. A cached snapshot, if any, is
    /// delivered to it before this returns.
    pub fn add_callback<F>(&self, key: &str, callback: F) -> CallbackId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        let _gate = self.shared.gate.lock();
        let callback: Callback = Arc::new(callback);

        let (id, cached) = {
            let mut registry = self.shared.registry.lock();
            registry.next_callback += 1;
            let id = CallbackId(registry.next_callback);
            registry
                .callbacks
                .entry(key.to_string())
                .or_default()
                .push((id, callback.clone()));
            (id, registry.data.get(key).cloned())
        };

        if let Some(snapshot) = cached {
            callback(&LiveEvent::Snapshot(snapshot));
        }
        id
    }

    pub fn remove_callback(&self, key: &str, id: CallbackId) {
        let mut registry = self.shared.registry.lock();
        if let Some(list) = registry.callbacks.get_mut(key) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    /// Closes the live query of `key`. Its cached snapshot and callbacks are
    /// kept, so a later `subscribe` on the same key reaches them again.
    pub fn unsubscribe(&self, key: &str) {
        let _gate = self.shared.gate.lock();
        let removed = self.shared.registry.lock().listeners.remove(key);
        if let Some(listener) = removed {
            listener.cancel.cancel();
            info!("Unsubscribed '{}'", key);
        }
    }

    /// Closes every live query and forgets all cached data and callbacks.
    pub fn unsubscribe_all(&self) {
        let _gate = self.shared.gate.lock();
        let mut registry = self.shared.registry.lock();
        if registry.is_empty() {
            return;
        }
        let closed = registry.listeners.len();
        for (_, listener) in registry.listeners.drain() {
            listener.cancel.cancel();
        }
        registry.data.clear();
        registry.callbacks.clear();
        info!("Closed {} live queries", closed);
    }

    /// The last snapshot cached under `key`, `None` when nothing arrived yet.
    pub fn get_snapshot(&self, key: &str) -> Option<Snapshot> {
        self.shared.registry.lock().data.get(key).cloned()
    }

    pub fn get_status(&self) -> RealtimeStatus {
        let registry = self.shared.registry.lock();
        RealtimeStatus {
            active_listeners: registry.listeners.keys().cloned().collect(),
            data_keys: registry.data.keys().cloned().collect(),
            callback_keys: registry
                .callbacks
                .iter()
                .filter(|(_, list)| !list.is_empty())
                .map(|(key, _)| key.clone())
                .collect(),
            stalled_keys: registry
                .listeners
                .iter()
                .filter(|(_, listener)| listener.stalled)
                .map(|(key, _)| key.clone())
                .collect(),
        }
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
