//! Auto-save draft store
//!
//! Best-effort persistence of in-progress field values, partitioned by form
//! kind. Writes are debounced; the most recent snapshot always wins. Read
//! failures and corrupt snapshots are treated as "no draft". Only text fields
//! are persisted since file handles belong to the caller.

mod storage;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::config::PipelineConfig;
use crate::state::{FormKind, FormValues};

#[cfg(test)]
pub use storage::MockKeyValueStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

/// A persisted, time-stamped copy of in-progress field values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSnapshot {
    pub form_kind: FormKind,
    pub field_values: FormValues,
    pub saved_at_epoch_millis: i64,
}

/// On-disk shape: `{data, timestamp}`
#[derive(Debug, Serialize, Deserialize)]
struct DraftEnvelope {
    data: BTreeMap<String, String>,
    timestamp: i64,
}

struct PendingSave {
    generation: u64,
    snapshot: DraftSnapshot,
    task: Option<AbortHandle>,
}

struct Inner {
    storage: Arc<dyn KeyValueStore>,
    debounce: Duration,
    ttl: chrono::Duration,
    pending: Mutex<HashMap<FormKind, PendingSave>>,
    /// Serializes storage writes against clears
    write_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
}

/// Debounced draft snapshots over a [`KeyValueStore`]
#[derive(Clone)]
pub struct DraftStore {
    inner: Arc<Inner>,
}

impl DraftStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, debounce: Duration, ttl: chrono::Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                debounce,
                ttl,
                pending: Mutex::new(HashMap::new()),
                write_lock: tokio::sync::Mutex::new(()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(storage: Arc<dyn KeyValueStore>, config: &PipelineConfig) -> Self {
        Self::new(storage, config.autosave_debounce(), config.draft_ttl())
    }

    /// Schedule a snapshot of `values`. Any save still waiting out the
    /// debounce for this kind is superseded. Outside a Tokio runtime the
    /// snapshot is kept in memory until [`DraftStore::flush`].
    pub fn save(&self, kind: FormKind, values: &FormValues) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let snapshot = DraftSnapshot {
            form_kind: kind,
            field_values: FormValues::from_text_fields(values.text_fields()),
            saved_at_epoch_millis: Utc::now().timestamp_millis(),
        };

        let mut pending = self.inner.pending.lock();
        if let Some(previous) = pending.insert(
            kind,
            PendingSave {
                generation,
                snapshot,
                task: None,
            },
        ) {
            if let Some(task) = previous.task {
                task.abort();
            }
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(form_kind = %kind, "No async runtime; draft held in memory");
            return;
        };
        let inner = self.inner.clone();
        let task = handle.spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.write_pending(kind, generation).await;
        });
        if let Some(entry) = pending.get_mut(&kind) {
            entry.task = Some(task.abort_handle());
        }
    }

    /// Write any debounced snapshot for `kind` now
    pub async fn flush(&self, kind: FormKind) {
        let generation = {
            let mut pending = self.inner.pending.lock();
            match pending.get_mut(&kind) {
                Some(entry) => {
                    if let Some(task) = entry.task.take() {
                        task.abort();
                    }
                    entry.generation
                }
                None => return,
            }
        };
        self.inner.write_pending(kind, generation).await;
    }

    /// Latest snapshot for `kind`, unless absent, unreadable or expired
    pub async fn load_snapshot(&self, kind: FormKind) -> Option<DraftSnapshot> {
        let pending = self
            .inner
            .pending
            .lock()
            .get(&kind)
            .map(|entry| entry.snapshot.clone());
        if pending.is_some() {
            return pending;
        }

        let key = kind.autosave_key();
        let raw = match self.inner.storage.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(form_kind = %kind, error = %e, "Failed to read draft");
                return None;
            }
        };

        let envelope: DraftEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(form_kind = %kind, error = %e, "Discarding corrupt draft");
                self.inner.remove_quietly(kind).await;
                return None;
            }
        };

        let age_ms = Utc::now().timestamp_millis() - envelope.timestamp;
        if age_ms > self.inner.ttl.num_milliseconds() {
            tracing::debug!(form_kind = %kind, age_ms, "Draft expired");
            self.inner.remove_quietly(kind).await;
            return None;
        }

        Some(DraftSnapshot {
            form_kind: kind,
            field_values: FormValues::from_text_fields(envelope.data),
            saved_at_epoch_millis: envelope.timestamp,
        })
    }

    /// Field values of the latest usable snapshot
    pub async fn load(&self, kind: FormKind) -> Option<FormValues> {
        self.load_snapshot(kind).await.map(|s| s.field_values)
    }

    /// Drop the snapshot for `kind`, including any save still pending
    pub async fn clear(&self, kind: FormKind) {
        let _write = self.inner.write_lock.lock().await;
        let superseded = self.inner.pending.lock().remove(&kind);
        if let Some(task) = superseded.and_then(|entry| entry.task) {
            task.abort();
        }
        self.inner.remove_quietly(kind).await;
        tracing::debug!(form_kind = %kind, "Draft cleared");
    }
}

impl Inner {
    async fn write_pending(&self, kind: FormKind, generation: u64) {
        let _write = self.write_lock.lock().await;

        let snapshot = {
            let pending = self.pending.lock();
            match pending.get(&kind) {
                Some(entry) if entry.generation == generation => entry.snapshot.clone(),
                _ => return,
            }
        };

        let envelope = DraftEnvelope {
            data: snapshot.field_values.text_fields(),
            timestamp: snapshot.saved_at_epoch_millis,
        };
        let result = match serde_json::to_string(&envelope) {
            Ok(json) => self.storage.set(&kind.autosave_key(), json).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => tracing::trace!(form_kind = %kind, "Draft saved"),
            Err(e) => tracing::warn!(form_kind = %kind, error = %e, "Failed to save draft"),
        }

        let mut pending = self.pending.lock();
        if pending.get(&kind).map(|e| e.generation) == Some(generation) {
            pending.remove(&kind);
        }
    }

    async fn remove_quietly(&self, kind: FormKind) {
        if let Err(e) = self.storage.remove(&kind.autosave_key()).await {
            tracing::warn!(form_kind = %kind, error = %e, "Failed to remove draft");
        }
    }
}
