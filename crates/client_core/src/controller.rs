use std::collections::HashSet;
use std::sync::Arc;

use shared::error::{ApiFailure, FailureKind};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::collection::{Collection, RecordKey};
use crate::transport::{RecordApi, RemoteRecord};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    PartialUpdate,
    Delete,
}

/// Progress of collection mutations, broadcast to every subscriber. A
/// frontend surfaces `MutationFailed` as a dismissible message near the
/// point of action; it must never be dropped silently.
#[derive(Debug, Clone)]
pub enum MutationEvent<R> {
    /// The mutation was applied locally; the remote call is now in flight.
    Applied { key: RecordKey, kind: MutationKind },
    /// The server confirmed; the local record now matches the canonical one.
    Reconciled { key: RecordKey, record: R },
    /// A delete was confirmed (or the record was already gone remotely).
    Removed { key: RecordKey },
    /// The remote call failed and the local state was rolled back.
    MutationFailed {
        key: RecordKey,
        kind: FailureKind,
        reason: String,
    },
}

/// Synchronous rejection of a requested mutation. Remote failures never
/// surface here; they arrive as [`MutationEvent::MutationFailed`] after
/// rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("a mutation for this record is already in flight")]
    InFlight,
    #[error("record is awaiting its server id and cannot be mutated yet")]
    PendingCreate,
    #[error("no record with the requested key")]
    UnknownKey,
}

struct ControllerState<R> {
    collection: Collection<R>,
    in_flight: HashSet<RecordKey>,
    next_provisional: u64,
}

impl<R: RemoteRecord> ControllerState<R> {
    /// Gatekeeper for update/partial-update/delete: one mutation per key at
    /// a time, and no mutation at all until a created record has its server
    /// id. Returns the server id the remote call will address.
    fn admit(&self, key: RecordKey) -> Result<i64, MutationError> {
        let RecordKey::Server(id) = key else {
            return Err(MutationError::PendingCreate);
        };
        if self.in_flight.contains(&key) {
            return Err(MutationError::InFlight);
        }
        if !self.collection.contains(key) {
            return Err(MutationError::UnknownKey);
        }
        Ok(id)
    }
}

/// Optimistic mutation controller for one record collection.
///
/// Every mutating method applies the change to the in-memory collection
/// before any network await and returns once the remote round trip has been
/// spawned, so readers observe the new state immediately. Reconciliation or
/// rollback happens when the response arrives and is reported through the
/// event channel. The collection lock is never held across the remote call.
pub struct CollectionController<R: RemoteRecord> {
    api: Arc<dyn RecordApi<R>>,
    state: Mutex<ControllerState<R>>,
    events: broadcast::Sender<MutationEvent<R>>,
}

impl<R: RemoteRecord> CollectionController<R> {
    pub fn new(api: Arc<dyn RecordApi<R>>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            state: Mutex::new(ControllerState {
                collection: Collection::default(),
                in_flight: HashSet::new(),
                next_provisional: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MutationEvent<R>> {
        self.events.subscribe()
    }

    pub async fn records(&self) -> Vec<R> {
        self.state.lock().await.collection.records()
    }

    pub async fn get(&self, key: RecordKey) -> Option<R> {
        self.state.lock().await.collection.get(key).cloned()
    }

    /// Replaces the local collection with a fresh server listing. Each call
    /// performs a new request; the result is not restartable.
    pub async fn refresh(&self) -> Result<Vec<R>, ApiFailure> {
        let records = self.api.list().await?;
        let mut state = self.state.lock().await;
        state.collection = Collection::from_records(records.clone());
        Ok(records)
    }

    /// Inserts an optimistic copy at the front of the collection under a
    /// provisional key, then issues the remote create. The entry is rekeyed
    /// to the server id on success and removed again on failure.
    pub async fn create(self: &Arc<Self>, fields: R::Fields) -> RecordKey {
        let key = {
            let mut state = self.state.lock().await;
            state.next_provisional += 1;
            let key = RecordKey::Provisional(state.next_provisional);
            state.collection.insert_front(key, R::provisional(&fields));
            state.in_flight.insert(key);
            key
        };
        debug!(collection = R::COLLECTION, ?key, "mutation: create applied");
        let _ = self.events.send(MutationEvent::Applied {
            key,
            kind: MutationKind::Create,
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.finish_create(key, fields).await });
        key
    }

    pub async fn update(
        self: &Arc<Self>,
        key: RecordKey,
        fields: R::Fields,
    ) -> Result<(), MutationError> {
        let (id, snapshot) = {
            let mut state = self.state.lock().await;
            let id = state.admit(key)?;
            let snapshot = state
                .collection
                .get(key)
                .cloned()
                .ok_or(MutationError::UnknownKey)?;
            let mut updated = snapshot.clone();
            updated.apply_fields(&fields);
            state.collection.set(key, updated);
            state.in_flight.insert(key);
            (id, snapshot)
        };
        debug!(collection = R::COLLECTION, id, "mutation: update applied");
        let _ = self.events.send(MutationEvent::Applied {
            key,
            kind: MutationKind::Update,
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let result = controller.api.update(id, &fields).await;
            controller.settle(key, snapshot, result).await;
        });
        Ok(())
    }

    pub async fn partial_update(
        self: &Arc<Self>,
        key: RecordKey,
        patch: R::Patch,
    ) -> Result<(), MutationError> {
        let (id, snapshot) = {
            let mut state = self.state.lock().await;
            let id = state.admit(key)?;
            let snapshot = state
                .collection
                .get(key)
                .cloned()
                .ok_or(MutationError::UnknownKey)?;
            let mut updated = snapshot.clone();
            updated.apply_patch(&patch);
            state.collection.set(key, updated);
            state.in_flight.insert(key);
            (id, snapshot)
        };
        debug!(
            collection = R::COLLECTION,
            id, "mutation: partial update applied"
        );
        let _ = self.events.send(MutationEvent::Applied {
            key,
            kind: MutationKind::PartialUpdate,
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let result = controller.api.partial_update(id, &patch).await;
            controller.settle(key, snapshot, result).await;
        });
        Ok(())
    }

    pub async fn delete(self: &Arc<Self>, key: RecordKey) -> Result<(), MutationError> {
        let (id, index, snapshot) = {
            let mut state = self.state.lock().await;
            let id = state.admit(key)?;
            let (index, snapshot) = state
                .collection
                .remove(key)
                .ok_or(MutationError::UnknownKey)?;
            state.in_flight.insert(key);
            (id, index, snapshot)
        };
        debug!(collection = R::COLLECTION, id, "mutation: delete applied");
        let _ = self.events.send(MutationEvent::Applied {
            key,
            kind: MutationKind::Delete,
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.finish_delete(key, id, index, snapshot).await });
        Ok(())
    }

    async fn finish_create(&self, key: RecordKey, fields: R::Fields) {
        let result = self.api.create(&fields).await;
        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);
        match result {
            Ok(record) => {
                let server_key = RecordKey::Server(record.id());
                // The provisional entry is normally still there; after an
                // interleaved refresh the canonical record may already be
                // listed under its server key, or missing entirely.
                if !state.collection.replace_key(key, server_key, record.clone())
                    && !state.collection.set(server_key, record.clone())
                {
                    state.collection.insert_front(server_key, record.clone());
                }
                drop(state);
                debug!(collection = R::COLLECTION, ?server_key, "mutation: create reconciled");
                let _ = self.events.send(MutationEvent::Reconciled {
                    key: server_key,
                    record,
                });
            }
            Err(failure) => {
                state.collection.remove(key);
                drop(state);
                self.report_failure(key, failure);
            }
        }
    }

    /// Shared completion path for update and partial update.
    async fn settle(&self, key: RecordKey, snapshot: R, result: Result<R, ApiFailure>) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);
        match result {
            Ok(record) => {
                if !state.collection.set(key, record.clone()) {
                    warn!(
                        collection = R::COLLECTION,
                        ?key,
                        "mutation: reconciliation arrived for a key no longer listed"
                    );
                }
                drop(state);
                let _ = self.events.send(MutationEvent::Reconciled { key, record });
            }
            Err(failure) => {
                state.collection.set(key, snapshot);
                drop(state);
                self.report_failure(key, failure);
            }
        }
    }

    async fn finish_delete(&self, key: RecordKey, id: i64, index: usize, snapshot: R) {
        let result = self.api.delete(id).await;
        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);
        match result {
            // The record being already gone remotely is still a successful
            // delete from the user's point of view.
            Ok(()) | Err(ApiFailure::NotFound) => {
                drop(state);
                let _ = self.events.send(MutationEvent::Removed { key });
            }
            Err(failure) => {
                state.collection.insert_at(index, key, snapshot);
                drop(state);
                self.report_failure(key, failure);
            }
        }
    }

    fn report_failure(&self, key: RecordKey, failure: ApiFailure) {
        warn!(
            collection = R::COLLECTION,
            ?key,
            kind = ?failure.kind(),
            "mutation failed, local state rolled back: {failure}"
        );
        let _ = self.events.send(MutationEvent::MutationFailed {
            key,
            kind: failure.kind(),
            reason: failure.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
