//! Non-owning association store
//!
//! Connections and statements are identified by an [`EntityRef`], a shared
//! handle owned by the façade object wrapping the driver handle. The store
//! only ever keeps the numeric id or a `Weak` back-reference, so it never
//! keeps an entity alive. When the last `EntityRef` of an entity is dropped,
//! every entry keyed by it is removed; links and registry entries pointing at
//! it stop resolving.

use crate::attributes::{AttributeLayer, Attributes, AttributeValue};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::debug;

/// Process-unique entity identifier, never reused by a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Connection,
    Statement,
}

struct Entity {
    id: EntityId,
    kind: EntityKind,
    store: Weak<StoreInner>,
}

impl Drop for Entity {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.forget(self.id);
        }
    }
}

/// Identity of a live connection or statement
///
/// Cloning shares the identity. Equality is identity, not attributes: two
/// connections to the same DSN are distinct entities.
#[derive(Clone)]
pub struct EntityRef(Arc<Entity>);

impl EntityRef {
    pub fn id(&self) -> EntityId {
        self.0.id
    }

    pub fn kind(&self) -> EntityKind {
        self.0.kind
    }

    pub fn is_connection(&self) -> bool {
        self.0.kind == EntityKind::Connection
    }

    pub fn is_statement(&self) -> bool {
        self.0.kind == EntityKind::Statement
    }

    fn downgrade(&self) -> Weak<Entity> {
        Arc::downgrade(&self.0)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EntityRef {}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .finish()
    }
}

#[derive(Default)]
struct StoreInner {
    next_id: AtomicU64,
    timers: DashMap<EntityId, Instant>,
    layers: DashMap<EntityId, AttributeLayer>,
    owners: DashMap<EntityId, Weak<Entity>>,
    connections: DashMap<EntityId, Weak<Entity>>,
}

impl StoreInner {
    fn forget(&self, id: EntityId) {
        self.timers.remove(&id);
        self.layers.remove(&id);
        self.owners.remove(&id);
        self.connections.remove(&id);
    }
}

/// Timers, per-entity attribute layers, statement→connection links and the
/// connection registry, all keyed by entity identity
#[derive(Clone, Default)]
pub struct AssociationStore {
    inner: Arc<StoreInner>,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh identity bound to this store
    pub fn issue(&self, kind: EntityKind) -> EntityRef {
        let id = EntityId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        EntityRef(Arc::new(Entity {
            id,
            kind,
            store: Arc::downgrade(&self.inner),
        }))
    }

    /// Whether `entity` was issued by this store
    pub fn owns(&self, entity: &EntityRef) -> bool {
        std::ptr::eq(entity.0.store.as_ptr(), Arc::as_ptr(&self.inner))
    }

    fn accepts(&self, entity: &EntityRef) -> bool {
        let owned = self.owns(entity);
        if !owned {
            debug!(entity = %entity.id(), "Ignoring entity issued by another store");
        }
        owned
    }

    /// Record the start time, replacing any outstanding timer
    pub fn start(&self, entity: &EntityRef) {
        if !self.accepts(entity) {
            return;
        }
        if self
            .inner
            .timers
            .insert(entity.id(), Instant::now())
            .is_some()
        {
            debug!(
                entity = %entity.id(),
                "Timer restarted before stop, earlier interval discarded"
            );
        }
    }

    /// Elapsed time since the last `start`, zero when there was none
    pub fn stop(&self, entity: &EntityRef) -> Duration {
        if !self.owns(entity) {
            return Duration::ZERO;
        }
        match self.inner.timers.remove(&entity.id()) {
            Some((_, started)) => started.elapsed(),
            None => {
                debug!(entity = %entity.id(), "Timer stopped without start");
                Duration::ZERO
            }
        }
    }

    /// Write into the entity's own layer, creating it on first write
    pub fn set_attributes<I, K, V>(&self, entity: &EntityRef, attributes: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        if !self.accepts(entity) {
            return;
        }
        self.inner
            .layers
            .entry(entity.id())
            .or_default()
            .set_many(attributes);
    }

    /// Apply the entity's own layer on top of `base`; a missing layer reads as empty
    pub fn overlay_layer(&self, entity: &EntityRef, base: &mut Attributes) {
        if !self.owns(entity) {
            return;
        }
        if let Some(layer) = self.inner.layers.get(&entity.id()) {
            layer.overlay(base);
        }
    }

    /// Copy of the entity's own layer
    pub fn layer(&self, entity: &EntityRef) -> AttributeLayer {
        if !self.owns(entity) {
            return AttributeLayer::default();
        }
        self.inner
            .layers
            .get(&entity.id())
            .map(|layer| layer.clone())
            .unwrap_or_default()
    }

    /// Record the owning connection of a statement
    pub fn link(&self, statement: &EntityRef, connection: &EntityRef) {
        if !self.accepts(statement) || !self.accepts(connection) {
            return;
        }
        self.inner
            .owners
            .insert(statement.id(), connection.downgrade());
    }

    /// Owning connection, absent when never linked or already reclaimed
    pub fn resolve_connection(&self, statement: &EntityRef) -> Option<EntityRef> {
        if !self.owns(statement) {
            return None;
        }
        let owner = self
            .inner
            .owners
            .get(&statement.id())
            .map(|weak| weak.clone())?;
        owner.upgrade().map(EntityRef)
    }

    /// Add a connection to the registry; registering twice is a no-op
    pub fn register_connection(&self, connection: &EntityRef) {
        if !self.accepts(connection) {
            return;
        }
        self.inner
            .connections
            .entry(connection.id())
            .or_insert_with(|| connection.downgrade());
    }

    /// Remove a connection from the registry, returning whether it was present
    pub fn unregister_connection(&self, connection: &EntityRef) -> bool {
        self.owns(connection) && self.inner.connections.remove(&connection.id()).is_some()
    }

    pub fn is_registered(&self, connection: &EntityRef) -> bool {
        self.owns(connection) && self.inner.connections.contains_key(&connection.id())
    }

    /// Snapshot of the registry, resolving each entry lazily
    pub fn connections(&self) -> Connections {
        let mut snapshot: Vec<(EntityId, Weak<Entity>)> = self
            .inner
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        snapshot.sort_by_key(|(id, _)| *id);

        Connections {
            pending: snapshot
                .into_iter()
                .map(|(_, weak)| weak)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }

    /// Number of entities currently holding any entry in the store
    pub fn tracked_entities(&self) -> usize {
        let mut ids: Vec<EntityId> = Vec::new();
        ids.extend(self.inner.timers.iter().map(|e| *e.key()));
        ids.extend(self.inner.layers.iter().map(|e| *e.key()));
        ids.extend(self.inner.owners.iter().map(|e| *e.key()));
        ids.extend(self.inner.connections.iter().map(|e| *e.key()));
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

/// Lazy iterator over tracked connections that are still alive
pub struct Connections {
    pending: std::vec::IntoIter<Weak<Entity>>,
}

impl Iterator for Connections {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        self.pending.by_ref().find_map(|weak| weak.upgrade().map(EntityRef))
    }
}
