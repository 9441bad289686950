//! Entity registries
//!
//! A [`Registry`] is an id-allocating collection of records living inside the
//! dashboard document. Two flavours exist: [`QueryEntity`] and
//! [`FilterEntity`]. Released ids are recycled smallest-first.

pub mod filter;
mod free_ids;
pub mod query;

pub use filter::{FilterEntity, FilterKind, FilterPatch, Mandate, RangeMode, TimeRange};
pub use free_ids::FreeIds;
pub use query::{QueryEntity, QueryKind, QueryPatch};

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

pub type EntityId = u32;

/// A record type that can live in a [`Registry`].
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned {
    /// Partial record used both to create and to update entities.
    type Patch: Default;

    /// Builds a new entity under `id`, filling every field `fields` leaves out.
    /// Returns `None` when a required field is missing.
    fn create(id: EntityId, fields: Self::Patch) -> Option<Self>;

    /// Overwrites the fields present in `fields`.
    fn merge(&mut self, fields: Self::Patch);

    fn id(&self) -> EntityId;

    /// The `type` tag of the record.
    fn type_name(&self) -> &str;

    /// Inactive records are skipped by typed lookups unless asked for.
    fn is_active(&self) -> bool {
        true
    }

    /// Record inserted by `init` into an empty registry.
    fn seed() -> Option<Self::Patch> {
        None
    }
}

/// Id-allocating collection, stored in the dashboard document as
/// `{idQueue, list, ids}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "E: DeserializeOwned"))]
pub struct Registry<E: Entity> {
    #[serde(default)]
    id_queue: FreeIds,
    #[serde(default = "BTreeMap::new", deserialize_with = "entity_map")]
    list: BTreeMap<EntityId, E>,
    #[serde(default)]
    ids: Vec<EntityId>,
}

/// Reads the `list` map, parsing its string keys into ids. Buffered input
/// (documents with flattened fields) does not convert them on its own.
fn entity_map<'de, D, E>(deserializer: D) -> Result<BTreeMap<EntityId, E>, D::Error>
where
    D: Deserializer<'de>,
    E: Entity,
{
    BTreeMap::<String, E>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, entity)| {
            key.parse::<EntityId>()
                .map(|id| (id, entity))
                .map_err(|_| de::Error::custom(format!("invalid entity id '{}'", key)))
        })
        .collect()
}

impl<E: Entity> Default for Registry<E> {
    fn default() -> Self {
        Self {
            id_queue: FreeIds::new(),
            list: BTreeMap::new(),
            ids: Vec::new(),
        }
    }
}

impl<E: Entity> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-binds the registry to freshly loaded state.
    ///
    /// Brings `ids`, `list` and the free-id queue back into agreement, then
    /// seeds the flavour's default record if nothing is left.
    pub fn init(&mut self) {
        let mut live = HashSet::new();
        self.ids
            .retain(|id| self.list.contains_key(id) && live.insert(*id));
        for id in self.list.keys() {
            if !live.contains(id) {
                self.ids.push(*id);
            }
        }
        self.id_queue.retain(|id| !self.list.contains_key(&id));

        if self.ids.is_empty() {
            if let Some(seed) = E::seed() {
                self.set(seed, None);
            }
        }
    }

    /// Updates entity `id` with `fields`, or creates a new entity when `id` is
    /// `None`. Returns the affected id, or `None` if `id` is unknown or a
    /// required field is missing.
    pub fn set(&mut self, fields: E::Patch, id: Option<EntityId>) -> Option<EntityId> {
        match id {
            Some(id) => {
                let entity = self.list.get_mut(&id)?;
                entity.merge(fields);
                Some(id)
            }
            None => {
                let (id, recycled) = self.next_id();
                let entity = E::create(id, fields)?;
                if recycled {
                    self.id_queue.take_smallest();
                }
                self.ids.push(id);
                self.list.insert(id, entity);
                Some(id)
            }
        }
    }

    /// Deletes entity `id` and queues its id for reuse.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if self.list.remove(&id).is_none() {
            return false;
        }
        self.ids.retain(|live| *live != id);
        self.id_queue.release(id);
        true
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.list.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut E> {
        self.list.get_mut(&id)
    }

    /// Entities whose type is `type_name`, in id-sequence order.
    pub fn get_by_type(&self, type_name: &str, include_inactive: bool) -> Vec<&E> {
        self.iter()
            .filter(|e| e.type_name() == type_name && (include_inactive || e.is_active()))
            .collect()
    }

    pub fn ids_by_type(&self, type_name: &str, include_inactive: bool) -> Vec<EntityId> {
        self.get_by_type(type_name, include_inactive)
            .into_iter()
            .map(Entity::id)
            .collect()
    }

    /// Removes every entity of `type_name`, active or not.
    pub fn remove_by_type(&mut self, type_name: &str) -> Vec<EntityId> {
        let ids = self.ids_by_type(type_name, true);
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    /// Live ids in insertion order.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Live entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.ids.iter().filter_map(|id| self.list.get(id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Released ids waiting for reuse, ascending.
    pub fn free_ids(&self) -> Vec<EntityId> {
        self.id_queue.to_vec()
    }

    /// The id the next insertion would receive, and whether it comes from the
    /// free-id queue.
    fn next_id(&self) -> (EntityId, bool) {
        if let Some(id) = self.id_queue.peek_smallest() {
            return (id, true);
        }
        let mut id = self.ids.len() as EntityId;
        while self.list.contains_key(&id) {
            id += 1;
        }
        (id, false)
    }
}
