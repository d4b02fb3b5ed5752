//! # Archetype-based Entity Storage
//!
//! Entities with the same component set share one table:
//!
//! ```text
//! Archetype {Position, Velocity}:
//!   entities:  [e1, e4, e7]
//!   Position:  [h1, h4, h7]   <- component handles, one column per type
//!   Velocity:  [v1, v4, v7]
//! ```
//!
//! Adding or removing a component moves the entity's row into the table for
//! the new set. The row's handles are moved, never the instance data, and the
//! hole left behind is filled by swap-remove.
//!
//! Signatures are sorted and de-duplicated, so archetype identity never
//! depends on the order components were added.

use std::collections::HashMap;
use std::fmt;

use super::component::{ComponentHandle, ComponentTypeId};
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Index of an archetype table. Tables are never destroyed, so ids are stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The archetype of entities with no components.
    pub const EMPTY: Self = Self(0);

    /// Returns the id as a table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Signature of an archetype - which components it contains.
///
/// Uses a sorted vector of type ids for consistent hashing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArchetypeSignature {
    /// Sorted list of component type ids.
    components: Vec<ComponentTypeId>,
}

impl ArchetypeSignature {
    /// Creates a signature from component types in any order.
    #[must_use]
    pub fn new(mut components: Vec<ComponentTypeId>) -> Self {
        components.sort_unstable();
        components.dedup();
        Self { components }
    }

    /// The empty signature.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Checks if this signature contains a component type.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    /// Column index of a component type.
    #[inline]
    #[must_use]
    pub fn position(&self, id: ComponentTypeId) -> Option<usize> {
        self.components.binary_search(&id).ok()
    }

    /// Checks if every type of `other` is in this signature.
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        other.components.iter().all(|id| self.contains(*id))
    }

    /// Checks if any type of `other` is in this signature.
    #[must_use]
    pub fn contains_any(&self, other: &Self) -> bool {
        other.components.iter().any(|id| self.contains(*id))
    }

    /// This signature plus one type.
    #[must_use]
    pub fn with(&self, id: ComponentTypeId) -> Self {
        let mut components = self.components.clone();
        if let Err(at) = components.binary_search(&id) {
            components.insert(at, id);
        }
        Self { components }
    }

    /// This signature minus one type.
    #[must_use]
    pub fn without(&self, id: ComponentTypeId) -> Self {
        let mut components = self.components.clone();
        if let Ok(at) = components.binary_search(&id) {
            components.remove(at);
        }
        Self { components }
    }

    /// Component types in sorted order.
    #[must_use]
    pub fn components(&self) -> &[ComponentTypeId] {
        &self.components
    }

    /// Returns the number of component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Checks if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<ComponentTypeId> for ArchetypeSignature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Where a live entity's row is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Table holding the row.
    pub archetype: ArchetypeId,
    /// Row index inside that table.
    pub row: usize,
}

/// A single archetype table - stores all entities with the same component set.
///
/// Memory layout is Structure of Arrays:
/// ```text
/// | Entity IDs | Handles(T0)[] | Handles(T1)[] | ... |
/// ```
pub struct ArchetypeTable {
    id: ArchetypeId,
    /// Signature identifying this archetype.
    signature: ArchetypeSignature,
    /// Entity IDs in this archetype (for reverse lookup).
    entities: Vec<EntityId>,
    /// One column per signature entry, same order.
    columns: Vec<Vec<ComponentHandle>>,
    /// Cached transitions: type added → destination table.
    add_edges: HashMap<ComponentTypeId, ArchetypeId>,
    /// Cached transitions: type removed → destination table.
    remove_edges: HashMap<ComponentTypeId, ArchetypeId>,
}

impl ArchetypeTable {
    fn new(id: ArchetypeId, signature: ArchetypeSignature) -> Self {
        let columns = (0..signature.len()).map(|_| Vec::new()).collect();
        Self {
            id,
            signature,
            entities: Vec::new(),
            columns,
            add_edges: HashMap::new(),
            remove_edges: HashMap::new(),
        }
    }

    /// Returns the id of this table.
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Returns the signature of this archetype.
    #[must_use]
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Returns the number of entities in this archetype.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns a slice of all entity IDs.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Gets the entity ID at a row.
    #[must_use]
    pub fn entity_at(&self, row: usize) -> Option<EntityId> {
        self.entities.get(row).copied()
    }

    /// Handle of one component type at a row.
    #[must_use]
    pub fn handle(&self, row: usize, id: ComponentTypeId) -> Option<ComponentHandle> {
        let column = self.signature.position(id)?;
        self.columns[column].get(row).copied()
    }

    /// Every handle at a row, in signature order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = ComponentHandle> + '_ {
        self.columns.iter().filter_map(move |column| column.get(row).copied())
    }

    /// Appends a row. `handles` must follow signature order.
    fn push_row(&mut self, id: EntityId, handles: &[ComponentHandle]) -> usize {
        debug_assert_eq!(handles.len(), self.columns.len(), "row width mismatch");
        for (column, handle) in self.columns.iter_mut().zip(handles) {
            column.push(*handle);
        }
        self.entities.push(id);
        self.entities.len() - 1
    }

    /// Swap-removes a row, moving its handles into `out`.
    ///
    /// Returns the entity that now occupies `row`, if any.
    fn swap_remove_row(&mut self, row: usize, out: &mut Vec<ComponentHandle>) -> Option<EntityId> {
        for column in &mut self.columns {
            out.push(column.swap_remove(row));
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}

/// Entity record handed back by [`ArchetypeManager::destroy_entity`].
///
/// Pooled by the game so destroying entities does not allocate.
#[derive(Debug, Default)]
pub struct EntityRecord {
    /// The destroyed entity.
    pub id: EntityId,
    /// Handles that were in the entity's row.
    pub components: Vec<ComponentHandle>,
}

impl EntityRecord {
    /// Clears the record for reuse, keeping its buffer.
    pub fn reset(&mut self) {
        self.id = EntityId::NULL;
        self.components.clear();
    }
}

/// A borrowed view of one committed row.
#[derive(Clone, Copy)]
pub struct EntityRow<'a> {
    /// Entity occupying the row.
    pub id: EntityId,
    /// Table holding it.
    pub table: &'a ArchetypeTable,
    /// Row index inside the table.
    pub row: usize,
}

/// Owns the entity → archetype mapping and every archetype table.
pub struct ArchetypeManager {
    tables: Vec<ArchetypeTable>,
    index: HashMap<ArchetypeSignature, ArchetypeId>,
    /// Indexed by entity id.
    locations: Vec<Option<EntityLocation>>,
    live: usize,
    /// Row buffer reused across migrations.
    scratch: Vec<ComponentHandle>,
}

impl Default for ArchetypeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeManager {
    /// Creates a manager holding only the empty archetype.
    #[must_use]
    pub fn new() -> Self {
        let mut manager = Self {
            tables: Vec::new(),
            index: HashMap::new(),
            locations: Vec::new(),
            live: 0,
            scratch: Vec::new(),
        };
        let empty = ArchetypeSignature::empty();
        manager.index.insert(empty.clone(), ArchetypeId::EMPTY);
        manager
            .tables
            .push(ArchetypeTable::new(ArchetypeId::EMPTY, empty));
        manager
    }

    /// Number of live entities.
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live
    }

    /// Number of archetypes created so far.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.tables.len()
    }

    /// Every table, in creation order.
    #[must_use]
    pub fn tables(&self) -> &[ArchetypeTable] {
        &self.tables
    }

    /// One table by id.
    #[must_use]
    pub fn table(&self, id: ArchetypeId) -> Option<&ArchetypeTable> {
        self.tables.get(id.index())
    }

    /// Looks up the archetype for a signature without creating it.
    #[must_use]
    pub fn find(&self, signature: &ArchetypeSignature) -> Option<ArchetypeId> {
        self.index.get(signature).copied()
    }

    /// Where a live entity's row is.
    #[inline]
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<EntityLocation> {
        self.locations.get(id.index()).copied().flatten()
    }

    /// Checks if an entity is live.
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.location(id).is_some()
    }

    /// O(1) lookup of an entity's committed row.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<EntityRow<'_>> {
        let location = self.location(id)?;
        Some(EntityRow {
            id,
            table: &self.tables[location.archetype.index()],
            row: location.row,
        })
    }

    /// Registers an entity in the empty archetype.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityAlreadyLive`] if the id is already registered.
    pub fn create_entity(&mut self, id: EntityId) -> EcsResult<()> {
        if self.is_live(id) {
            return Err(EcsError::EntityAlreadyLive(id));
        }
        self.attach(id, ArchetypeId::EMPTY, &[]);
        self.live += 1;
        Ok(())
    }

    /// Removes an entity from its table, moving its handles into `record`.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotLive`] if the id is not registered.
    pub fn destroy_entity(&mut self, id: EntityId, record: &mut EntityRecord) -> EcsResult<()> {
        let location = self.location(id).ok_or(EcsError::EntityNotLive(id))?;
        record.id = id;
        self.detach(id, location, &mut record.components);
        self.live -= 1;
        Ok(())
    }

    /// Checks that `component` could be added to `id` right now.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotLive`] or [`EcsError::DuplicateComponent`].
    pub fn ensure_can_add(&self, id: EntityId, component: ComponentTypeId) -> EcsResult<()> {
        let location = self.location(id).ok_or(EcsError::EntityNotLive(id))?;
        if self.tables[location.archetype.index()]
            .signature
            .contains(component)
        {
            return Err(EcsError::DuplicateComponent {
                entity: id,
                component,
            });
        }
        Ok(())
    }

    /// Migrates an entity from archetype A to A ∪ {type of `handle`}.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotLive`] or [`EcsError::DuplicateComponent`].
    pub fn add_component(&mut self, id: EntityId, handle: ComponentHandle) -> EcsResult<()> {
        let component = handle.component_type();
        self.ensure_can_add(id, component)?;
        let Some(location) = self.location(id) else {
            return Err(EcsError::EntityNotLive(id));
        };
        let target = self.add_target(location.archetype, component)?;

        let mut row = std::mem::take(&mut self.scratch);
        row.clear();
        self.detach(id, location, &mut row);
        let at = row.partition_point(|h| h.component_type() < component);
        row.insert(at, handle);
        self.attach(id, target, &row);
        self.scratch = row;
        Ok(())
    }

    /// Migrates an entity from archetype A to A \ {`component`}.
    ///
    /// Returns the removed handle; the caller releases the instance.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotLive`] or [`EcsError::MissingComponent`].
    pub fn remove_component(
        &mut self,
        id: EntityId,
        component: ComponentTypeId,
    ) -> EcsResult<ComponentHandle> {
        let location = self.location(id).ok_or(EcsError::EntityNotLive(id))?;
        let column = self.tables[location.archetype.index()]
            .signature
            .position(component)
            .ok_or(EcsError::MissingComponent {
                entity: id,
                component,
            })?;
        let target = self.remove_target(location.archetype, component)?;

        let mut row = std::mem::take(&mut self.scratch);
        row.clear();
        self.detach(id, location, &mut row);
        let handle = row.remove(column);
        self.attach(id, target, &row);
        self.scratch = row;
        Ok(handle)
    }

    fn add_target(
        &mut self,
        from: ArchetypeId,
        component: ComponentTypeId,
    ) -> EcsResult<ArchetypeId> {
        if let Some(target) = self.tables[from.index()].add_edges.get(&component) {
            return Ok(*target);
        }
        let signature = self.tables[from.index()].signature.with(component);
        let target = self.get_or_create(signature)?;
        self.tables[from.index()].add_edges.insert(component, target);
        self.tables[target.index()].remove_edges.insert(component, from);
        Ok(target)
    }

    fn remove_target(
        &mut self,
        from: ArchetypeId,
        component: ComponentTypeId,
    ) -> EcsResult<ArchetypeId> {
        if let Some(target) = self.tables[from.index()].remove_edges.get(&component) {
            return Ok(*target);
        }
        let signature = self.tables[from.index()].signature.without(component);
        let target = self.get_or_create(signature)?;
        self.tables[from.index()].remove_edges.insert(component, target);
        self.tables[target.index()].add_edges.insert(component, from);
        Ok(target)
    }

    fn get_or_create(&mut self, signature: ArchetypeSignature) -> EcsResult<ArchetypeId> {
        if let Some(id) = self.index.get(&signature) {
            return Ok(*id);
        }
        let raw = u32::try_from(self.tables.len()).map_err(|_| EcsError::ArchetypesExhausted)?;
        let id = ArchetypeId(raw);
        tracing::debug!(archetype = %id, components = ?signature.components(), "archetype created");
        self.index.insert(signature.clone(), id);
        self.tables.push(ArchetypeTable::new(id, signature));
        Ok(id)
    }

    fn attach(&mut self, id: EntityId, archetype: ArchetypeId, handles: &[ComponentHandle]) {
        let row = self.tables[archetype.index()].push_row(id, handles);
        let idx = id.index();
        if self.locations.len() <= idx {
            self.locations.resize(idx + 1, None);
        }
        self.locations[idx] = Some(EntityLocation { archetype, row });
    }

    fn detach(&mut self, id: EntityId, location: EntityLocation, out: &mut Vec<ComponentHandle>) {
        let table = &mut self.tables[location.archetype.index()];
        if let Some(moved) = table.swap_remove_row(location.row, out) {
            self.locations[moved.index()] = Some(location);
        }
        self.locations[id.index()] = None;
    }
}
