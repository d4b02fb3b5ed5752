//! # Entity Views
//!
//! Borrowed views of one committed row. They borrow the game, so no view can
//! outlive a flush that might move the row.

use serde::de::DeserializeOwned;

use super::archetype::{ArchetypeSignature, ArchetypeTable, EntityRow};
use super::component::{ComponentHandle, ComponentInstance, ComponentTypeId};
use super::entity::EntityId;
use super::storage::ComponentManager;
use crate::error::{EcsError, EcsResult};

/// Read-only view of a live entity.
#[derive(Clone, Copy)]
pub struct EntityView<'a> {
    id: EntityId,
    table: &'a ArchetypeTable,
    row: usize,
    components: &'a ComponentManager,
}

impl<'a> EntityView<'a> {
    pub(crate) fn new(
        id: EntityId,
        table: &'a ArchetypeTable,
        row: usize,
        components: &'a ComponentManager,
    ) -> Self {
        Self {
            id,
            table,
            row,
            components,
        }
    }

    pub(crate) fn from_row(row: EntityRow<'a>, components: &'a ComponentManager) -> Self {
        Self::new(row.id, row.table, row.row, components)
    }

    /// The entity id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Component types the entity holds.
    #[must_use]
    pub fn signature(&self) -> &'a ArchetypeSignature {
        self.table.signature()
    }

    /// Checks if the entity holds a component type.
    #[must_use]
    pub fn has(&self, component: ComponentTypeId) -> bool {
        self.table.signature().contains(component)
    }

    /// Handle of one component, for `mark_changed`.
    #[must_use]
    pub fn handle(&self, component: ComponentTypeId) -> Option<ComponentHandle> {
        self.table.handle(self.row, component)
    }

    /// One component instance.
    #[must_use]
    pub fn get(&self, component: ComponentTypeId) -> Option<&'a ComponentInstance> {
        self.components.get(self.handle(component)?)
    }

    /// Every component instance, in type id order.
    pub fn components(&self) -> impl Iterator<Item = &'a ComponentInstance> + 'a {
        let components = self.components;
        self.table
            .row(self.row)
            .filter_map(move |handle| components.get(handle))
    }

    /// Decodes one component into a Rust value.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if absent, [`EcsError::Decode`] on a
    /// schema mismatch.
    pub fn decode<T: DeserializeOwned>(&self, component: ComponentTypeId) -> EcsResult<T> {
        self.get(component)
            .ok_or(EcsError::MissingComponent {
                entity: self.id,
                component,
            })?
            .decode()
    }
}

impl std::fmt::Debug for EntityView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityView")
            .field("id", &self.id)
            .field("components", &self.signature().components())
            .finish()
    }
}

/// Mutable view of a live entity's component values.
///
/// Only field values can change through it. Structural changes go through
/// the operation queue.
pub struct EntityMut<'a> {
    id: EntityId,
    table: &'a ArchetypeTable,
    row: usize,
    components: &'a mut ComponentManager,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(
        id: EntityId,
        table: &'a ArchetypeTable,
        row: usize,
        components: &'a mut ComponentManager,
    ) -> Self {
        Self {
            id,
            table,
            row,
            components,
        }
    }

    pub(crate) fn from_row(row: EntityRow<'a>, components: &'a mut ComponentManager) -> Self {
        Self::new(row.id, row.table, row.row, components)
    }

    /// The entity id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Checks if the entity holds a component type.
    #[must_use]
    pub fn has(&self, component: ComponentTypeId) -> bool {
        self.table.signature().contains(component)
    }

    /// Handle of one component.
    #[must_use]
    pub fn handle(&self, component: ComponentTypeId) -> Option<ComponentHandle> {
        self.table.handle(self.row, component)
    }

    /// One component instance.
    #[must_use]
    pub fn get(&self, component: ComponentTypeId) -> Option<&ComponentInstance> {
        self.components.get(self.handle(component)?)
    }

    /// One component instance, mutably.
    pub fn get_mut(&mut self, component: ComponentTypeId) -> Option<&mut ComponentInstance> {
        let handle = self.handle(component)?;
        self.components.get_mut(handle)
    }

    /// Sets one field of one component.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] or [`EcsError::UnknownField`].
    pub fn set(
        &mut self,
        component: ComponentTypeId,
        field: &str,
        value: impl Into<toml::Value>,
    ) -> EcsResult<()> {
        let entity = self.id;
        self.get_mut(component)
            .ok_or(EcsError::MissingComponent { entity, component })?
            .set(field, value)
    }

    /// Decodes one component into a Rust value.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] or [`EcsError::Decode`].
    pub fn decode<T: DeserializeOwned>(&self, component: ComponentTypeId) -> EcsResult<T> {
        self.get(component)
            .ok_or(EcsError::MissingComponent {
                entity: self.id,
                component,
            })?
            .decode()
    }

    /// Overwrites one component from a Rust value.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`], [`EcsError::Encode`] or
    /// [`EcsError::UnknownField`].
    pub fn encode<T: serde::Serialize>(
        &mut self,
        component: ComponentTypeId,
        value: &T,
    ) -> EcsResult<()> {
        let entity = self.id;
        self.get_mut(component)
            .ok_or(EcsError::MissingComponent { entity, component })?
            .encode(value)
    }
}
