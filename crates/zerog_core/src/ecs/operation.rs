//! # Deferred Operations
//!
//! Structural changes are queued as [`Operation`]s and applied in FIFO order
//! at the single flush point of each step.

use std::collections::VecDeque;
use std::fmt;

use super::component::{ComponentHandle, ComponentTypeId, Fields};
use super::entity::{EntityId, IdManager};
use crate::error::EcsResult;

/// A deferred mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Register a bare entity in the empty archetype.
    CreateEntity {
        /// Id allocated at enqueue time.
        entity: EntityId,
    },
    /// Remove an entity, release its components and recycle its id.
    DestroyEntity {
        /// Target entity.
        entity: EntityId,
    },
    /// Acquire an instance and migrate the entity to include its type.
    AddComponent {
        /// Target entity.
        entity: EntityId,
        /// Type to add.
        component_type: ComponentTypeId,
        /// Shallow overrides applied over the type's defaults.
        initial_values: Option<Fields>,
    },
    /// Migrate the entity out of a type and release the instance.
    RemoveComponent {
        /// Target entity.
        entity: EntityId,
        /// Type to remove.
        component_type: ComponentTypeId,
    },
    /// Set an instance's changed flag.
    MarkChanged {
        /// Target instance.
        component: ComponentHandle,
    },
}

impl Operation {
    /// Target entity, if the operation addresses one.
    #[must_use]
    pub const fn entity(&self) -> Option<EntityId> {
        match self {
            Self::CreateEntity { entity }
            | Self::DestroyEntity { entity }
            | Self::AddComponent { entity, .. }
            | Self::RemoveComponent { entity, .. } => Some(*entity),
            Self::MarkChanged { .. } => None,
        }
    }

    /// Checks if the operation addresses the reserved null entity.
    #[must_use]
    pub const fn targets_null(&self) -> bool {
        match self.entity() {
            Some(entity) => entity.is_null(),
            None => false,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateEntity { entity } => write!(f, "create {entity}"),
            Self::DestroyEntity { entity } => write!(f, "destroy {entity}"),
            Self::AddComponent {
                entity,
                component_type,
                ..
            } => write!(f, "add {component_type} to {entity}"),
            Self::RemoveComponent {
                entity,
                component_type,
            } => write!(f, "remove {component_type} from {entity}"),
            Self::MarkChanged { component } => write!(f, "mark {component} changed"),
        }
    }
}

/// FIFO list of pending operations.
#[derive(Debug, Default)]
pub struct OperationQueue {
    pending: VecDeque<Operation>,
}

impl OperationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    #[inline]
    pub fn push(&mut self, operation: Operation) {
        self.pending.push_back(operation);
    }

    /// Number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Checks if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending operations in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.pending.iter()
    }

    /// Takes every pending operation, leaving the queue empty.
    pub(crate) fn take(&mut self) -> VecDeque<Operation> {
        std::mem::take(&mut self.pending)
    }

    /// Hands back a drained buffer so its allocation is reused.
    ///
    /// The buffer is only swapped in while the queue is empty, so nothing
    /// queued since `take` is dropped.
    pub(crate) fn restore(&mut self, mut buffer: VecDeque<Operation>) {
        if self.pending.is_empty() {
            buffer.clear();
            self.pending = buffer;
        }
    }
}

/// Enqueue handle that can live alongside mutable component access.
///
/// Ids are allocated immediately so callers can refer to an entity before it
/// is committed.
pub struct Commands<'a> {
    queue: &'a mut OperationQueue,
    ids: &'a mut IdManager,
}

impl<'a> Commands<'a> {
    pub(crate) fn new(queue: &'a mut OperationQueue, ids: &'a mut IdManager) -> Self {
        Self { queue, ids }
    }

    /// Allocates an id and enqueues its creation.
    ///
    /// # Errors
    ///
    /// [`crate::EcsError::IdsExhausted`] if no id is free.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        let entity = self.ids.get()?;
        self.queue.push(Operation::CreateEntity { entity });
        Ok(entity)
    }

    /// Enqueues an entity's destruction.
    pub fn destroy(&mut self, entity: EntityId) {
        self.queue.push(Operation::DestroyEntity { entity });
    }

    /// Enqueues adding a component.
    pub fn add(
        &mut self,
        entity: EntityId,
        component_type: ComponentTypeId,
        initial_values: Option<Fields>,
    ) {
        self.queue.push(Operation::AddComponent {
            entity,
            component_type,
            initial_values,
        });
    }

    /// Enqueues removing a component.
    pub fn remove(&mut self, entity: EntityId, component_type: ComponentTypeId) {
        self.queue.push(Operation::RemoveComponent {
            entity,
            component_type,
        });
    }

    /// Enqueues setting a changed flag.
    pub fn mark_changed(&mut self, component: ComponentHandle) {
        self.queue.push(Operation::MarkChanged { component });
    }

    /// Enqueues a raw operation.
    pub fn enqueue(&mut self, operation: Operation) {
        self.queue.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_allocate_ids_now() {
        let mut queue = OperationQueue::new();
        let mut ids = IdManager::new(16);
        let mut commands = Commands::new(&mut queue, &mut ids);

        let a = commands.create().unwrap();
        let b = commands.create().unwrap();
        commands.add(a, ComponentTypeId::new(0), None);
        commands.destroy(b);

        assert_eq!((a.raw(), b.raw()), (1, 2));
        let ops: Vec<_> = queue.iter().cloned().collect();
        assert_eq!(
            ops,
            vec![
                Operation::CreateEntity { entity: a },
                Operation::CreateEntity { entity: b },
                Operation::AddComponent {
                    entity: a,
                    component_type: ComponentTypeId::new(0),
                    initial_values: None,
                },
                Operation::DestroyEntity { entity: b },
            ]
        );
    }

    #[test]
    fn test_take_and_restore() {
        let mut queue = OperationQueue::new();
        queue.push(Operation::DestroyEntity {
            entity: EntityId::new(3),
        });
        let taken = queue.take();
        assert_eq!(taken.len(), 1);
        assert!(queue.is_empty());

        queue.restore(taken);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_null_target() {
        let op = Operation::RemoveComponent {
            entity: EntityId::NULL,
            component_type: ComponentTypeId::new(1),
        };
        assert!(op.targets_null());
        assert_eq!(op.to_string(), "remove #1 from 0");
    }
}
