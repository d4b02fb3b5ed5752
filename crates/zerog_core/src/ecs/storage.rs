//! # Component Storage
//!
//! The registry of component types and the pooled instances behind every
//! [`ComponentHandle`].
//!
//! - One [`SlotArena`] per registered type, indexed by type id
//! - Released instances are reset to defaults in place and reused
//! - Changed flags are tracked in a side list so clearing is O(changed)

use std::collections::HashMap;

use super::component::{ComponentHandle, ComponentInstance, ComponentType, ComponentTypeId, Fields};
use crate::error::{EcsError, EcsResult};
use crate::memory::SlotArena;

/// Instances of one registered type.
struct ComponentStore {
    descriptor: ComponentType,
    instances: SlotArena<ComponentInstance>,
}

/// Registry and instance pools for every component type.
pub struct ComponentManager {
    /// Indexed by type id; `None` for unregistered ids.
    stores: Vec<Option<ComponentStore>>,
    /// Name → id lookup.
    names: HashMap<String, ComponentTypeId>,
    /// Handles whose changed flag is set.
    changed: Vec<ComponentHandle>,
}

impl ComponentManager {
    /// Registers every type, validating ids against `max_component_id`.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] for an out-of-range id, a duplicate id or a
    /// duplicate name.
    pub fn new(types: Vec<ComponentType>, max_component_id: u16) -> EcsResult<Self> {
        let mut stores: Vec<Option<ComponentStore>> = Vec::new();
        let mut names = HashMap::with_capacity(types.len());

        for descriptor in types {
            let id = descriptor.id;
            if id.raw() >= max_component_id {
                return Err(EcsError::InvalidConfig(format!(
                    "component `{}` has id {} but max_component_id is {max_component_id}",
                    descriptor.name,
                    id.raw()
                )));
            }
            if stores.len() <= id.index() {
                stores.resize_with(id.index() + 1, || None);
            }
            if stores[id.index()].is_some() {
                return Err(EcsError::InvalidConfig(format!(
                    "component id {} registered twice",
                    id.raw()
                )));
            }
            if names.insert(descriptor.name.clone(), id).is_some() {
                return Err(EcsError::InvalidConfig(format!(
                    "component name `{}` registered twice",
                    descriptor.name
                )));
            }
            stores[id.index()] = Some(ComponentStore {
                instances: SlotArena::new(descriptor.pool_limit),
                descriptor,
            });
        }

        Ok(Self {
            stores,
            names,
            changed: Vec::new(),
        })
    }

    fn store(&self, id: ComponentTypeId) -> Option<&ComponentStore> {
        self.stores.get(id.index())?.as_ref()
    }

    fn store_mut(&mut self, id: ComponentTypeId) -> EcsResult<&mut ComponentStore> {
        self.stores
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(EcsError::UnknownComponent(id))
    }

    /// Descriptor of a registered type.
    #[must_use]
    pub fn component_type(&self, id: ComponentTypeId) -> Option<&ComponentType> {
        self.store(id).map(|s| &s.descriptor)
    }

    /// Looks up a type id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ComponentTypeId> {
        self.names.get(name).copied()
    }

    /// Iterates over every registered descriptor in id order.
    pub fn types(&self) -> impl Iterator<Item = &ComponentType> {
        self.stores.iter().flatten().map(|s| &s.descriptor)
    }

    /// Number of live instances of a type.
    #[must_use]
    pub fn live_count(&self, id: ComponentTypeId) -> usize {
        self.store(id).map_or(0, |s| s.instances.len())
    }

    /// Number of released instances of a type waiting for reuse.
    #[must_use]
    pub fn pooled_count(&self, id: ComponentTypeId) -> usize {
        self.store(id).map_or(0, |s| s.instances.free_count())
    }

    /// Takes an instance from the type's pool (or builds one), applies the
    /// initial values over the defaults and marks it changed.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`], [`EcsError::UnknownField`] for an
    /// initial value outside the schema, [`EcsError::PoolExhausted`] when the
    /// type's pool limit is reached.
    pub fn acquire(
        &mut self,
        id: ComponentTypeId,
        initial: Option<&Fields>,
    ) -> EcsResult<ComponentHandle> {
        let ComponentStore {
            descriptor,
            instances,
        } = self.store_mut(id)?;

        if let Some(values) = initial {
            descriptor.check_fields(values)?;
        }

        let (slot, instance) =
            instances.acquire_with(|| ComponentInstance::new(id, descriptor.defaults.clone()))?;
        if let Some(values) = initial {
            instance.overlay(values);
        }
        instance.set_changed(true);

        let handle = ComponentHandle::new(id, slot);
        self.changed.push(handle);
        Ok(handle)
    }

    /// Resets an instance to its defaults and returns it to the pool.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if the handle was already released.
    pub fn release(&mut self, handle: ComponentHandle) -> EcsResult<()> {
        let ComponentStore {
            descriptor,
            instances,
        } = self.store_mut(handle.component_type())?;
        let instance = instances
            .release(handle.slot())
            .ok_or(EcsError::StaleHandle(handle))?;
        instance.reset(&descriptor.defaults);
        Ok(())
    }

    /// Gets the instance behind a live handle.
    #[must_use]
    pub fn get(&self, handle: ComponentHandle) -> Option<&ComponentInstance> {
        self.store(handle.component_type())?
            .instances
            .get(handle.slot())
    }

    /// Gets the instance behind a live handle, mutably.
    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut ComponentInstance> {
        self.stores
            .get_mut(handle.component_type().index())?
            .as_mut()?
            .instances
            .get_mut(handle.slot())
    }

    /// Sets the changed flag of a live instance.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleHandle`] if the handle was released.
    pub fn mark_changed(&mut self, handle: ComponentHandle) -> EcsResult<()> {
        let instance = self.get_mut(handle).ok_or(EcsError::StaleHandle(handle))?;
        if !instance.is_changed() {
            instance.set_changed(true);
            self.changed.push(handle);
        }
        Ok(())
    }

    /// Handles whose changed flag is currently set.
    #[must_use]
    pub fn changed(&self) -> &[ComponentHandle] {
        &self.changed
    }

    /// Clears every changed flag.
    pub fn clear_changed(&mut self) {
        let mut changed = std::mem::take(&mut self.changed);
        for handle in changed.drain(..) {
            // Released handles are stale; their slot was already reset.
            if let Some(instance) = self.get_mut(handle) {
                instance.set_changed(false);
            }
        }
        self.changed = changed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> ComponentType {
        let mut defaults = Fields::new();
        defaults.insert("x".into(), 0.0.into());
        defaults.insert("y".into(), 0.0.into());
        ComponentType::new(0, "Position", defaults)
    }

    fn manager() -> ComponentManager {
        ComponentManager::new(vec![position()], 256).unwrap()
    }

    fn fields(pairs: &[(&str, f64)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), toml::Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_registry_validation() {
        assert!(matches!(
            ComponentManager::new(vec![ComponentType::new(300, "Far", Fields::new())], 256),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            ComponentManager::new(vec![position(), ComponentType::new(0, "Other", Fields::new())], 256),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            ComponentManager::new(vec![position(), ComponentType::new(1, "Position", Fields::new())], 256),
            Err(EcsError::InvalidConfig(_))
        ));

        let manager = manager();
        assert_eq!(manager.lookup("Position"), Some(ComponentTypeId::new(0)));
        assert_eq!(manager.types().count(), 1);
    }

    #[test]
    fn test_acquire_overlays_initial_values() {
        let mut manager = manager();
        let id = ComponentTypeId::new(0);

        let handle = manager.acquire(id, Some(&fields(&[("x", 5.0)]))).unwrap();
        let instance = manager.get(handle).unwrap();
        assert_eq!(instance.get_f64("x"), Some(5.0));
        assert_eq!(instance.get_f64("y"), Some(0.0));
        assert!(instance.is_changed());
    }

    #[test]
    fn test_acquire_rejects_unknown_field() {
        let mut manager = manager();
        let err = manager
            .acquire(ComponentTypeId::new(0), Some(&fields(&[("z", 1.0)])))
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownField { .. }));
        assert_eq!(manager.live_count(ComponentTypeId::new(0)), 0);
    }

    #[test]
    fn test_release_then_acquire_yields_defaults() {
        let mut manager = manager();
        let id = ComponentTypeId::new(0);

        let first = manager.acquire(id, Some(&fields(&[("x", 5.0), ("y", 7.0)]))).unwrap();
        manager.release(first).unwrap();
        assert_eq!(manager.pooled_count(id), 1);

        let second = manager.acquire(id, None).unwrap();
        assert_eq!(first.slot().index(), second.slot().index());
        let instance = manager.get(second).unwrap();
        assert_eq!(instance.fields(), &position().defaults);

        assert!(manager.get(first).is_none());
        assert!(matches!(manager.release(first), Err(EcsError::StaleHandle(_))));
    }

    #[test]
    fn test_changed_flags() {
        let mut manager = manager();
        let id = ComponentTypeId::new(0);
        let handle = manager.acquire(id, None).unwrap();

        manager.clear_changed();
        assert!(!manager.get(handle).unwrap().is_changed());
        assert!(manager.changed().is_empty());

        manager.mark_changed(handle).unwrap();
        manager.mark_changed(handle).unwrap();
        assert_eq!(manager.changed().len(), 1);
        assert!(manager.get(handle).unwrap().is_changed());
    }

    #[test]
    fn test_pool_limit() {
        let mut manager =
            ComponentManager::new(vec![position().with_pool_limit(1)], 256).unwrap();
        let id = ComponentTypeId::new(0);
        let _held = manager.acquire(id, None).unwrap();
        assert!(matches!(
            manager.acquire(id, None),
            Err(EcsError::PoolExhausted { capacity: 1 })
        ));
    }

    #[test]
    fn test_unknown_component() {
        let mut manager = manager();
        assert!(matches!(
            manager.acquire(ComponentTypeId::new(9), None),
            Err(EcsError::UnknownComponent(_))
        ));
    }
}
