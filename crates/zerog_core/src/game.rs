//! # Game Orchestrator
//!
//! Owns every manager and runs the step loop:
//!
//! ```text
//! step(delta):
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. PHASES       PreStep -> Step -> PostStep                  │
//! │    └─ systems read committed state, enqueue operations       │
//! │ 2. PreApplyOperations                                        │
//! │ 3. FLUSH                                                     │
//! │    ├─ clear changed flags                                    │
//! │    ├─ apply every queued operation in FIFO order             │
//! │    └─ extend cached queries with new archetypes              │
//! │ 4. StepComplete                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutating calls (`create`, `destroy`, `add`, `remove`) only enqueue. All
//! structural effects of a step become visible together at the flush.

use tracing::{debug, info, trace, warn};

use crate::config::{GameConfig, GameConstants, Globals, SystemCleanup};
use crate::ecs::events::Subscribers;
use crate::ecs::{
    ArchetypeManager, Commands, ComponentHandle, ComponentManager, ComponentTypeId, EntityId,
    EntityMut, EntityRecord, EntityView, Fields, GameEvent, IdManager, Operation, OperationQueue,
    QueryFilter, QueryId, QueryIter, QueryManager, SubscriptionId,
};
use crate::error::{EcsError, EcsResult, FailedOperation};
use crate::memory::ObjectPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepState {
    Idle,
    Running,
    Flushing,
}

/// The ECS runtime.
///
/// # Example
///
/// ```rust
/// use zerog_core::{ComponentType, Fields, Game, GameConfig};
///
/// let mut defaults = Fields::new();
/// defaults.insert("x".into(), 0.0.into());
/// defaults.insert("y".into(), 0.0.into());
///
/// let config = GameConfig::new().with_component(ComponentType::new(0, "Position", defaults));
/// let mut game = Game::new(config).unwrap();
/// let position = game.component_type_id("Position").unwrap();
///
/// let id = game.create().unwrap();
/// let mut initial = Fields::new();
/// initial.insert("x".into(), 5.0.into());
/// game.add(id, position, Some(initial));
/// assert!(game.get(id).is_none()); // Not committed yet
///
/// game.step(10.0).unwrap();
/// let entity = game.get(id).unwrap();
/// assert_eq!(entity.get(position).unwrap().get_f64("x"), Some(5.0));
/// ```
pub struct Game {
    constants: GameConstants,
    globals: Globals,

    ids: IdManager,
    components: ComponentManager,
    archetypes: ArchetypeManager,
    queries: QueryManager,
    operations: OperationQueue,
    subscribers: Subscribers,
    entity_pool: ObjectPool<EntityRecord>,
    cleanups: Vec<SystemCleanup>,

    delta: f64,
    time: f64,
    frame: u64,
    state: StepState,
}

impl Game {
    /// Registers component types, then installs every system in order.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] for bad constants or component types, or
    /// whatever a system factory returns.
    pub fn new(config: GameConfig) -> EcsResult<Self> {
        let GameConfig {
            constants,
            components,
            systems,
            globals,
        } = config;
        constants.validate()?;

        let component_count = components.len();
        let mut game = Self {
            constants,
            globals,
            ids: IdManager::new(constants.max_entities),
            components: ComponentManager::new(components, constants.max_component_id)?,
            archetypes: ArchetypeManager::new(),
            queries: QueryManager::new(),
            operations: OperationQueue::new(),
            subscribers: Subscribers::default(),
            entity_pool: ObjectPool::new(EntityRecord::default),
            cleanups: Vec::with_capacity(systems.len()),
            delta: 0.0,
            time: 0.0,
            frame: 0,
            state: StepState::Idle,
        };

        let system_count = systems.len();
        for factory in systems {
            let cleanup = factory(&mut game)?;
            game.cleanups.push(cleanup);
        }

        info!(
            components = component_count,
            systems = system_count,
            max_entities = constants.max_entities,
            "game initialized"
        );
        Ok(game)
    }

    // =========================================================================
    // Deferred mutation
    // =========================================================================

    /// Enqueue handle borrowing the queue and id allocator.
    pub fn commands(&mut self) -> Commands<'_> {
        Commands::new(&mut self.operations, &mut self.ids)
    }

    /// Allocates an id now and enqueues the entity's creation.
    ///
    /// # Errors
    ///
    /// [`EcsError::IdsExhausted`] if every id is in use.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        self.commands().create()
    }

    /// Enqueues an entity's destruction.
    pub fn destroy(&mut self, entity: EntityId) {
        self.commands().destroy(entity);
    }

    /// Enqueues adding a component with optional initial values.
    pub fn add(
        &mut self,
        entity: EntityId,
        component_type: ComponentTypeId,
        initial_values: Option<Fields>,
    ) {
        self.commands().add(entity, component_type, initial_values);
    }

    /// Enqueues removing a component.
    pub fn remove(&mut self, entity: EntityId, component_type: ComponentTypeId) {
        self.commands().remove(entity, component_type);
    }

    /// Enqueues setting a changed flag.
    pub fn mark_changed(&mut self, component: ComponentHandle) {
        self.commands().mark_changed(component);
    }

    /// Enqueues a raw operation.
    pub fn enqueue_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    // =========================================================================
    // Committed state
    // =========================================================================

    /// A live entity, as of the last flush.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<EntityView<'_>> {
        if entity.is_null() {
            return None;
        }
        let row = self.archetypes.entity(entity)?;
        Some(EntityView::from_row(row, &self.components))
    }

    /// A live entity's component values, mutably.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<EntityMut<'_>> {
        if entity.is_null() {
            return None;
        }
        let row = self.archetypes.entity(entity)?;
        Some(EntityMut::from_row(row, &mut self.components))
    }

    /// Registers (or finds) a cached query.
    pub fn query(&mut self, filter: QueryFilter) -> QueryId {
        self.queries.register(filter, &self.archetypes)
    }

    /// Iterates the entities currently matching a query.
    #[must_use]
    pub fn iter(&self, query: QueryId) -> QueryIter<'_> {
        QueryIter::new(&self.archetypes, &self.components, self.queries.matched(query))
    }

    /// Visits every matching entity with mutable component access and an
    /// enqueue handle.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `f`.
    pub fn for_each_mut<F>(&mut self, query: QueryId, mut f: F) -> EcsResult<()>
    where
        F: FnMut(EntityMut<'_>, &mut Commands<'_>) -> EcsResult<()>,
    {
        let Self {
            archetypes,
            components,
            queries,
            operations,
            ids,
            ..
        } = self;
        let mut commands = Commands::new(operations, ids);

        for archetype in queries.matched(query) {
            let Some(table) = archetypes.table(*archetype) else {
                continue;
            };
            for (row, id) in table.entities().iter().enumerate() {
                f(EntityMut::new(*id, table, row, components), &mut commands)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to a step event. Callbacks run in registration order.
    ///
    /// A subscription added while its event is being dispatched first runs
    /// on the next dispatch.
    pub fn on<F>(&mut self, event: GameEvent, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut Game) -> EcsResult<()> + Send + Sync + 'static,
    {
        self.subscribers.subscribe(event, Box::new(callback))
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Number of live subscriptions for an event.
    #[must_use]
    pub fn subscriber_count(&self, event: GameEvent) -> usize {
        self.subscribers.len(event)
    }

    fn emit(&mut self, event: GameEvent) -> EcsResult<()> {
        let mut list = self.subscribers.take(event);
        let mut result = Ok(());
        for (_, callback) in &mut list {
            if let Err(error) = callback(self) {
                result = Err(error);
                break;
            }
        }
        self.subscribers.restore(event, list);
        result
    }

    // =========================================================================
    // Step loop
    // =========================================================================

    /// Runs one step.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvariantViolation`] if called from inside a step
    /// - the first error returned by a subscriber (the step stops there and
    ///   queued operations wait for the next flush)
    /// - [`EcsError::Flush`] if any queued operation failed; every other
    ///   operation was applied and `StepComplete` still fired. This takes
    ///   precedence over an error from a `StepComplete` subscriber.
    pub fn step(&mut self, delta: f64) -> EcsResult<()> {
        if self.state != StepState::Idle {
            return Err(EcsError::InvariantViolation(
                "step called while a step is in progress",
            ));
        }
        self.state = StepState::Running;
        let result = self.run_step(delta);
        self.state = StepState::Idle;
        result
    }

    fn run_step(&mut self, delta: f64) -> EcsResult<()> {
        self.delta = delta;
        self.time += delta;
        self.frame += 1;

        for phase in GameEvent::PHASES {
            self.emit(phase)?;
        }
        self.emit(GameEvent::PreApplyOperations)?;

        self.state = StepState::Flushing;
        let flushed = self.flush_operations();
        self.state = StepState::Running;

        let completed = self.emit(GameEvent::StepComplete);
        if let (Err(_), Err(error)) = (&flushed, &completed) {
            warn!(%error, "step_complete subscriber failed after a failed flush");
        }
        flushed.and(completed)
    }

    fn flush_operations(&mut self) -> EcsResult<()> {
        self.components.clear_changed();

        let mut pending = self.operations.take();
        let total = pending.len();
        let mut failures = Vec::new();

        for operation in pending.drain(..) {
            if operation.targets_null() {
                trace!(%operation, "skipped: null entity");
                continue;
            }
            trace!(%operation, "applying");
            if let Err(error) = self.apply_operation(&operation) {
                warn!(%operation, %error, "queued operation failed");
                failures.push(FailedOperation { operation, error });
            }
        }
        self.operations.restore(pending);
        self.queries.refresh(&self.archetypes);

        debug!(
            frame = self.frame,
            applied = total - failures.len(),
            failed = failures.len(),
            live = self.archetypes.live_count(),
            "operations flushed"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EcsError::Flush { failures })
        }
    }

    fn apply_operation(&mut self, operation: &Operation) -> EcsResult<()> {
        match operation {
            Operation::CreateEntity { entity } => {
                let max_entities = self.ids.max_entities();
                if entity.raw() >= max_entities {
                    return Err(EcsError::EntityOutOfRange {
                        entity: *entity,
                        max_entities,
                    });
                }
                self.archetypes.create_entity(*entity)?;
                // No-op for ids handed out by `create`; records raw ids.
                self.ids.reserve(*entity);
                Ok(())
            }
            Operation::DestroyEntity { entity } => self.apply_destroy(*entity),
            Operation::AddComponent {
                entity,
                component_type,
                initial_values,
            } => {
                self.archetypes.ensure_can_add(*entity, *component_type)?;
                let handle = self
                    .components
                    .acquire(*component_type, initial_values.as_ref())?;
                if let Err(error) = self.archetypes.add_component(*entity, handle) {
                    self.components.release(handle)?;
                    return Err(error);
                }
                Ok(())
            }
            Operation::RemoveComponent {
                entity,
                component_type,
            } => {
                let handle = self.archetypes.remove_component(*entity, *component_type)?;
                self.components.release(handle)
            }
            Operation::MarkChanged { component } => self.components.mark_changed(*component),
        }
    }

    fn apply_destroy(&mut self, entity: EntityId) -> EcsResult<()> {
        let mut record = self.entity_pool.acquire()?;
        let mut result = self.archetypes.destroy_entity(entity, &mut record);
        if result.is_ok() {
            for handle in record.components.drain(..) {
                if let Err(error) = self.components.release(handle) {
                    result = Err(error);
                }
            }
            self.ids.release(entity);
        }
        record.reset();
        self.entity_pool.release(record);
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Delta passed to the current (or last) step.
    #[inline]
    #[must_use]
    pub const fn delta(&self) -> f64 {
        self.delta
    }

    /// Sum of every delta so far.
    #[inline]
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Number of steps started.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Id-space bounds.
    #[must_use]
    pub const fn constants(&self) -> &GameConstants {
        &self.constants
    }

    /// Game-wide key/value state.
    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Game-wide key/value state, mutably.
    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.globals
    }

    /// Looks up a component type id by name.
    #[must_use]
    pub fn component_type_id(&self, name: &str) -> Option<ComponentTypeId> {
        self.components.lookup(name)
    }

    /// Number of live entities.
    #[must_use]
    pub const fn live_entities(&self) -> usize {
        self.archetypes.live_count()
    }

    /// Number of operations waiting for the next flush.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    /// Archetype storage.
    #[must_use]
    pub const fn archetypes(&self) -> &ArchetypeManager {
        &self.archetypes
    }

    /// Component registry and instance pools.
    #[must_use]
    pub const fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// Entity id allocator.
    #[must_use]
    pub const fn ids(&self) -> &IdManager {
        &self.ids
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        let cleanups = std::mem::take(&mut self.cleanups);
        for cleanup in cleanups {
            cleanup(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::ecs::ComponentType;

    fn position() -> ComponentType {
        let mut defaults = Fields::new();
        defaults.insert("x".into(), 0.0.into());
        defaults.insert("y".into(), 0.0.into());
        ComponentType::new(0, "Position", defaults)
    }

    fn game() -> Game {
        Game::new(GameConfig::new().with_component(position())).unwrap()
    }

    #[test]
    fn test_mutations_are_deferred() {
        let mut game = game();
        let id = game.create().unwrap();
        assert_eq!(id.raw(), 1);
        assert!(game.get(id).is_none());
        assert_eq!(game.pending_operations(), 1);

        game.step(1.0).unwrap();
        assert!(game.get(id).is_some());
        assert_eq!(game.pending_operations(), 0);
        assert_eq!(game.frame(), 1);
    }

    #[test]
    fn test_flush_collects_failures() {
        let mut game = game();
        let pos = ComponentTypeId::new(0);
        let id = game.create().unwrap();
        game.add(id, pos, None);
        game.add(id, pos, None);
        game.remove(EntityId::new(40), pos);

        let err = game.step(1.0).unwrap_err();
        let failures = err.failures();
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0].error, EcsError::DuplicateComponent { .. }));
        assert!(matches!(failures[1].error, EcsError::EntityNotLive(_)));
        assert_eq!(game.components().live_count(pos), 1);
    }

    #[test]
    fn test_reentrant_step_is_rejected() {
        let mut game = game();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        game.on(GameEvent::Step, move |game| {
            *sink.lock().unwrap() = Some(game.step(1.0).is_err());
            Ok(())
        });

        game.step(1.0).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_subscriber_error_aborts_step() {
        let mut game = game();
        let id = game.create().unwrap();
        game.on(GameEvent::PostStep, |_| {
            Err(EcsError::InvariantViolation("stop"))
        });

        assert!(game.step(1.0).is_err());
        assert!(game.get(id).is_none());
        assert_eq!(game.pending_operations(), 1);
    }

    #[test]
    fn test_cleanups_run_on_drop() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&ran), Arc::clone(&ran));
        let config = GameConfig::new()
            .with_system(move |_| Ok(Box::new(move |_: &mut Game| a.lock().unwrap().push(1)) as SystemCleanup))
            .with_system(move |_| Ok(Box::new(move |_: &mut Game| b.lock().unwrap().push(2)) as SystemCleanup));

        drop(Game::new(config).unwrap());
        assert_eq!(*ran.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_globals_are_shared_world_state() {
        let config = GameConfig::new().with_global("gravity", 9.8);
        let mut game = Game::new(config).unwrap();
        game.on(GameEvent::Step, |game| {
            let ticks = game.globals().get("ticks").and_then(toml::Value::as_integer);
            game.globals_mut().insert("ticks".into(), (ticks.unwrap_or(0) + 1).into());
            Ok(())
        });

        game.step(1.0).unwrap();
        game.step(1.0).unwrap();
        assert_eq!(game.globals()["ticks"].as_integer(), Some(2));
        assert_eq!(game.globals()["gravity"].as_float(), Some(9.8));
    }
}
