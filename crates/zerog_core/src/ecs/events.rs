//! # Step Events
//!
//! Every step emits, in order:
//!
//! ```text
//! PreStep -> Step -> PostStep -> PreApplyOperations -> [flush] -> StepComplete
//! ```
//!
//! Each event has its own ordered subscriber list. Callbacks run
//! synchronously in registration order and receive the whole game.

use std::collections::HashMap;
use std::fmt;

use crate::error::EcsResult;
use crate::game::Game;

/// Notifications emitted once per step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameEvent {
    // =========================================================================
    // Phases (no structural change from this step is visible)
    // =========================================================================
    /// First phase.
    PreStep,
    /// Main phase.
    Step,
    /// Last phase.
    PostStep,

    // =========================================================================
    // Flush boundary
    // =========================================================================
    /// Last chance to enqueue operations for this step's flush.
    PreApplyOperations,
    /// The flush has been applied.
    StepComplete,
}

impl GameEvent {
    /// The three ordered phases.
    pub const PHASES: [Self; 3] = [Self::PreStep, Self::Step, Self::PostStep];

    /// Every event in emission order.
    pub const ALL: [Self; 5] = [
        Self::PreStep,
        Self::Step,
        Self::PostStep,
        Self::PreApplyOperations,
        Self::StepComplete,
    ];

    const fn index(self) -> usize {
        match self {
            Self::PreStep => 0,
            Self::Step => 1,
            Self::PostStep => 2,
            Self::PreApplyOperations => 3,
            Self::StepComplete => 4,
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreStep => "pre_step",
            Self::Step => "step",
            Self::PostStep => "post_step",
            Self::PreApplyOperations => "pre_apply_operations",
            Self::StepComplete => "step_complete",
        };
        f.write_str(name)
    }
}

/// Handle returned by [`Game::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A step callback. Returning `Err` aborts the step.
pub type Subscriber = Box<dyn FnMut(&mut Game) -> EcsResult<()> + Send + Sync>;

/// A subscriber list taken out for dispatch.
pub(crate) type Dispatch = Vec<(SubscriptionId, Subscriber)>;

/// Per-event ordered subscriber lists.
#[derive(Default)]
pub(crate) struct Subscribers {
    lists: [Dispatch; 5],
    /// Live subscriptions and the event each belongs to.
    owners: HashMap<SubscriptionId, GameEvent>,
    next_id: u64,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, event: GameEvent, callback: Subscriber) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.lists[event.index()].push((id, callback));
        self.owners.insert(id, event);
        id
    }

    /// Removes a subscription. A list that is out for dispatch drops it on
    /// [`Self::restore`].
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(event) = self.owners.remove(&id) else {
            return false;
        };
        self.lists[event.index()].retain(|(sub, _)| *sub != id);
        true
    }

    pub(crate) fn len(&self, event: GameEvent) -> usize {
        self.owners.values().filter(|e| **e == event).count()
    }

    /// Takes an event's list out so callbacks can borrow the game mutably.
    pub(crate) fn take(&mut self, event: GameEvent) -> Dispatch {
        std::mem::take(&mut self.lists[event.index()])
    }

    /// Puts a dispatched list back. Subscriptions added during dispatch go
    /// after it; ones removed during dispatch are dropped.
    pub(crate) fn restore(&mut self, event: GameEvent, mut list: Dispatch) {
        let owners = &self.owners;
        list.retain(|(id, _)| owners.contains_key(id));
        let added = std::mem::take(&mut self.lists[event.index()]);
        list.extend(added);
        self.lists[event.index()] = list;
    }
}
