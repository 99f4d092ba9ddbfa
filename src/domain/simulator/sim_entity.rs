use std::any::Any;

use crate::domain::simulator::event_queue::EventQueue;
use crate::domain::simulator::sim_event::SimEvent;
use crate::domain::simulator::sim_message::SimMessage;
use crate::domain::simulator::simulation::SimCore;

slotmap::new_key_type! {
    /// Handle of an entity registered with a [`Simulation`](crate::domain::simulator::simulation::Simulation).
    pub struct EntityId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Created,
    Running,
    /// Idle until the next event addressed to it arrives.
    Waiting,
    Finished,
}

/// An active object of the simulation. Entities only interact by scheduling events through the
/// [`SimContext`] they are handed in every hook.
pub trait SimEntity: Any + Send + std::fmt::Debug {
    /// Called once when the simulation starts, in registration order.
    fn on_start(&mut self, ctx: &mut SimContext);

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent);

    /// Called once when the simulation ends.
    fn on_shutdown(&mut self, _ctx: &mut SimContext) {}

    /// Work the entity still expected to do when the simulation ran out of events.
    fn has_pending_work(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The view of the engine an entity gets while one of its hooks runs.
pub struct SimContext<'a> {
    core: &'a mut SimCore,
    me: EntityId,
    waiting: bool,
}

impl<'a> SimContext<'a> {
    pub(crate) fn new(core: &'a mut SimCore, me: EntityId) -> Self {
        Self { core, me, waiting: false }
    }

    pub(crate) fn wants_to_wait(&self) -> bool {
        self.waiting
    }

    pub fn clock(&self) -> f64 {
        self.core.clock
    }

    pub fn id(&self) -> EntityId {
        self.me
    }

    pub fn name(&self) -> &str {
        self.core.name_of(self.me).unwrap_or("<unregistered>")
    }

    /// Sends `message` to `destination`, due `delay` time units from now.
    ///
    /// Panics on a negative or NaN delay, or if `destination` is not registered.
    pub fn schedule(&mut self, destination: EntityId, delay: f64, message: SimMessage) {
        self.core.schedule(self.me, destination, delay, message);
    }

    pub fn schedule_now(&mut self, destination: EntityId, message: SimMessage) {
        self.schedule(destination, 0.0, message);
    }

    pub fn schedule_self(&mut self, delay: f64, message: SimMessage) {
        self.schedule(self.me, delay, message);
    }

    /// Removes this entity's own undispatched events matching the predicate and returns how many
    /// were removed. Events sent by other entities are never touched.
    pub fn cancel_own(&mut self, mut predicate: impl FnMut(&SimEvent) -> bool) -> usize {
        let me = self.me;
        let mut own = |event: &SimEvent| event.source == me && predicate(event);
        let removed = self.core.future.remove_if(&mut own).len() + self.core.deferred.remove_if(&mut own).len();
        if removed > 0 {
            log::trace!("{:.2}: {} canceled {} of its pending event(s).", self.core.clock, self.name(), removed);
        }
        removed
    }

    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.core.id_of(name)
    }

    pub fn name_of(&self, id: EntityId) -> Option<&str> {
        self.core.name_of(id)
    }

    /// Counts undispatched events of both queues matching the predicate.
    pub fn count_events(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.core.count_events(predicate)
    }

    /// Ends the simulation once the current batch of events has been dispatched.
    pub fn terminate(&mut self) {
        self.core.termination_requested = true;
    }

    /// Marks this entity as waiting; it becomes running again with its next event.
    pub fn set_waiting(&mut self) {
        self.waiting = true;
    }
}
