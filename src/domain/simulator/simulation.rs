use bimap::BiMap;
use slotmap::{Key, SlotMap};

use crate::domain::simulator::event_queue::{DeferredQueue, EventQueue, FutureQueue};
use crate::domain::simulator::sim_entity::{EntityId, EntityState, SimContext, SimEntity};
use crate::domain::simulator::sim_event::SimEvent;
use crate::domain::simulator::sim_message::SimMessage;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Initialized,
    Running,
    Paused,
    Terminated,
}

/// Engine state entities may touch through their [`SimContext`].
#[derive(Debug, Default)]
pub struct SimCore {
    pub(crate) clock: f64,
    pub(crate) future: FutureQueue,
    pub(crate) deferred: DeferredQueue,
    next_serial: u64,
    registry: BiMap<EntityId, String>,
    pub(crate) termination_requested: bool,
}

impl SimCore {
    pub(crate) fn schedule(&mut self, source: EntityId, destination: EntityId, delay: f64, message: SimMessage) {
        assert!(delay >= 0.0, "Cannot schedule {} with delay {}: delays must be non-negative numbers", message.as_str(), delay);
        assert!(
            self.registry.contains_left(&destination),
            "Cannot schedule {} to unknown entity {:?}",
            message.as_str(),
            destination
        );

        let event = SimEvent::new(self.next_serial, self.clock + delay, source, destination, message);
        self.next_serial += 1;
        self.future.add(event);
    }

    pub(crate) fn name_of(&self, id: EntityId) -> Option<&str> {
        self.registry.get_by_left(&id).map(|name| name.as_str())
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<EntityId> {
        self.registry.get_by_right(name).copied()
    }

    pub(crate) fn count_events(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.future.iter().chain(self.deferred.iter()).filter(|event| predicate(event)).count()
    }
}

#[derive(Debug)]
struct EntitySlot {
    state: EntityState,
    entity: Box<dyn SimEntity>,
}

/// A discrete-event simulation: entities, both event queues and the virtual clock.
///
/// Single-threaded and cooperative. Every tick moves all events due at the earliest pending time
/// into the deferred queue, advances the clock to that time and dispatches the batch in
/// (priority, serial) order. Events scheduled while a batch runs always go to the future queue,
/// even with zero delay, and are dispatched in the next tick at the same clock value.
///
/// Independent instances share nothing and can run on separate threads.
#[derive(Debug)]
pub struct Simulation {
    core: SimCore,
    entities: SlotMap<EntityId, EntitySlot>,
    /// Registration order; start and shutdown hooks run in this order.
    order: Vec<EntityId>,
    state: SimulationState,
    pause_at: Option<f64>,
    terminate_at: Option<f64>,
    processed_events: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            core: SimCore::default(),
            entities: SlotMap::with_key(),
            order: Vec::new(),
            state: SimulationState::Initialized,
            pause_at: None,
            terminate_at: None,
            processed_events: 0,
        }
    }

    /// Registers an entity under a unique name. Entities added while the simulation is already
    /// running or paused are started right away.
    pub fn add_entity(&mut self, name: &str, entity: impl SimEntity) -> Result<EntityId> {
        if self.core.registry.contains_right(name) {
            return Err(Error::DuplicateEntityName(name.to_string()));
        }
        if self.state == SimulationState::Terminated {
            return Err(Error::ModelConstructionError(format!("Cannot add entity '{}' to a terminated simulation", name)));
        }

        let id = self.entities.insert(EntitySlot { state: EntityState::Created, entity: Box::new(entity) });
        self.core.registry.insert(id, name.to_string());
        self.order.push(id);
        log::debug!("Entity '{}' registered as {:?}.", name, id);

        if matches!(self.state, SimulationState::Running | SimulationState::Paused) {
            self.start_entity(id);
        }

        Ok(id)
    }

    pub fn clock(&self) -> f64 {
        self.core.clock
    }

    pub fn get_state(&self) -> SimulationState {
        self.state
    }

    pub fn get_processed_events(&self) -> u64 {
        self.processed_events
    }

    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.core.id_of(name)
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.core.name_of(id)
    }

    pub fn entity_state(&self, id: EntityId) -> Option<EntityState> {
        self.entities.get(id).map(|slot| slot.state)
    }

    /// Typed access to a registered entity.
    pub fn entity<T: SimEntity>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(id)?.entity.as_any().downcast_ref::<T>()
    }

    pub fn entity_mut<T: SimEntity>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(id)?.entity.as_any_mut().downcast_mut::<T>()
    }

    pub fn entity_by_name<T: SimEntity>(&self, name: &str) -> Option<&T> {
        self.entity(self.entity_id(name)?)
    }

    /// Sends a message from outside the simulation. The event's source is the null id.
    pub fn send(&mut self, destination: EntityId, delay: f64, message: SimMessage) {
        self.core.schedule(EntityId::null(), destination, delay, message);
    }

    pub fn count_events(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.core.count_events(predicate)
    }

    /// Requests a pause once every event at or before `time` has been dispatched.
    /// Returns false if the time already passed or the simulation is over.
    pub fn pause(&mut self, time: f64) -> bool {
        if self.state == SimulationState::Terminated || time.is_nan() || time < self.core.clock {
            return false;
        }
        self.pause_at = Some(time);
        true
    }

    /// Ends the simulation when the next event lies beyond `time`.
    pub fn terminate_at(&mut self, time: f64) -> bool {
        if self.state == SimulationState::Terminated || time.is_nan() || time < self.core.clock {
            return false;
        }
        self.terminate_at = Some(time);
        true
    }

    /// Ends the simulation. A paused or not yet started simulation finishes immediately; a
    /// running one after the current batch.
    pub fn terminate(&mut self) {
        self.core.termination_requested = true;
        if matches!(self.state, SimulationState::Initialized | SimulationState::Paused) {
            self.finish();
        }
    }

    /// Starts every entity and runs until the simulation terminates or pauses. Returns the clock.
    pub fn start(&mut self) -> f64 {
        match self.state {
            SimulationState::Initialized => {
                log::info!("Starting simulation with {} entities.", self.order.len());
                self.state = SimulationState::Running;
                for id in self.order.clone() {
                    self.start_entity(id);
                }
                self.run()
            }
            SimulationState::Paused => self.resume(),
            SimulationState::Running | SimulationState::Terminated => self.core.clock,
        }
    }

    /// Continues a paused simulation. Returns the clock when it pauses again or terminates.
    pub fn resume(&mut self) -> f64 {
        if self.state != SimulationState::Paused {
            log::warn!("SimulationNotPaused: resume() called in state {:?}.", self.state);
            return self.core.clock;
        }

        log::info!("{:.2}: Simulation resumed.", self.core.clock);
        self.state = SimulationState::Running;
        self.run()
    }

    fn run(&mut self) -> f64 {
        loop {
            if self.core.termination_requested {
                self.finish();
                break;
            }

            let Some(next_time) = self.core.future.first_time() else {
                self.finish();
                break;
            };

            if let Some(pause_time) = self.pause_at {
                if next_time > pause_time {
                    self.core.clock = self.core.clock.max(pause_time);
                    self.pause_at = None;
                    self.state = SimulationState::Paused;
                    log::info!("{:.2}: Simulation paused with {} pending event(s).", self.core.clock, self.core.future.len());
                    break;
                }
            }

            if let Some(end_time) = self.terminate_at {
                if next_time > end_time {
                    self.core.clock = self.core.clock.max(end_time);
                    self.finish();
                    break;
                }
            }

            self.tick();
        }

        self.core.clock
    }

    fn tick(&mut self) {
        let batch = self.core.future.pop_all_at_min_time();
        let Some(time) = batch.first().map(|event| event.time) else {
            return;
        };

        for event in batch {
            self.core.deferred.add(event);
        }
        self.core.clock = time;

        while let Some(event) = self.core.deferred.pop_front() {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: SimEvent) {
        let destination = event.destination;
        let Some(slot) = self.entities.get_mut(destination) else {
            panic!("Event {} addressed to unknown entity {:?}", event.message.as_str(), destination);
        };

        if slot.state == EntityState::Finished {
            log::warn!("EventForFinishedEntity: {:.2}: {} for {:?} dropped.", self.core.clock, event.message.as_str(), destination);
            return;
        }
        if matches!(event.message, SimMessage::EndOfSimulation) {
            self.core.termination_requested = true;
        }

        log::trace!("{:.2}: #{} {} {:?} -> {:?}", self.core.clock, event.serial, event.message.as_str(), event.source, destination);

        slot.state = EntityState::Running;
        let mut ctx = SimContext::new(&mut self.core, destination);
        slot.entity.on_event(&mut ctx, event);
        if ctx.wants_to_wait() {
            slot.state = EntityState::Waiting;
        }

        self.processed_events += 1;
    }

    fn start_entity(&mut self, id: EntityId) {
        let Some(slot) = self.entities.get_mut(id) else {
            return;
        };

        slot.state = EntityState::Running;
        let mut ctx = SimContext::new(&mut self.core, id);
        slot.entity.on_start(&mut ctx);
        if ctx.wants_to_wait() {
            slot.state = EntityState::Waiting;
        }
    }

    fn finish(&mut self) {
        if self.state == SimulationState::Terminated {
            return;
        }

        for id in self.order.clone() {
            let Some(slot) = self.entities.get_mut(id) else {
                continue;
            };
            if slot.state == EntityState::Finished {
                continue;
            }

            if slot.entity.has_pending_work() {
                log::warn!(
                    "EntityHasPendingWork: {:.2}: '{}' still had work when the simulation ended.",
                    self.core.clock,
                    self.core.name_of(id).unwrap_or("?")
                );
            }

            let mut ctx = SimContext::new(&mut self.core, id);
            slot.entity.on_shutdown(&mut ctx);
            slot.state = EntityState::Finished;
        }

        self.core.deferred.clear();
        self.state = SimulationState::Terminated;
        log::info!("{:.2}: Simulation finished after {} event(s).", self.core.clock, self.processed_events);
    }
}
