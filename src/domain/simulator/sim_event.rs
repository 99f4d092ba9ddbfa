use std::cmp::Ordering;

use crate::domain::simulator::sim_entity::EntityId;
use crate::domain::simulator::sim_message::SimMessage;

/// Priority classes for events occurring at the same time.
///
/// Lower numeric values are dispatched first. Within one class, events are dispatched in
/// submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

/// The total order of the event queues: (time, priority, serial).
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    pub time: f64,
    pub priority: EventPriority,
    pub serial: u64,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time).then(self.priority.cmp(&other.priority)).then(self.serial.cmp(&other.serial))
    }
}

/// A message in flight between two entities, due at an absolute simulation time.
#[derive(Debug)]
pub struct SimEvent {
    /// Strictly increasing per simulation; breaks ties between equal (time, priority) pairs.
    pub serial: u64,
    pub time: f64,
    pub priority: EventPriority,
    /// `EntityId::null()` for events sent from outside the simulation.
    pub source: EntityId,
    pub destination: EntityId,
    pub message: SimMessage,
}

impl SimEvent {
    pub fn new(serial: u64, time: f64, source: EntityId, destination: EntityId, message: SimMessage) -> Self {
        Self { serial, time, priority: message.priority(), source, destination, message }
    }

    pub fn key(&self) -> EventKey {
        EventKey { time: self.time, priority: self.priority, serial: self.serial }
    }
}
