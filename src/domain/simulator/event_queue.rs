use std::collections::{BTreeMap, VecDeque};

use crate::domain::simulator::sim_event::{EventKey, SimEvent};

/// Operations shared by the future and the deferred queue. Iteration is always in dispatch order.
pub trait EventQueue {
    fn add(&mut self, event: SimEvent);

    /// Removes and returns every event matching the predicate, in queue order.
    fn remove_if(&mut self, predicate: &mut dyn FnMut(&SimEvent) -> bool) -> Vec<SimEvent>;

    fn first(&self) -> Option<&SimEvent>;

    fn len(&self) -> usize;

    fn iter(&self) -> Box<dyn Iterator<Item = &SimEvent> + '_>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Events due later than the current tick, ordered by (time, priority, serial).
#[derive(Debug, Default)]
pub struct FutureQueue {
    events: BTreeMap<EventKey, SimEvent>,
}

impl FutureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.events.first_key_value().map(|(key, _)| key.time)
    }

    /// Removes the earliest events that all share the minimum time, in dispatch order.
    pub fn pop_all_at_min_time(&mut self) -> Vec<SimEvent> {
        let Some(time) = self.first_time() else {
            return Vec::new();
        };

        let mut batch = Vec::new();
        while self.events.first_key_value().is_some_and(|(key, _)| key.time == time) {
            if let Some((_, event)) = self.events.pop_first() {
                batch.push(event);
            }
        }
        batch
    }
}

impl EventQueue for FutureQueue {
    fn add(&mut self, event: SimEvent) {
        self.events.insert(event.key(), event);
    }

    fn remove_if(&mut self, predicate: &mut dyn FnMut(&SimEvent) -> bool) -> Vec<SimEvent> {
        let keys: Vec<EventKey> = self.events.iter().filter(|(_, event)| predicate(*event)).map(|(key, _)| *key).collect();
        keys.into_iter().filter_map(|key| self.events.remove(&key)).collect()
    }

    fn first(&self) -> Option<&SimEvent> {
        self.events.first_key_value().map(|(_, event)| event)
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &SimEvent> + '_> {
        Box::new(self.events.values())
    }
}

/// Events due at the current tick, waiting to be dispatched.
///
/// Events normally arrive in order, so adding is an O(1) append. An out-of-order event is
/// placed by scanning backwards from the tail.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    events: VecDeque<SimEvent>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop_front(&mut self) -> Option<SimEvent> {
        self.events.pop_front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventQueue for DeferredQueue {
    fn add(&mut self, event: SimEvent) {
        let key = event.key();
        let mut position = self.events.len();
        while position > 0 && self.events[position - 1].key() > key {
            position -= 1;
        }
        self.events.insert(position, event);
    }

    fn remove_if(&mut self, predicate: &mut dyn FnMut(&SimEvent) -> bool) -> Vec<SimEvent> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if predicate(&event) {
                removed.push(event);
            } else {
                kept.push_back(event);
            }
        }
        self.events = kept;
        removed
    }

    fn first(&self) -> Option<&SimEvent> {
        self.events.front()
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &SimEvent> + '_> {
        Box::new(self.events.iter())
    }
}
