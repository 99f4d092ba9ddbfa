use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::domain::cloud_model::resource::resource_trait::{Resource, ResourceUnit};

/// Capacity-tracked resource with a per-consumer allocation ledger.
///
/// The same type provisions RAM, bandwidth and storage of a Host (`Provisioner<VmId, u64>`) and
/// the MIPS of every single PE (`Provisioner<VmId, f64>`).
///
/// Invariant: `allocated == Σ ledger` and `allocated <= capacity` after every call.
#[derive(Debug, Clone)]
pub struct Provisioner<K: Ord + Copy + Debug, U: ResourceUnit> {
    capacity: U,
    allocated: U,
    ledger: BTreeMap<K, U>,
}

impl<K: Ord + Copy + Debug, U: ResourceUnit> Provisioner<K, U> {
    pub fn new(capacity: U) -> Self {
        assert!(!capacity.is_negative(), "Provisioner capacity must not be negative, got {}", capacity);
        Self { capacity, allocated: U::zero(), ledger: BTreeMap::new() }
    }

    /// Sets the consumer's allocation to `new_total`.
    ///
    /// Only the difference to the consumer's current allocation is checked against the
    /// available amount, so shrinking always succeeds. On failure nothing changes.
    pub fn allocate(&mut self, consumer: K, new_total: U) -> bool {
        assert!(!new_total.is_negative(), "Cannot allocate a negative amount ({}) for {:?}", new_total, consumer);

        if !self.is_suitable(consumer, new_total) {
            return false;
        }

        let current = self.get_allocated_for(consumer);
        self.allocated = self.allocated.saturating_sub_unit(current) + new_total;

        if new_total > U::zero() {
            self.ledger.insert(consumer, new_total);
        } else {
            self.ledger.remove(&consumer);
        }

        true
    }

    /// Returns true if `allocate(consumer, new_total)` would succeed.
    pub fn is_suitable(&self, consumer: K, new_total: U) -> bool {
        let current = self.get_allocated_for(consumer);
        if new_total <= current {
            return true;
        }

        new_total - current <= self.get_available()
    }

    /// Frees the consumer's whole allocation and returns the freed amount (zero if none held).
    pub fn deallocate(&mut self, consumer: K) -> U {
        match self.ledger.remove(&consumer) {
            Some(amount) => {
                self.allocated = self.allocated.saturating_sub_unit(amount);
                amount
            }
            None => U::zero(),
        }
    }

    /// Frees every consumer, returning the total freed amount.
    pub fn deallocate_all(&mut self) -> U {
        let freed = self.allocated;
        self.ledger.clear();
        self.allocated = U::zero();
        freed
    }

    pub fn get_allocated_for(&self, consumer: K) -> U {
        self.ledger.get(&consumer).copied().unwrap_or_else(U::zero)
    }

    pub fn contains(&self, consumer: K) -> bool {
        self.ledger.contains_key(&consumer)
    }

    pub fn consumers(&self) -> impl Iterator<Item = &K> {
        self.ledger.keys()
    }

    /// Changes the capacity. Fails if the new capacity is below what is currently allocated.
    pub fn set_capacity(&mut self, capacity: U) -> bool {
        if capacity.is_negative() || capacity < self.allocated {
            return false;
        }
        self.capacity = capacity;
        true
    }
}

impl<K: Ord + Copy + Debug, U: ResourceUnit> Resource for Provisioner<K, U> {
    type Unit = U;

    fn get_capacity(&self) -> U {
        self.capacity
    }

    fn get_allocated(&self) -> U {
        self.allocated
    }
}
