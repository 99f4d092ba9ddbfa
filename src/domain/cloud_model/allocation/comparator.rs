use std::cmp::Ordering;

use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;

/// Compares Hosts by the MIPS they still have available.
pub struct AvailableMipsCompare {
    most_available_first: bool,
}

impl AvailableMipsCompare {
    /// * `most_available_first`: if true the least loaded Host sorts first, otherwise the most
    ///   loaded one.
    pub fn new(most_available_first: bool) -> Self {
        Self { most_available_first }
    }

    /// Returns `Ordering::Less` if host1 should be preferred over host2.
    ///
    /// Note: on equal availability the registration index of both hosts is compared, lower first.
    ///       In case both are the same host `Ordering::Equal` is returned.
    pub fn compare(&self, (index1, host1): (usize, &Host), (index2, host2): (usize, &Host)) -> Ordering {
        if index1 == index2 {
            return Ordering::Equal;
        }

        let by_mips = host1.get_available_mips().partial_cmp(&host2.get_available_mips());
        let by_mips = if self.most_available_first { by_mips.map(Ordering::reverse) } else { by_mips };

        match by_mips {
            Some(Ordering::Equal) | None => index1.cmp(&index2),
            Some(ord) => ord,
        }
    }
}

/// The Hosts the Vm fits on, with their registration index, in registration order.
pub fn suitable_hosts<'a>(hosts: &'a [Host], vm: &'a Vm) -> impl Iterator<Item = (usize, &'a Host)> + 'a {
    hosts.iter().enumerate().filter(move |(_, host)| host.is_suitable(vm))
}
