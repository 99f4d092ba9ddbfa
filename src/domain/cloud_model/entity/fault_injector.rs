use std::any::Any;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::cloud_model::utils::id::HostId;
use crate::domain::simulator::sim_entity::{SimContext, SimEntity};
use crate::domain::simulator::sim_event::SimEvent;
use crate::domain::simulator::sim_message::SimMessage;

/// A PE failure to inject `delay` time units after the simulation starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledFault {
    pub delay: f64,
    pub host_id: HostId,
    pub pes: usize,
}

/// Sends `HostPeFailure` messages to a Datacenter, either from a fixed script or drawn from a
/// seeded random process.
#[derive(Debug)]
pub struct FaultInjector {
    datacenter_name: String,
    faults: Vec<ScheduledFault>,
    injected: usize,
}

impl FaultInjector {
    pub fn new(datacenter_name: &str, faults: Vec<ScheduledFault>) -> Self {
        for fault in faults.iter() {
            assert!(fault.delay >= 0.0, "Fault for Host {} has negative delay {}", fault.host_id, fault.delay);
        }
        Self { datacenter_name: datacenter_name.to_string(), faults, injected: 0 }
    }

    /// Single-PE failures with exponentially distributed gaps of mean `mean_time_between_failures`,
    /// each hitting a uniformly chosen Host, until `horizon`.
    pub fn random(datacenter_name: &str, hosts: &[HostId], mean_time_between_failures: f64, horizon: f64, seed: u64) -> Self {
        assert!(mean_time_between_failures > 0.0, "Mean time between failures must be positive");

        let mut rng = StdRng::seed_from_u64(seed);
        let mut faults = Vec::new();
        let mut time = 0.0;
        while !hosts.is_empty() {
            let u: f64 = rng.random();
            time += -mean_time_between_failures * (1.0 - u).ln();
            if time > horizon {
                break;
            }
            let host_id = hosts[rng.random_range(0..hosts.len())];
            faults.push(ScheduledFault { delay: time, host_id, pes: 1 });
        }

        FaultInjector::new(datacenter_name, faults)
    }

    pub fn get_faults(&self) -> &[ScheduledFault] {
        &self.faults
    }

    pub fn get_injected(&self) -> usize {
        self.injected
    }
}

impl SimEntity for FaultInjector {
    fn on_start(&mut self, ctx: &mut SimContext) {
        let Some(datacenter) = ctx.entity_by_name(&self.datacenter_name) else {
            log::error!("{:.2}: {}: Datacenter '{}' is not registered; no faults injected.", ctx.clock(), ctx.name(), self.datacenter_name);
            return;
        };

        for fault in self.faults.iter() {
            ctx.schedule(datacenter, fault.delay, SimMessage::HostPeFailure { host_id: fault.host_id, pes: fault.pes });
        }
        self.injected = self.faults.len();
        log::info!("{:.2}: {}: {} fault(s) scheduled for '{}'.", ctx.clock(), ctx.name(), self.injected, self.datacenter_name);
    }

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent) {
        log::debug!("{:.2}: {} ignores {}.", ctx.clock(), ctx.name(), event.message.as_str());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
