use std::any::Any;

use crate::domain::cloud_model::cloudlet::Cloudlet;
use crate::domain::cloud_model::cloudlet_scheduler::cloudlet_scheduler_trait::{CloudletScheduler, CloudletSchedulerBase};
use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::utils::id::CloudletId;

/// All Cloudlets run at once. Each Cloudlet PE gets the same slice of the Vm's MIPS,
/// `total_mips / max(vm_pes, Σ cloudlet pes)`, scaled by the Cloudlet's CPU utilization.
#[derive(Debug, Default)]
pub struct CloudletSchedulerTimeShared {
    base: CloudletSchedulerBase,
}

impl CloudletSchedulerTimeShared {
    pub fn new() -> Self {
        Self::default()
    }

    fn mips_per_pe(&self, share: &MipsShare) -> f64 {
        let requested_pes: usize = self.base.exec_list.iter().map(|c| c.get_pes()).sum();
        let divisor = share.len().max(requested_pes);
        if divisor == 0 { 0.0 } else { share.total() / divisor as f64 }
    }
}

impl CloudletScheduler for CloudletSchedulerTimeShared {
    fn get_base(&self) -> &CloudletSchedulerBase {
        &self.base
    }

    fn get_base_mut(&mut self) -> &mut CloudletSchedulerBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn submit(&mut self, mut cloudlet: Cloudlet, now: f64) {
        self.catch_up(now);
        cloudlet.set_submission_time(now);
        cloudlet.mark_started(now);
        self.base.exec_list.push(cloudlet);
    }

    fn resume(&mut self, cloudlet_id: CloudletId, now: f64) -> bool {
        self.catch_up(now);
        match self.base.paused_list.iter().position(|c| c.id == cloudlet_id) {
            Some(index) => {
                let mut cloudlet = self.base.paused_list.remove(index);
                cloudlet.mark_started(now);
                self.base.exec_list.push(cloudlet);
                true
            }
            None => false,
        }
    }

    fn update_processing(&mut self, now: f64, share: &MipsShare) -> Option<f64> {
        let elapsed = now - self.base.previous_time;

        // Progress since the last update runs at the share and utilization of that update.
        if elapsed > 0.0 {
            let previous_share = self.base.current_share.clone();
            let per_pe = self.mips_per_pe(&previous_share);
            let since = self.base.previous_time;
            for cloudlet in self.base.exec_list.iter_mut() {
                let rate = per_pe * cloudlet.get_pes() as f64 * cloudlet.get_cpu_utilization(since);
                if rate > 0.0 {
                    cloudlet.add_finished_length(rate * elapsed);
                }
            }
        }

        let done = self.base.finished_flags();
        self.base.collect_finished(&done, now);

        self.base.previous_time = now;
        self.base.current_share = share.clone();

        let per_pe = self.mips_per_pe(share);
        let mut next: Option<f64> = None;
        for cloudlet in self.base.exec_list.iter_mut() {
            let rate = per_pe * cloudlet.get_pes() as f64 * cloudlet.get_cpu_utilization(now);
            if rate <= 0.0 {
                continue;
            }
            let estimate = now + cloudlet.get_remaining_length() / rate;
            next = Some(next.map_or(estimate, |n| n.min(estimate)));
        }

        next
    }
}
