use std::any::Any;

use crate::domain::cloud_model::cloudlet::{Cloudlet, CloudletStatus};
use crate::domain::cloud_model::cloudlet_scheduler::cloudlet_scheduler_trait::{CloudletScheduler, CloudletSchedulerBase};
use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::utils::id::CloudletId;

/// Each running Cloudlet owns whole virtual PEs. Cloudlets that do not fit wait in FIFO order
/// until enough PEs are released.
#[derive(Debug, Default)]
pub struct CloudletSchedulerSpaceShared {
    base: CloudletSchedulerBase,
}

impl CloudletSchedulerSpaceShared {
    pub fn new() -> Self {
        Self::default()
    }

    fn used_pes(&self) -> usize {
        self.base.exec_list.iter().map(|c| c.get_pes()).sum()
    }

    /// Starts waiting Cloudlets in arrival order while they fit. A Cloudlet wider than the Vm
    /// runs alone on all of the Vm's PEs.
    fn start_waiting(&mut self, vm_pes: usize, now: f64) {
        while let Some(next) = self.base.waiting_list.first() {
            let used = self.used_pes();
            let fits = used + next.get_pes() <= vm_pes || (used == 0 && vm_pes > 0);
            if !fits {
                break;
            }

            let mut cloudlet = self.base.waiting_list.remove(0);
            cloudlet.mark_started(now);
            log::debug!("{:.2}: Cloudlet {} starts on {} PE(s).", now, cloudlet.id, cloudlet.get_pes().min(vm_pes));
            self.base.exec_list.push(cloudlet);
        }
    }

    fn rate(cloudlet: &mut Cloudlet, share: &MipsShare, time: f64) -> f64 {
        if share.is_empty() {
            return 0.0;
        }
        let per_pe = share.total() / share.len() as f64;
        per_pe * cloudlet.get_pes().min(share.len()) as f64 * cloudlet.get_cpu_utilization(time)
    }
}

impl CloudletScheduler for CloudletSchedulerSpaceShared {
    fn get_base(&self) -> &CloudletSchedulerBase {
        &self.base
    }

    fn get_base_mut(&mut self) -> &mut CloudletSchedulerBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Queues the Cloudlet; it starts at the next `update_processing` if PEs are free.
    fn submit(&mut self, mut cloudlet: Cloudlet, now: f64) {
        self.catch_up(now);
        cloudlet.set_submission_time(now);
        cloudlet.set_status(CloudletStatus::Queued);
        self.base.waiting_list.push(cloudlet);
    }

    fn resume(&mut self, cloudlet_id: CloudletId, now: f64) -> bool {
        self.catch_up(now);
        match self.base.paused_list.iter().position(|c| c.id == cloudlet_id) {
            Some(index) => {
                let mut cloudlet = self.base.paused_list.remove(index);
                cloudlet.set_status(CloudletStatus::Queued);
                self.base.waiting_list.insert(0, cloudlet);
                true
            }
            None => false,
        }
    }

    fn update_processing(&mut self, now: f64, share: &MipsShare) -> Option<f64> {
        let elapsed = now - self.base.previous_time;

        if elapsed > 0.0 {
            let previous_share = self.base.current_share.clone();
            let since = self.base.previous_time;
            for cloudlet in self.base.exec_list.iter_mut() {
                let rate = Self::rate(cloudlet, &previous_share, since);
                if rate > 0.0 {
                    cloudlet.add_finished_length(rate * elapsed);
                }
            }
        }

        let done = self.base.finished_flags();
        self.base.collect_finished(&done, now);

        self.base.previous_time = now;
        self.base.current_share = share.clone();
        self.start_waiting(share.len(), now);

        let mut next: Option<f64> = None;
        for cloudlet in self.base.exec_list.iter_mut() {
            let rate = Self::rate(cloudlet, share, now);
            if rate <= 0.0 {
                continue;
            }
            let estimate = now + cloudlet.get_remaining_length() / rate;
            next = Some(next.map_or(estimate, |n| n.min(estimate)));
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloudlets_queue_until_a_pe_frees_up() {
        let mut scheduler = CloudletSchedulerSpaceShared::new();
        let share = MipsShare::uniform(1, 1000.0);
        scheduler.submit(Cloudlet::new(CloudletId::new(0), 10_000.0, 1), 0.0);
        scheduler.submit(Cloudlet::new(CloudletId::new(1), 5_000.0, 1), 0.0);

        assert_eq!(scheduler.update_processing(0.0, &share), Some(10.0));
        assert_eq!(scheduler.get_waiting_list().len(), 1);

        assert_eq!(scheduler.update_processing(10.0, &share), Some(15.0));
        assert_eq!(scheduler.get_exec_list()[0].id, CloudletId::new(1));
        assert_eq!(scheduler.get_exec_list()[0].get_exec_start_time(), Some(10.0));

        assert_eq!(scheduler.update_processing(15.0, &share), None);
        let finished: Vec<CloudletId> = scheduler.take_finished().iter().map(|c| c.id).collect();
        assert_eq!(finished, vec![CloudletId::new(0), CloudletId::new(1)]);
    }

    #[test]
    fn test_two_pes_run_two_cloudlets_side_by_side() {
        let mut scheduler = CloudletSchedulerSpaceShared::new();
        let share = MipsShare::uniform(2, 500.0);
        for id in 0..3 {
            scheduler.submit(Cloudlet::new(CloudletId::new(id), 1_000.0, 1), 0.0);
        }

        assert_eq!(scheduler.update_processing(0.0, &share), Some(2.0));
        assert_eq!(scheduler.get_exec_list().len(), 2);
        assert_eq!(scheduler.get_waiting_list().len(), 1);
    }

    #[test]
    fn test_fail_all_reports_waiting_cloudlets_too() {
        let mut scheduler = CloudletSchedulerSpaceShared::new();
        let share = MipsShare::uniform(1, 1000.0);
        scheduler.submit(Cloudlet::new(CloudletId::new(0), 10_000.0, 1), 0.0);
        scheduler.submit(Cloudlet::new(CloudletId::new(1), 10_000.0, 1), 0.0);
        scheduler.update_processing(0.0, &share);

        let failed = scheduler.fail_all(3.0);

        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|c| c.get_status() == CloudletStatus::Failed));
        assert!((failed[0].get_finished_length() - 3000.0).abs() < 1e-9);
        assert!(!scheduler.has_unfinished());
    }
}
