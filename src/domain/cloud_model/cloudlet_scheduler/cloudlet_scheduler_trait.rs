use std::any::Any;

use crate::domain::cloud_model::cloudlet::{Cloudlet, CloudletStatus};
use crate::domain::cloud_model::resource::mips_share::MipsShare;
use crate::domain::cloud_model::utils::id::CloudletId;

/// Remaining work below this many MI counts as done; absorbs the rounding of
/// `now + remaining / rate` estimates.
pub const FINISH_TOLERANCE: f64 = 1e-6;

/// Vm-level policy distributing the Vm's MIPS among its Cloudlets.
///
/// Every operation taking `now` first brings the progress of the running Cloudlets up to `now`
/// using the share of the previous update, so callers never have to do it themselves.
pub trait CloudletScheduler: std::fmt::Debug + Any + Send {
    fn get_base(&self) -> &CloudletSchedulerBase;

    fn get_base_mut(&mut self) -> &mut CloudletSchedulerBase;

    fn as_any(&self) -> &dyn Any;

    /// Accepts a Cloudlet, either starting it or queueing it.
    fn submit(&mut self, cloudlet: Cloudlet, now: f64);

    /// Moves a paused Cloudlet back to execution (or to the waiting list if it cannot run yet).
    fn resume(&mut self, cloudlet_id: CloudletId, now: f64) -> bool;

    /// Advances every running Cloudlet to `now` and installs `share` as the MIPS available from
    /// now on. Returns the earliest absolute time at which a running Cloudlet will finish.
    fn update_processing(&mut self, now: f64, share: &MipsShare) -> Option<f64>;

    /// Advances progress to `now` without changing the share.
    fn catch_up(&mut self, now: f64) {
        let share = self.get_base().current_share.clone();
        self.update_processing(now, &share);
    }

    fn cancel(&mut self, cloudlet_id: CloudletId, now: f64) -> Option<Cloudlet> {
        self.catch_up(now);
        let mut cloudlet = self.get_base_mut().remove_unfinished(cloudlet_id)?;
        cloudlet.abort(CloudletStatus::Canceled, now);
        log::debug!("{:.2}: Cloudlet {} canceled after {:.2} of {:.2} MI.", now, cloudlet_id, cloudlet.get_finished_length(), cloudlet.get_length());
        Some(cloudlet)
    }

    fn pause(&mut self, cloudlet_id: CloudletId, now: f64) -> bool {
        self.catch_up(now);
        let base = self.get_base_mut();
        let position = base.exec_list.iter().position(|c| c.id == cloudlet_id);
        let cloudlet = match position {
            Some(index) => base.exec_list.remove(index),
            None => match base.waiting_list.iter().position(|c| c.id == cloudlet_id) {
                Some(index) => base.waiting_list.remove(index),
                None => return false,
            },
        };

        let mut cloudlet = cloudlet;
        cloudlet.set_status(CloudletStatus::Paused);
        base.paused_list.push(cloudlet);
        true
    }

    /// Removes and returns every Cloudlet that reached a terminal state since the last call.
    fn take_finished(&mut self) -> Vec<Cloudlet> {
        std::mem::take(&mut self.get_base_mut().finished_list)
    }

    /// Fails every unfinished Cloudlet, e.g. because the Vm died, and returns them.
    fn fail_all(&mut self, now: f64) -> Vec<Cloudlet> {
        self.catch_up(now);
        let base = self.get_base_mut();
        let mut failed: Vec<Cloudlet> = base.exec_list.drain(..).chain(base.waiting_list.drain(..)).chain(base.paused_list.drain(..)).collect();
        for cloudlet in failed.iter_mut() {
            cloudlet.abort(CloudletStatus::Failed, now);
        }
        failed
    }

    fn get_exec_list(&self) -> &[Cloudlet] {
        &self.get_base().exec_list
    }

    fn get_waiting_list(&self) -> &[Cloudlet] {
        &self.get_base().waiting_list
    }

    fn get_paused_list(&self) -> &[Cloudlet] {
        &self.get_base().paused_list
    }

    fn find(&self, cloudlet_id: CloudletId) -> Option<&Cloudlet> {
        let base = self.get_base();
        base.exec_list.iter().chain(base.waiting_list.iter()).chain(base.paused_list.iter()).chain(base.finished_list.iter()).find(|c| c.id == cloudlet_id)
    }

    fn has_unfinished(&self) -> bool {
        let base = self.get_base();
        !base.exec_list.is_empty() || !base.waiting_list.is_empty() || !base.paused_list.is_empty()
    }

    fn get_previous_time(&self) -> f64 {
        self.get_base().previous_time
    }
}

#[derive(Debug, Default)]
pub struct CloudletSchedulerBase {
    pub exec_list: Vec<Cloudlet>,
    pub waiting_list: Vec<Cloudlet>,
    pub paused_list: Vec<Cloudlet>,
    pub finished_list: Vec<Cloudlet>,
    pub previous_time: f64,
    pub current_share: MipsShare,
}

impl CloudletSchedulerBase {
    pub fn remove_unfinished(&mut self, cloudlet_id: CloudletId) -> Option<Cloudlet> {
        for list in [&mut self.exec_list, &mut self.waiting_list, &mut self.paused_list] {
            if let Some(index) = list.iter().position(|c| c.id == cloudlet_id) {
                return Some(list.remove(index));
            }
        }
        None
    }

    /// One flag per running Cloudlet telling whether its remaining work is used up.
    pub fn finished_flags(&self) -> Vec<bool> {
        self.exec_list.iter().map(|c| c.get_remaining_length() <= FINISH_TOLERANCE).collect()
    }

    /// Finishes the running Cloudlets flagged in `done` (indexed like `exec_list`) and moves them
    /// to the finished list, keeping list order. Returns how many finished.
    pub fn collect_finished(&mut self, done: &[bool], now: f64) -> usize {
        let mut still_running = Vec::with_capacity(self.exec_list.len());
        let mut finished = 0;

        for (index, mut cloudlet) in self.exec_list.drain(..).enumerate() {
            if done.get(index).copied().unwrap_or(false) {
                cloudlet.finish(now);
                log::debug!("{:.2}: Cloudlet {} finished ({:.2} MI).", now, cloudlet.id, cloudlet.get_length());
                self.finished_list.push(cloudlet);
                finished += 1;
            } else {
                still_running.push(cloudlet);
            }
        }

        self.exec_list = still_running;
        finished
    }
}
