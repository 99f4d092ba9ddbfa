use std::fmt;

use crate::api::cloud_dto::workload_dto::CloudletDto;
use crate::domain::cloud_model::utilization_model::{UtilizationModel, UtilizationModelFull, UtilizationModelType};
use crate::domain::cloud_model::utils::id::{CloudletId, VmId};
use crate::domain::simulator::sim_entity::EntityId;
use crate::error::{ConversionError, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudletStatus {
    Instantiated,
    Queued,
    InExecution,
    Paused,
    Success,
    Canceled,
    Failed,
}

impl CloudletStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CloudletStatus::Success | CloudletStatus::Canceled | CloudletStatus::Failed)
    }
}

/// Passed to on-finish listeners when a Cloudlet completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudletFinishInfo {
    pub cloudlet_id: CloudletId,
    pub vm_id: Option<VmId>,
    pub exec_start_time: Option<f64>,
    pub finish_time: f64,
    pub finished_length: f64,
}

pub type CloudletFinishListener = Box<dyn FnMut(&CloudletFinishInfo) + Send>;

#[derive(Default)]
struct FinishListeners(Vec<CloudletFinishListener>);

impl fmt::Debug for FinishListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FinishListeners({})", self.0.len())
    }
}

/// A unit of work executed inside a Vm, measured in million instructions (MI).
#[derive(Debug)]
pub struct Cloudlet {
    pub id: CloudletId,
    length: f64,
    pes: usize,
    file_size: u64,
    output_size: u64,
    utilization_model_cpu: Box<dyn UtilizationModel>,
    utilization_model_ram: Box<dyn UtilizationModel>,
    utilization_model_bw: Box<dyn UtilizationModel>,
    finished_length: f64,
    status: CloudletStatus,
    vm: Option<VmId>,
    broker: Option<EntityId>,
    submission_time: Option<f64>,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
    listeners: FinishListeners,
}

impl Cloudlet {
    pub fn new(id: CloudletId, length: f64, pes: usize) -> Self {
        assert!(length > 0.0 && length.is_finite(), "Cloudlet {} must have a positive length, got {}", id, length);
        assert!(pes > 0, "Cloudlet {} must require at least one PE", id);

        Self {
            id,
            length,
            pes,
            file_size: 0,
            output_size: 0,
            utilization_model_cpu: Box::new(UtilizationModelFull),
            utilization_model_ram: Box::new(UtilizationModelFull),
            utilization_model_bw: Box::new(UtilizationModelFull),
            finished_length: 0.0,
            status: CloudletStatus::Instantiated,
            vm: None,
            broker: None,
            submission_time: None,
            exec_start_time: None,
            finish_time: None,
            listeners: FinishListeners::default(),
        }
    }

    pub fn get_length(&self) -> f64 {
        self.length
    }

    pub fn get_pes(&self) -> usize {
        self.pes
    }

    pub fn get_file_size(&self) -> u64 {
        self.file_size
    }

    pub fn set_file_size(&mut self, file_size: u64) {
        self.file_size = file_size;
    }

    pub fn get_output_size(&self) -> u64 {
        self.output_size
    }

    pub fn set_output_size(&mut self, output_size: u64) {
        self.output_size = output_size;
    }

    pub fn set_utilization_model_cpu(&mut self, model: Box<dyn UtilizationModel>) {
        self.utilization_model_cpu = model;
    }

    pub fn set_utilization_model_ram(&mut self, model: Box<dyn UtilizationModel>) {
        self.utilization_model_ram = model;
    }

    pub fn set_utilization_model_bw(&mut self, model: Box<dyn UtilizationModel>) {
        self.utilization_model_bw = model;
    }

    /// Sets the same model for CPU, RAM and bandwidth.
    pub fn set_utilization_model(&mut self, model: impl UtilizationModel + Clone + 'static) {
        self.utilization_model_cpu = Box::new(model.clone());
        self.utilization_model_ram = Box::new(model.clone());
        self.utilization_model_bw = Box::new(model);
    }

    pub fn get_cpu_utilization(&mut self, time: f64) -> f64 {
        self.utilization_model_cpu.get_utilization(time)
    }

    pub fn get_ram_utilization(&mut self, time: f64) -> f64 {
        self.utilization_model_ram.get_utilization(time)
    }

    pub fn get_bw_utilization(&mut self, time: f64) -> f64 {
        self.utilization_model_bw.get_utilization(time)
    }

    pub fn get_finished_length(&self) -> f64 {
        self.finished_length
    }

    pub fn get_remaining_length(&self) -> f64 {
        (self.length - self.finished_length).max(0.0)
    }

    /// Adds executed instructions. The finished length never decreases and never exceeds the length.
    pub fn add_finished_length(&mut self, executed: f64) {
        assert!(executed >= 0.0, "Cloudlet {} cannot un-execute {} MI", self.id, executed);
        self.finished_length = (self.finished_length + executed).min(self.length);
    }

    pub fn get_status(&self) -> CloudletStatus {
        self.status
    }

    pub fn set_status(&mut self, status: CloudletStatus) {
        self.status = status;
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn get_vm(&self) -> Option<VmId> {
        self.vm
    }

    pub fn set_vm(&mut self, vm: Option<VmId>) {
        self.vm = vm;
    }

    pub fn get_broker(&self) -> Option<EntityId> {
        self.broker
    }

    pub fn set_broker(&mut self, broker: Option<EntityId>) {
        self.broker = broker;
    }

    pub fn get_submission_time(&self) -> Option<f64> {
        self.submission_time
    }

    pub fn set_submission_time(&mut self, time: f64) {
        self.submission_time = Some(time);
    }

    pub fn get_exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    /// Records the first time the Cloudlet got to run; later calls are ignored.
    pub fn mark_started(&mut self, time: f64) {
        self.status = CloudletStatus::InExecution;
        if self.exec_start_time.is_none() {
            self.exec_start_time = Some(time);
        }
    }

    pub fn get_finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn get_actual_cpu_time(&self) -> Option<f64> {
        Some(self.finish_time? - self.exec_start_time?)
    }

    pub fn add_on_finish_listener(&mut self, listener: CloudletFinishListener) {
        self.listeners.0.push(listener);
    }

    /// Completes the Cloudlet and notifies its listeners synchronously.
    pub fn finish(&mut self, time: f64) {
        self.finished_length = self.length;
        self.finish_time = Some(time);
        self.status = CloudletStatus::Success;

        let info = CloudletFinishInfo {
            cloudlet_id: self.id,
            vm_id: self.vm,
            exec_start_time: self.exec_start_time,
            finish_time: time,
            finished_length: self.finished_length,
        };
        for listener in self.listeners.0.iter_mut() {
            listener(&info);
        }
    }

    /// Ends the Cloudlet without success. Listeners are not notified.
    pub fn abort(&mut self, status: CloudletStatus, time: f64) {
        assert!(matches!(status, CloudletStatus::Canceled | CloudletStatus::Failed), "abort needs Canceled or Failed, got {:?}", status);
        self.status = status;
        self.finish_time = Some(time);
    }
}

impl TryFrom<CloudletDto> for Cloudlet {
    type Error = Error;

    fn try_from(dto: CloudletDto) -> Result<Self, Self::Error> {
        if !(dto.length > 0.0 && dto.length.is_finite()) {
            return Err(ConversionError::InvalidValue { field: format!("cloudlets[{}].length", dto.id), reason: "must be positive".to_string() }.into());
        }
        if dto.pes == 0 {
            return Err(ConversionError::InvalidValue { field: format!("cloudlets[{}].pes", dto.id), reason: "must be at least 1".to_string() }.into());
        }

        let mut cloudlet = Cloudlet::new(CloudletId::new(dto.id), dto.length, dto.pes);
        cloudlet.set_file_size(dto.file_size);
        cloudlet.set_output_size(dto.output_size);
        cloudlet.set_vm(dto.vm_id.map(VmId::new));

        if let Some(model) = dto.utilization_cpu.as_ref() {
            cloudlet.set_utilization_model_cpu(UtilizationModelType::from_dto(model)?);
        }
        if let Some(model) = dto.utilization_ram.as_ref() {
            cloudlet.set_utilization_model_ram(UtilizationModelType::from_dto(model)?);
        }
        if let Some(model) = dto.utilization_bw.as_ref() {
            cloudlet.set_utilization_model_bw(UtilizationModelType::from_dto(model)?);
        }

        Ok(cloudlet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_finished_length_is_monotone_and_capped() {
        let mut cloudlet = Cloudlet::new(CloudletId::new(0), 1000.0, 1);
        cloudlet.add_finished_length(400.0);
        cloudlet.add_finished_length(0.0);
        assert_eq!(cloudlet.get_finished_length(), 400.0);
        cloudlet.add_finished_length(5000.0);
        assert_eq!(cloudlet.get_finished_length(), 1000.0);
        assert_eq!(cloudlet.get_remaining_length(), 0.0);
    }

    #[test]
    fn test_finish_notifies_listeners() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut cloudlet = Cloudlet::new(CloudletId::new(3), 100.0, 1);
        let sink = Arc::clone(&seen);
        cloudlet.add_on_finish_listener(Box::new(move |info: &CloudletFinishInfo| sink.lock().unwrap().push((info.cloudlet_id, info.finish_time))));

        cloudlet.mark_started(1.0);
        cloudlet.finish(2.5);

        assert_eq!(cloudlet.get_status(), CloudletStatus::Success);
        assert_eq!(cloudlet.get_actual_cpu_time(), Some(1.5));
        assert_eq!(*seen.lock().unwrap(), vec![(CloudletId::new(3), 2.5)]);
    }

    #[test]
    #[should_panic(expected = "positive length")]
    fn test_zero_length_is_rejected() {
        Cloudlet::new(CloudletId::new(0), 0.0, 1);
    }

    #[test]
    #[should_panic(expected = "at least one PE")]
    fn test_zero_pes_is_rejected() {
        Cloudlet::new(CloudletId::new(0), 10.0, 0);
    }

    #[test]
    fn test_try_from_dto() {
        let json = r#"{"id": 3, "length": 5000.0, "pes": 2, "vmId": 1, "utilizationCpu": {"typ": "Dynamic", "initial": 0.5}}"#;
        let dto: CloudletDto = serde_json::from_str(json).unwrap();

        let mut cloudlet = Cloudlet::try_from(dto).unwrap();

        assert_eq!(cloudlet.id, CloudletId::new(3));
        assert_eq!(cloudlet.get_vm(), Some(VmId::new(1)));
        assert_eq!(cloudlet.get_file_size(), 300);
        assert_eq!(cloudlet.get_cpu_utilization(10.0), 0.5);
        assert_eq!(cloudlet.get_ram_utilization(10.0), 1.0);
    }

    #[test]
    fn test_try_from_dto_rejects_zero_length() {
        let dto: CloudletDto = serde_json::from_str(r#"{"id": 0, "length": 0.0, "pes": 1}"#).unwrap();
        assert!(matches!(Cloudlet::try_from(dto), Err(Error::ConversionError(ConversionError::InvalidValue { .. }))));
    }
}
