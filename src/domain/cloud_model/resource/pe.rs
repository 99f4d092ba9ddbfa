use crate::domain::cloud_model::resource::provisioner::Provisioner;
use crate::domain::cloud_model::resource::resource_trait::Resource;
use crate::domain::cloud_model::utils::id::{PeId, VmId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeStatus {
    Free,
    Busy,
    Failed,
}

/// A single processing element (CPU core) of a Host.
///
/// The MIPS of the PE are handed out to virtual PEs through a per-Vm [`Provisioner`].
#[derive(Debug, Clone)]
pub struct Pe {
    pub id: PeId,
    status: PeStatus,
    provisioner: Provisioner<VmId, f64>,
}

impl Pe {
    pub fn new(id: PeId, mips: f64) -> Self {
        assert!(mips > 0.0 && mips.is_finite(), "Pe {} must have positive MIPS capacity, got {}", id, mips);
        Self { id, status: PeStatus::Free, provisioner: Provisioner::new(mips) }
    }

    pub fn get_mips(&self) -> f64 {
        self.provisioner.get_capacity()
    }

    pub fn get_status(&self) -> PeStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PeStatus) {
        self.status = status;
    }

    pub fn is_working(&self) -> bool {
        self.status != PeStatus::Failed
    }

    pub fn is_free(&self) -> bool {
        self.status == PeStatus::Free
    }

    pub fn get_provisioner(&self) -> &Provisioner<VmId, f64> {
        &self.provisioner
    }

    pub fn get_provisioner_mut(&mut self) -> &mut Provisioner<VmId, f64> {
        &mut self.provisioner
    }

    pub fn get_available_mips(&self) -> f64 {
        if self.is_working() { self.provisioner.get_available() } else { 0.0 }
    }

    /// Marks the PE as failed and drops every share handed out on it.
    pub fn fail(&mut self) {
        self.provisioner.deallocate_all();
        self.status = PeStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_pe_offers_no_mips() {
        let mut pe = Pe::new(PeId::new(0), 1000.0);
        assert!(pe.get_provisioner_mut().allocate(VmId::new(1), 400.0));
        assert_eq!(pe.get_available_mips(), 600.0);

        pe.fail();

        assert!(!pe.is_working());
        assert_eq!(pe.get_available_mips(), 0.0);
        assert_eq!(pe.get_provisioner().get_allocated(), 0.0);
    }
}
