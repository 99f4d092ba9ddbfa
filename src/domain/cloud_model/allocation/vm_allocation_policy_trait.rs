use crate::domain::cloud_model::host::Host;
use crate::domain::cloud_model::vm::Vm;
use crate::error::AllocationError;

/// Decides on which Host of a Datacenter a Vm is placed.
///
/// Hosts are always given in registration order, and every policy must be deterministic for a
/// given Host list so that runs are reproducible.
pub trait VmAllocationPolicy: std::fmt::Debug + Send {
    fn get_name(&self) -> &'static str;

    /// Returns the index of the Host the Vm should go to, without reserving anything.
    fn find_host_for_vm(&mut self, hosts: &[Host], vm: &Vm) -> Option<usize>;

    /// Finds a Host and creates the Vm on it. On failure no Host is modified.
    fn allocate_host_for_vm(&mut self, hosts: &mut [Host], vm: &mut Vm) -> Result<usize, AllocationError> {
        let index = self.find_host_for_vm(hosts, vm).ok_or_else(|| AllocationError::NoSuitableHost { vm: vm.id.to_string() })?;
        hosts[index].create_vm(vm)?;
        log::debug!("{}: Vm {} placed on Host {}.", self.get_name(), vm.id, hosts[index].id);
        Ok(index)
    }

    /// Releases the Vm from whichever Host holds it.
    fn deallocate_host_for_vm(&mut self, hosts: &mut [Host], vm: &mut Vm) {
        if let Some(host) = hosts.iter_mut().find(|host| host.hosts_vm(vm.id)) {
            host.destroy_vm(vm);
        }
    }

    /// A migration target for the Vm other than `current`. Defaults to the first suitable Host.
    fn find_host_for_migration(&mut self, hosts: &[Host], vm: &Vm, current: usize) -> Option<usize> {
        hosts.iter().enumerate().find(|(index, host)| *index != current && host.is_suitable(vm)).map(|(index, _)| index)
    }
}
