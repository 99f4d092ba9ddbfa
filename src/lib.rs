use std::collections::BTreeMap;

use crate::api::simulation_dto::SimulationDto;
use crate::domain::cloud_model::entity::broker::DatacenterBroker;
use crate::domain::cloud_model::entity::datacenter::Datacenter;
use crate::domain::cloud_model::entity::fault_injector::{FaultInjector, ScheduledFault};
use crate::domain::cloud_model::utils::id::HostId;
use crate::domain::simulator::simulation::Simulation;
use crate::error::{ConversionError, Error, Result};
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Reads a simulation scenario from a JSON file and builds a ready-to-start [`Simulation`].
///
/// The logger is not installed here; call [`logger::init`] first to see the run's output.
pub fn generate_simulation(file_path: &str) -> Result<Simulation> {
    let root_dto: SimulationDto = parse_json_file::<SimulationDto>(file_path)?;
    log::info!("Scenario '{}' parsed successfully.", file_path);

    let simulation = build_simulation(root_dto)?;
    log::info!("Simulation model constructed successfully.");

    Ok(simulation)
}

/// Registers every Datacenter, broker and fault injector the scenario describes.
///
/// Entities are registered datacenters first, then brokers, then one fault injector per
/// Datacenter with faults (named `<datacenter>-faults`), so start hooks run in that order.
pub fn build_simulation(dto: SimulationDto) -> Result<Simulation> {
    let mut simulation = Simulation::new();

    for datacenter_dto in dto.datacenters {
        let name = datacenter_dto.name.clone();
        simulation.add_entity(&name, Datacenter::try_from(datacenter_dto)?)?;
    }

    for broker_dto in dto.brokers {
        if simulation.entity_by_name::<Datacenter>(&broker_dto.datacenter).is_none() {
            return Err(Error::ModelConstructionError(format!("Broker '{}' refers to unknown Datacenter '{}'", broker_dto.name, broker_dto.datacenter)));
        }
        let name = broker_dto.name.clone();
        simulation.add_entity(&name, DatacenterBroker::try_from(broker_dto)?)?;
    }

    let mut faults: BTreeMap<String, Vec<ScheduledFault>> = BTreeMap::new();
    for fault_dto in dto.faults {
        if !(fault_dto.delay >= 0.0) {
            return Err(ConversionError::InvalidValue { field: "faults.delay".to_string(), reason: format!("{} is negative", fault_dto.delay) }.into());
        }
        let known_host = simulation
            .entity_by_name::<Datacenter>(&fault_dto.datacenter)
            .map(|datacenter| datacenter.get_host(HostId::new(fault_dto.host_id)).is_some());
        match known_host {
            None => return Err(Error::ModelConstructionError(format!("Fault refers to unknown Datacenter '{}'", fault_dto.datacenter))),
            Some(false) => return Err(Error::ModelConstructionError(format!("Fault refers to unknown Host {} of '{}'", fault_dto.host_id, fault_dto.datacenter))),
            Some(true) => {}
        }

        faults.entry(fault_dto.datacenter).or_default().push(ScheduledFault {
            delay: fault_dto.delay,
            host_id: HostId::new(fault_dto.host_id),
            pes: fault_dto.pes,
        });
    }
    for (datacenter, scheduled) in faults {
        simulation.add_entity(&format!("{}-faults", datacenter), FaultInjector::new(&datacenter, scheduled))?;
    }

    if let Some(time) = dto.terminate_at {
        if !simulation.terminate_at(time) {
            return Err(ConversionError::InvalidValue { field: "terminateAt".to_string(), reason: format!("{} is not a valid time", time) }.into());
        }
    }

    Ok(simulation)
}
