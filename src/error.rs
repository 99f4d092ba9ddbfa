use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse simulation model JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to build internal simulation model: {0}")]
    ModelConstructionError(String),

    #[error("Failed to convert configuration: {0}")]
    ConversionError(#[from] ConversionError),

    #[error("An entity named '{0}' is already registered in this simulation")]
    DuplicateEntityName(String),
}

/// Errors raised while turning configuration DTOs into domain objects.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Unknown VmScheduler type: {0}")]
    UnknownVmSchedulerType(String),

    #[error("Unknown CloudletScheduler type: {0}")]
    UnknownCloudletSchedulerType(String),

    #[error("Unknown VmAllocationPolicy type: {0}")]
    UnknownAllocationPolicyType(String),

    #[error("Unknown UtilizationModel type: {0}")]
    UnknownUtilizationModelType(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Reasons a Host or one of its schedulers/provisioners refuses a Vm.
///
/// Capacity exhaustion is an ordinary runtime outcome, never a panic: the caller decides
/// whether to retry, reject or queue.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Host {host} is failed")]
    HostFailed { host: String },

    #[error("Not enough working PEs: requested {requested}, available {available}")]
    InsufficientPes { requested: usize, available: usize },

    #[error("Not enough MIPS: requested {requested}, available {available}")]
    InsufficientMips { requested: f64, available: f64 },

    #[error("Not enough RAM: requested {requested}, available {available}")]
    InsufficientRam { requested: u64, available: u64 },

    #[error("Not enough bandwidth: requested {requested}, available {available}")]
    InsufficientBw { requested: u64, available: u64 },

    #[error("Not enough storage: requested {requested}, available {available}")]
    InsufficientStorage { requested: u64, available: u64 },

    #[error("No suitable host found for Vm {vm}")]
    NoSuitableHost { vm: String },

    #[error("Vm {vm} is not in a state that allows this operation ({state})")]
    InvalidVmState { vm: String, state: String },
}

pub type Result<T> = std::result::Result<T, Error>;
