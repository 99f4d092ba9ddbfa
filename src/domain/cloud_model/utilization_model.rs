use std::collections::HashMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::cloud_dto::workload_dto::UtilizationModelDto;
use crate::error::ConversionError;

/// Maps simulation time to the fraction of a resource a Cloudlet uses, in [0, 1].
pub trait UtilizationModel: std::fmt::Debug + Send {
    fn get_utilization(&mut self, time: f64) -> f64;
}

fn check_fraction(value: f64, what: &str) -> f64 {
    assert!((0.0..=1.0).contains(&value), "{} must be a fraction in [0, 1], got {}", what, value);
    value
}

/// Always uses the whole resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtilizationModelFull;

impl UtilizationModel for UtilizationModelFull {
    fn get_utilization(&mut self, _time: f64) -> f64 {
        1.0
    }
}

/// Starts at `initial` and grows linearly by `increment` per time unit, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct UtilizationModelDynamic {
    initial: f64,
    increment: f64,
    max: f64,
}

impl UtilizationModelDynamic {
    pub fn new(initial: f64, increment: f64, max: f64) -> Self {
        check_fraction(initial, "Initial utilization");
        check_fraction(max, "Maximum utilization");
        assert!(increment.is_finite(), "Utilization increment must be finite, got {}", increment);
        Self { initial, increment, max }
    }

    /// A constant fraction.
    pub fn fixed(value: f64) -> Self {
        UtilizationModelDynamic::new(value, 0.0, 1.0)
    }
}

impl UtilizationModel for UtilizationModelDynamic {
    fn get_utilization(&mut self, time: f64) -> f64 {
        (self.initial + self.increment * time.max(0.0)).clamp(0.0, self.max)
    }
}

/// Draws a uniform random fraction per distinct time instant from a seeded generator.
///
/// The same instant always yields the same value, so repeated queries within one tick agree.
#[derive(Debug, Clone)]
pub struct UtilizationModelStochastic {
    rng: StdRng,
    history: HashMap<u64, f64>,
}

impl UtilizationModelStochastic {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), history: HashMap::new() }
    }
}

impl UtilizationModel for UtilizationModelStochastic {
    fn get_utilization(&mut self, time: f64) -> f64 {
        let rng = &mut self.rng;
        *self.history.entry(time.to_bits()).or_insert_with(|| rng.random_range(0.0..=1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilizationModelType {
    Full,
    Dynamic,
    Stochastic,
}

impl FromStr for UtilizationModelType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Full" => Ok(UtilizationModelType::Full),
            "Dynamic" => Ok(UtilizationModelType::Dynamic),
            "Stochastic" => Ok(UtilizationModelType::Stochastic),
            _ => Err(ConversionError::UnknownUtilizationModelType(s.to_string())),
        }
    }
}

impl UtilizationModelType {
    /// `initial`/`increment` only matter for `Dynamic`, `seed` only for `Stochastic`.
    pub fn get_instance(&self, initial: f64, increment: f64, seed: u64) -> Box<dyn UtilizationModel> {
        match self {
            UtilizationModelType::Full => Box::new(UtilizationModelFull),
            UtilizationModelType::Dynamic => Box::new(UtilizationModelDynamic::new(initial, increment, 1.0)),
            UtilizationModelType::Stochastic => Box::new(UtilizationModelStochastic::new(seed)),
        }
    }

    /// Builds the model a Cloudlet configuration names, rejecting fractions outside [0, 1].
    pub fn from_dto(dto: &UtilizationModelDto) -> Result<Box<dyn UtilizationModel>, ConversionError> {
        let typ = UtilizationModelType::from_str(&dto.typ)?;
        if typ == UtilizationModelType::Dynamic && !(0.0..=1.0).contains(&dto.initial) {
            return Err(ConversionError::InvalidValue { field: "initial".to_string(), reason: format!("{} is not a fraction in [0, 1]", dto.initial) });
        }
        if !dto.increment.is_finite() {
            return Err(ConversionError::InvalidValue { field: "increment".to_string(), reason: "must be finite".to_string() });
        }

        Ok(typ.get_instance(dto.initial, dto.increment, dto.seed))
    }
}
