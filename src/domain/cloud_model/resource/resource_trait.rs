use std::fmt::{Debug, Display};
use std::ops::{Add, Sub};

/// Numeric unit a resource is measured in: `u64` for RAM (MB), bandwidth (Mbps) and storage (MB),
/// `f64` for MIPS.
pub trait ResourceUnit: Copy + Debug + Display + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Send + 'static {
    fn zero() -> Self;

    /// `self - other`, clamped at zero.
    fn saturating_sub_unit(self, other: Self) -> Self;

    fn is_negative(self) -> bool;

    fn as_f64(self) -> f64;
}

impl ResourceUnit for u64 {
    fn zero() -> Self {
        0
    }

    fn saturating_sub_unit(self, other: Self) -> Self {
        self.saturating_sub(other)
    }

    fn is_negative(self) -> bool {
        false
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl ResourceUnit for f64 {
    fn zero() -> Self {
        0.0
    }

    fn saturating_sub_unit(self, other: Self) -> Self {
        (self - other).max(0.0)
    }

    fn is_negative(self) -> bool {
        self < 0.0 || self.is_nan()
    }

    fn as_f64(self) -> f64 {
        self
    }
}

/// A capacity-tracked resource.
pub trait Resource: Debug {
    type Unit: ResourceUnit;

    /// Returns the total capacity
    fn get_capacity(&self) -> Self::Unit;

    /// Returns the amount currently handed out to consumers
    fn get_allocated(&self) -> Self::Unit;

    fn get_available(&self) -> Self::Unit {
        self.get_capacity().saturating_sub_unit(self.get_allocated())
    }

    /// Fraction of the capacity in use, in [0, 1].
    fn get_utilization(&self) -> f64 {
        let capacity = self.get_capacity().as_f64();
        if capacity <= 0.0 { 0.0 } else { (self.get_allocated().as_f64() / capacity).min(1.0) }
    }

    fn is_full(&self) -> bool {
        self.get_available() <= Self::Unit::zero()
    }
}
