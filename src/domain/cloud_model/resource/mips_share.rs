use serde::{Deserialize, Serialize};

/// The MIPS handed to each virtual PE of a Vm, one entry per vPE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MipsShare(Vec<f64>);

impl MipsShare {
    pub fn new(shares: Vec<f64>) -> Self {
        assert!(shares.iter().all(|m| m.is_finite() && *m >= 0.0), "MipsShare entries must be finite and non-negative: {:?}", shares);
        MipsShare(shares)
    }

    /// `pes` virtual PEs with `mips` each.
    pub fn uniform(pes: usize, mips: f64) -> Self {
        MipsShare::new(vec![mips; pes])
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    /// Every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        MipsShare::new(self.0.iter().map(|m| m * factor).collect())
    }

    /// Keeps only the first `pes` entries.
    pub fn truncated(&self, pes: usize) -> Self {
        MipsShare(self.0.iter().take(pes).copied().collect())
    }
}

impl From<Vec<f64>> for MipsShare {
    fn from(shares: Vec<f64>) -> Self {
        MipsShare::new(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_share_totals() {
        let share = MipsShare::uniform(4, 250.0);
        assert_eq!(share.len(), 4);
        assert_eq!(share.total(), 1000.0);
        assert_eq!(share.scaled(0.5).total(), 500.0);
        assert_eq!(share.truncated(1).as_slice(), &[250.0]);
    }
}
