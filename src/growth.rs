// Growth coefficients - per (strain, environment) growth terms

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;
use crate::types::{Environment, Strain};

/// How a strain's growth rate is derived from its parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPolicy {
    /// Mismatch folded into a constant r' = r * (1 - beta * |dh| / m);
    /// growth is r' * x * (1 - N/k)
    Simplified,
    /// Growth is r * (c - |dh| / m - N/k) * x, crowding recomputed every call
    #[default]
    Full,
}

impl fmt::Display for GrowthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthPolicy::Simplified => write!(f, "simplified"),
            GrowthPolicy::Full => write!(f, "full"),
        }
    }
}

/// Growth terms of one strain bound to one environment
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GrowthCoefficient {
    pub intrinsic_rate: f64,
    pub carrying_contribution: f64,
    /// |h_env - h_strain| / m
    pub mismatch_penalty: f64,
    /// r' of the simplified policy
    pub rate_prime: f64,
}

impl GrowthCoefficient {
    /// Derive the coefficient. Neither input is modified; a zero
    /// mismatch sensitivity is rejected here rather than producing inf/NaN later.
    pub fn derive(strain: &Strain, env: &Environment) -> Result<Self, ModelError> {
        if strain.mismatch_sensitivity == 0.0 {
            return Err(ModelError::DivisionByZero {
                subject: format!("strain {}", strain.label),
                field: "mismatch sensitivity (m)",
            });
        }

        let mismatch_penalty =
            (env.habitat_value - strain.habitat_value).abs() / strain.mismatch_sensitivity;

        Ok(Self {
            intrinsic_rate: strain.intrinsic_rate,
            carrying_contribution: strain.carrying_contribution,
            mismatch_penalty,
            rate_prime: strain.intrinsic_rate * (1.0 - env.dispersal_rate * mismatch_penalty),
        })
    }

    /// Per-capita growth rate for a total population `total` under capacity `k`.
    #[inline]
    pub fn per_capita(&self, policy: GrowthPolicy, total: f64, k: f64) -> f64 {
        match policy {
            GrowthPolicy::Simplified => self.rate_prime * (1.0 - total / k),
            GrowthPolicy::Full => {
                self.intrinsic_rate * (self.carrying_contribution - self.mismatch_penalty - total / k)
            }
        }
    }
}

impl fmt::Display for GrowthCoefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "r : {}", self.intrinsic_rate)?;
        writeln!(f, "c : {}", self.carrying_contribution)?;
        writeln!(f, "mismatch penalty : {}", self.mismatch_penalty)?;
        write!(f, "r-prime : {}", self.rate_prime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(h: f64, beta: f64) -> Environment {
        Environment::new("test", beta, 0.0, h, 100.0)
    }

    #[test]
    fn rate_prime_folds_in_mismatch() {
        let strain = Strain::new("f", 2.0, 0.2, 0.5, 1.0, false, 0.0);
        let coeff = GrowthCoefficient::derive(&strain, &env(0.7, 0.4)).unwrap();
        // |0.7 - 0.2| / 0.5 = 1.0
        assert!((coeff.mismatch_penalty - 1.0).abs() < 1e-12);
        assert!((coeff.rate_prime - 2.0 * (1.0 - 0.4)).abs() < 1e-12);
    }

    #[test]
    fn mismatch_is_symmetric() {
        let below = Strain::new("f", 1.0, 0.0, 2.0, 1.0, false, 0.0);
        let above = Strain::new("g", 1.0, 1.0, 2.0, 1.0, false, 0.0);
        let a = GrowthCoefficient::derive(&below, &env(0.5, 1.0)).unwrap();
        let b = GrowthCoefficient::derive(&above, &env(0.5, 1.0)).unwrap();
        assert_eq!(a.mismatch_penalty, b.mismatch_penalty);
    }

    #[test]
    fn zero_sensitivity_is_rejected() {
        let strain = Strain::new("brittle", 1.0, 0.0, 0.0, 1.0, false, 0.0);
        let err = GrowthCoefficient::derive(&strain, &env(0.0, 1.0)).unwrap_err();
        match err {
            ModelError::DivisionByZero { subject, .. } => assert!(subject.contains("brittle")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn full_policy_is_state_dependent() {
        let strain = Strain::new("f", 1.0, 0.0, 1.0, 1.0, false, 1.0);
        let coeff = GrowthCoefficient::derive(&strain, &env(0.0, 0.0)).unwrap();
        assert_eq!(coeff.per_capita(GrowthPolicy::Full, 0.0, 10.0), 1.0);
        assert_eq!(coeff.per_capita(GrowthPolicy::Full, 5.0, 10.0), 0.5);
        assert_eq!(coeff.per_capita(GrowthPolicy::Full, 10.0, 10.0), 0.0);
    }

    #[test]
    fn simplified_policy_saturates_at_capacity() {
        let strain = Strain::new("f", 3.0, 0.0, 1.0, 1.0, false, 0.0);
        let coeff = GrowthCoefficient::derive(&strain, &env(0.0, 0.5)).unwrap();
        assert_eq!(coeff.per_capita(GrowthPolicy::Simplified, 0.0, 10.0), 3.0);
        assert_eq!(coeff.per_capita(GrowthPolicy::Simplified, 10.0, 10.0), 0.0);
    }

    #[test]
    fn derivation_is_reproducible() {
        let strain = Strain::new("f", 1.3, 0.1, 0.7, 1.0, true, 0.2);
        let e = env(0.9, 0.3);
        assert_eq!(
            GrowthCoefficient::derive(&strain, &e).unwrap(),
            GrowthCoefficient::derive(&strain, &e).unwrap()
        );
    }
}
