// Strain and environment parameter records
//
// Both are plain immutable values built once by the loader (or directly by a
// caller) with every field supplied.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One fungal strain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Strain {
    /// Label used in reports; the loader uses the source file name
    pub label: String,
    pub intrinsic_rate: f64,        // r
    pub habitat_value: f64,         // h
    pub mismatch_sensitivity: f64,  // m, divisor of the mismatch penalty
    pub initial_population: f64,    // N
    pub is_decomposer: bool,        // S
    pub carrying_contribution: f64, // c
}

impl Strain {
    pub fn new(
        label: impl Into<String>,
        intrinsic_rate: f64,
        habitat_value: f64,
        mismatch_sensitivity: f64,
        initial_population: f64,
        is_decomposer: bool,
        carrying_contribution: f64,
    ) -> Self {
        Self {
            label: label.into(),
            intrinsic_rate,
            habitat_value,
            mismatch_sensitivity,
            initial_population,
            is_decomposer,
            carrying_contribution,
        }
    }
}

impl fmt::Display for Strain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "r : {}", self.intrinsic_rate)?;
        writeln!(f, "h : {}", self.habitat_value)?;
        writeln!(f, "m : {}", self.mismatch_sensitivity)?;
        writeln!(f, "N : {}", self.initial_population)?;
        writeln!(f, "Saprotrophic?: {}", self.is_decomposer)?;
        write!(f, "c : {}", self.carrying_contribution)
    }
}

/// One ecological context the strains compete in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub dispersal_rate: f64, // beta
    // Parsed and carried but not part of either growth formula
    pub alpha: f64,
    pub habitat_value: f64,     // h
    pub carrying_capacity: f64, // k
}

impl Environment {
    pub fn new(
        name: impl Into<String>,
        dispersal_rate: f64,
        alpha: f64,
        habitat_value: f64,
        carrying_capacity: f64,
    ) -> Self {
        Self {
            name: name.into(),
            dispersal_rate,
            alpha,
            habitat_value,
            carrying_capacity,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name : {}", self.name)?;
        writeln!(f, "beta : {}", self.dispersal_rate)?;
        writeln!(f, "alpha : {}", self.alpha)?;
        writeln!(f, "h : {}", self.habitat_value)?;
        write!(f, "k : {}", self.carrying_capacity)
    }
}

/// Everything the loader produces. Strain order is the index order used by
/// every model built from this set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub environments: Vec<Environment>,
    pub strains: Vec<Strain>,
}
