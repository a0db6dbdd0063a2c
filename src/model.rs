// Population dynamics - the coupled ODE right-hand side for one environment

use serde::Serialize;

use crate::error::ModelError;
use crate::growth::{GrowthCoefficient, GrowthPolicy};
use crate::types::{Environment, Strain};

/// A system of autonomous or non-autonomous ODEs dx/dt = f(x, t).
///
/// Integrators only see this trait. Implementations must be pure: the same
/// `(x, t)` always yields the same derivatives, whatever order calls arrive in.
pub trait OdeSystem: Sync {
    fn dimension(&self) -> usize;

    fn initial_state(&self) -> Vec<f64>;

    /// Write dx/dt into `dxdt`. Both slices have length `dimension()`.
    fn derivatives(&self, x: &[f64], t: f64, dxdt: &mut [f64]);

    /// Allocating form of `derivatives`, in `f(x, t)` argument order.
    fn rates(&self, x: &[f64], t: f64) -> Vec<f64> {
        let mut dxdt = vec![0.0; self.dimension()];
        self.derivatives(x, t, &mut dxdt);
        dxdt
    }
}

/// All strains competing for one environment's carrying capacity.
///
/// Built once, read-only afterwards. Index `j` refers to the same strain in
/// `strains`, `coefficients` and `initial_state`.
#[derive(Clone, Debug, Serialize)]
pub struct PopulationModel {
    pub environment: Environment,
    pub policy: GrowthPolicy,
    strains: Vec<Strain>,
    coefficients: Vec<GrowthCoefficient>,
    initial_state: Vec<f64>,
}

impl PopulationModel {
    pub fn new(
        environment: &Environment,
        strains: &[Strain],
        policy: GrowthPolicy,
    ) -> Result<Self, ModelError> {
        if environment.carrying_capacity == 0.0 {
            return Err(ModelError::DivisionByZero {
                subject: format!("environment {}", environment.name),
                field: "carrying capacity (k)",
            });
        }
        if strains.is_empty() {
            return Err(ModelError::malformed(
                environment.name.clone(),
                "no strains to simulate",
            ));
        }

        let coefficients = strains
            .iter()
            .map(|s| GrowthCoefficient::derive(s, environment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            environment: environment.clone(),
            policy,
            strains: strains.to_vec(),
            initial_state: strains.iter().map(|s| s.initial_population).collect(),
            coefficients,
        })
    }

    pub fn name(&self) -> &str {
        &self.environment.name
    }

    pub fn carrying_capacity(&self) -> f64 {
        self.environment.carrying_capacity
    }

    pub fn strains(&self) -> &[Strain] {
        &self.strains
    }

    pub fn coefficients(&self) -> &[GrowthCoefficient] {
        &self.coefficients
    }

    /// Combined population of the decomposer strains in state `x`
    pub fn decomposition(&self, x: &[f64]) -> f64 {
        self.strains
            .iter()
            .zip(x)
            .filter(|(s, _)| s.is_decomposer)
            .map(|(_, n)| n)
            .sum()
    }
}

impl OdeSystem for PopulationModel {
    fn dimension(&self) -> usize {
        self.strains.len()
    }

    fn initial_state(&self) -> Vec<f64> {
        self.initial_state.clone()
    }

    // Autonomous: t is accepted for the integrator's calling convention only.
    fn derivatives(&self, x: &[f64], _t: f64, dxdt: &mut [f64]) {
        assert_eq!(x.len(), self.coefficients.len(), "state length mismatch");
        assert_eq!(dxdt.len(), self.coefficients.len(), "output length mismatch");

        let total: f64 = x.iter().sum();
        let k = self.environment.carrying_capacity;
        for ((out, coeff), &n) in dxdt.iter_mut().zip(&self.coefficients).zip(x) {
            *out = coeff.per_capita(self.policy, total, k) * n;
        }
    }
}
