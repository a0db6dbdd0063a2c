use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::SimulationConfig;
use crate::error::ModelError;
use crate::growth::GrowthPolicy;
use crate::model::PopulationModel;
use crate::solver::{integrate, linspace, SolverSettings, Trajectory};
use crate::types::ParameterSet;

/// Result of integrating one environment
#[derive(Clone, Debug, Serialize)]
pub struct EnvironmentRun {
    pub environment: String,
    pub policy: GrowthPolicy,
    pub strain_labels: Vec<String>,
    pub trajectory: Trajectory,
    /// Summed decomposer population at each time point
    pub decomposition: Vec<f64>,
}

impl EnvironmentRun {
    pub fn totals(&self) -> Vec<f64> {
        self.trajectory.totals()
    }
}

// Simulation - the models for every environment plus how to integrate them
pub struct Simulation {
    pub models: Vec<PopulationModel>,
    pub times: Vec<f64>,
    pub settings: SolverSettings,
}

impl Simulation {
    /// Build one model per environment. Every model is constructed (and so
    /// every parameter validated) before anything is integrated.
    pub fn with_config(params: &ParameterSet, config: &SimulationConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let models = build_models(params, config.policy)?;
        Ok(Self {
            models,
            times: linspace(config.t_max, config.t_steps),
            settings: config.solver_settings(),
        })
    }

    /// Integrate every environment. Models are independent so they run in
    /// parallel; results come back in environment order.
    pub fn run_all(&self) -> Result<Vec<EnvironmentRun>, ModelError> {
        info!(
            environments = self.models.len(),
            solver = %self.settings.kind,
            points = self.times.len(),
            "integrating"
        );
        self.models
            .par_iter()
            .map(|model| run_model(model, &self.times, &self.settings))
            .collect()
    }
}

/// One `PopulationModel` per environment, all sharing the same strain list
pub fn build_models(
    params: &ParameterSet,
    policy: GrowthPolicy,
) -> Result<Vec<PopulationModel>, ModelError> {
    if params.environments.is_empty() {
        return Err(ModelError::malformed(
            "environments",
            "no environments defined",
        ));
    }
    params
        .environments
        .iter()
        .map(|env| PopulationModel::new(env, &params.strains, policy))
        .collect()
}

pub fn run_model(
    model: &PopulationModel,
    times: &[f64],
    settings: &SolverSettings,
) -> Result<EnvironmentRun, ModelError> {
    let trajectory = integrate(model, model.name(), times, settings)?;
    let decomposition = trajectory
        .states
        .iter()
        .map(|x| model.decomposition(x))
        .collect();

    if let Some(last) = trajectory.final_state() {
        info!(
            environment = model.name(),
            total = last.iter().sum::<f64>(),
            capacity = model.carrying_capacity(),
            "environment finished"
        );
    }

    Ok(EnvironmentRun {
        environment: model.name().to_string(),
        policy: model.policy,
        strain_labels: model.strains().iter().map(|s| s.label.clone()).collect(),
        trajectory,
        decomposition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverKind;
    use crate::types::{Environment, Strain};

    fn params() -> ParameterSet {
        ParameterSet {
            environments: vec![
                Environment::new("arid", 0.1, 0.0, 0.0, 10.0),
                Environment::new("semi-arid", 0.1, 0.0, 0.5, 20.0),
            ],
            strains: vec![
                Strain::new("a", 1.0, 0.0, 1.0, 1.0, true, 1.0),
                Strain::new("b", 0.5, 0.5, 1.0, 1.0, false, 1.0),
            ],
        }
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            t_max: 5.0,
            t_steps: 51,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn one_run_per_environment_in_order() {
        let sim = Simulation::with_config(&params(), &config()).unwrap();
        let runs = sim.run_all().unwrap();
        let names: Vec<_> = runs.iter().map(|r| r.environment.as_str()).collect();
        assert_eq!(names, vec!["arid", "semi-arid"]);
        for run in &runs {
            assert_eq!(run.trajectory.len(), 51);
            assert_eq!(run.decomposition.len(), 51);
            assert_eq!(run.strain_labels, vec!["a", "b"]);
        }
    }

    #[test]
    fn decomposition_tracks_flagged_strain() {
        let sim = Simulation::with_config(&params(), &config()).unwrap();
        let runs = sim.run_all().unwrap();
        let run = &runs[0];
        assert_eq!(run.decomposition, run.trajectory.series(0));
    }

    #[test]
    fn bad_strain_stops_before_integration() {
        let mut p = params();
        p.strains.push(Strain::new("zero", 1.0, 0.0, 0.0, 1.0, false, 0.0));
        let err = Simulation::with_config(&p, &config()).err().unwrap();
        assert!(matches!(err, ModelError::DivisionByZero { .. }));
    }

    #[test]
    fn no_environments_is_rejected() {
        let mut p = params();
        p.environments.clear();
        assert!(build_models(&p, GrowthPolicy::Full).is_err());
    }

    #[test]
    fn parallel_runs_match_sequential() {
        let sim = Simulation::with_config(
            &params(),
            &SimulationConfig {
                solver: SolverKind::Rk4,
                ..config()
            },
        )
        .unwrap();
        let parallel = sim.run_all().unwrap();
        for (model, run) in sim.models.iter().zip(&parallel) {
            let sequential = run_model(model, &sim.times, &sim.settings).unwrap();
            assert_eq!(sequential.trajectory, run.trajectory);
        }
    }
}
