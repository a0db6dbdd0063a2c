//! Competitive population dynamics of fungal strains sharing an environment.
//!
//! Strains grow logistically against a carrying capacity shared by every
//! strain in the environment, penalised by how far their preferred habitat
//! value sits from the environment's. One [`model::PopulationModel`] is built
//! per environment and integrated by [`solver::integrate`].

pub mod config;
pub mod error;
pub mod growth;
pub mod model;
pub mod params;
#[cfg(feature = "plot")]
pub mod plot;
pub mod report;
pub mod simulation;
pub mod solver;
pub mod types;

pub use error::ModelError;
pub use growth::{GrowthCoefficient, GrowthPolicy};
pub use model::{OdeSystem, PopulationModel};
pub use types::{Environment, ParameterSet, Strain};
