// Run configuration - loaded from YAML/JSON, then overridden from the command line

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ModelError;
use crate::growth::GrowthPolicy;
use crate::solver::{SolverKind, SolverSettings};

/// Files searched, in order, when no config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = ["mycocomp.yaml", "mycocomp.yml", "mycocomp.json"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

// Configuration struct for simulation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Inputs
    pub vars_dir: PathBuf,

    // Time grid
    pub t_max: f64,
    pub t_steps: usize,

    // Model
    pub policy: GrowthPolicy,

    // Integration
    pub solver: SolverKind,
    pub substeps: usize,
    pub rtol: f64,
    pub atol: f64,

    // Output
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
    pub plot: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let solver = SolverSettings::default();
        Self {
            vars_dir: PathBuf::from("./vars"),
            t_max: 10.0,
            t_steps: 1000,
            policy: GrowthPolicy::Full,
            solver: solver.kind,
            substeps: solver.substeps,
            rtol: solver.rtol,
            atol: solver.atol,
            output_dir: PathBuf::from("./output"),
            formats: vec![OutputFormat::Csv, OutputFormat::Json],
            plot: true,
        }
    }
}

impl SimulationConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::Access {
            what: "config file",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| ModelError::Config {
                reason: format!("{}: {}", path.display(), e),
            })?,
            "json" => serde_json::from_str(&text).map_err(|e| ModelError::Config {
                reason: format!("{}: {}", path.display(), e),
            })?,
            other => {
                return Err(ModelError::Config {
                    reason: format!("unsupported config extension {:?}", other),
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// First default path that exists, otherwise built-in defaults
    pub fn from_default_paths() -> Result<Self, ModelError> {
        for candidate in DEFAULT_CONFIG_PATHS {
            if Path::new(candidate).is_file() {
                return Self::from_file(candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let fail = |reason: String| Err(ModelError::Config { reason });
        if !(self.t_max > 0.0) || !self.t_max.is_finite() {
            return fail(format!("t_max must be positive and finite, got {}", self.t_max));
        }
        if self.t_steps < 2 {
            return fail(format!("t_steps must be at least 2, got {}", self.t_steps));
        }
        if self.substeps == 0 {
            return fail("substeps must be at least 1".to_string());
        }
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !positive(self.rtol) || !positive(self.atol) {
            return fail(format!(
                "tolerances must be positive and finite, got rtol = {}, atol = {}",
                self.rtol, self.atol
            ));
        }
        Ok(())
    }

    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            kind: self.solver,
            substeps: self.substeps,
            rtol: self.rtol,
            atol: self.atol,
        }
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.t_steps, 1000);
        assert_eq!(config.policy, GrowthPolicy::Full);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "t_max: 15\npolicy: simplified\nsolver: rk4\n").unwrap();

        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.t_max, 15.0);
        assert_eq!(config.policy, GrowthPolicy::Simplified);
        assert_eq!(config.solver, SolverKind::Rk4);
        assert_eq!(config.t_steps, 1000);
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"t_steps": 50, "formats": ["csv"], "plot": false}"#).unwrap();

        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.t_steps, 50);
        assert!(config.wants(OutputFormat::Csv));
        assert!(!config.wants(OutputFormat::Json));
        assert!(!config.plot);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "t_steps: 1\n").unwrap();
        assert!(matches!(
            SimulationConfig::from_file(&path),
            Err(ModelError::Config { .. })
        ));
    }

    #[test]
    fn infinite_horizon_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "t_max: .inf\n").unwrap();
        assert!(matches!(
            SimulationConfig::from_file(&path),
            Err(ModelError::Config { .. })
        ));

        let config = SimulationConfig {
            rtol: f64::INFINITY,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "t_max = 1").unwrap();
        assert!(SimulationConfig::from_file(&path).is_err());
    }

    #[test]
    fn missing_file_is_access_error() {
        let err = SimulationConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ModelError::Access { .. }));
    }
}
