// Console descriptions and trajectory export

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{OutputFormat, SimulationConfig};
use crate::error::ModelError;
use crate::model::PopulationModel;
use crate::simulation::EnvironmentRun;
use crate::types::ParameterSet;

/// Print the loaded parameters and the derived per-environment coefficients
pub fn describe(params: &ParameterSet, models: &[PopulationModel]) {
    println!("\n\n Environments:");
    for env in &params.environments {
        println!("{}\n", env);
    }

    println!("\n\n Fungi:");
    for strain in &params.strains {
        println!("[{}]\n{}\n", strain.label, strain);
    }

    println!("\n\n Runtime Fungi:");
    for model in models {
        println!("-- {} ({} growth)", model.name(), model.policy);
        for (strain, coeff) in model.strains().iter().zip(model.coefficients()) {
            println!("[{}]\n{}\n", strain.label, coeff);
        }
    }
}

/// File-name-safe form of an environment name
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "environment".to_string()
    } else {
        stem
    }
}

/// `t,<strain...>,decomposition`, one row per time point
pub fn write_csv(run: &EnvironmentRun, path: &Path) -> Result<(), ModelError> {
    let file = File::create(path).map_err(|e| ModelError::output(path, e))?;
    let mut out = BufWriter::new(file);
    write_csv_to(run, &mut out).map_err(|e| ModelError::output(path, e))?;
    out.flush().map_err(|e| ModelError::output(path, e))
}

fn write_csv_to(run: &EnvironmentRun, out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "t")?;
    for label in &run.strain_labels {
        write!(out, ",{}", label)?;
    }
    writeln!(out, ",decomposition")?;

    let rows = run
        .trajectory
        .times
        .iter()
        .zip(&run.trajectory.states)
        .zip(&run.decomposition);
    for ((t, state), decomposition) in rows {
        write!(out, "{}", t)?;
        for n in state {
            write!(out, ",{}", n)?;
        }
        writeln!(out, ",{}", decomposition)?;
    }
    Ok(())
}

pub fn write_json(run: &EnvironmentRun, path: &Path) -> Result<(), ModelError> {
    let file = File::create(path).map_err(|e| ModelError::output(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), run).map_err(|e| ModelError::output(path, e))
}

/// Write every configured output for every run; returns the files written
pub fn write_outputs(
    runs: &[EnvironmentRun],
    config: &SimulationConfig,
) -> Result<Vec<PathBuf>, ModelError> {
    let dir = &config.output_dir;
    fs::create_dir_all(dir).map_err(|e| ModelError::output(dir, e))?;

    let mut written = Vec::new();
    for run in runs {
        let stem = file_stem(&run.environment);
        if config.wants(OutputFormat::Csv) {
            let path = dir.join(format!("{}.csv", stem));
            write_csv(run, &path)?;
            written.push(path);
        }
        if config.wants(OutputFormat::Json) {
            let path = dir.join(format!("{}.json", stem));
            write_json(run, &path)?;
            written.push(path);
        }
        #[cfg(feature = "plot")]
        if config.plot {
            written.extend(crate::plot::render_run(run, dir)?);
        }
    }

    info!(files = written.len(), dir = %dir.display(), "outputs written");
    Ok(written)
}
