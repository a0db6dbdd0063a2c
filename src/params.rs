// Parameter loading - turns `key:value` text blocks into strain and environment records
//
// Directory layout:
//   <vars>/<strain file>...           one strain per file
//   <vars>/environments/<file>...     one environment per file

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ModelError;
use crate::types::{Environment, ParameterSet, Strain};

/// Name of the environments sub-directory; top-level files containing it are not strains.
pub const ENVIRONMENTS_DIR: &str = "environments";

/// Split one block into trimmed `(key, value)` pairs, skipping blank lines.
fn entries<'a>(
    source: &'a str,
    text: &'a str,
) -> impl Iterator<Item = Result<(&'a str, &'a str), ModelError>> + 'a {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(move |(idx, line)| match line.split_once(':') {
            Some((key, value)) => Ok((key.trim(), value.trim())),
            None => Err(ModelError::malformed(
                source,
                format!("line {} is not of the form key:value", idx + 1),
            )),
        })
}

fn number(source: &str, key: &str, value: &str) -> Result<f64, ModelError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ModelError::malformed(
            source,
            format!("value {:?} for {} is not a finite number", value, key),
        )),
    }
}

fn required(source: &str, key: &str, value: Option<f64>) -> Result<f64, ModelError> {
    value.ok_or_else(|| ModelError::malformed(source, format!("missing required key {}", key)))
}

/// Parse one strain block. `source` names the block in errors and becomes the strain label.
pub fn parse_strain_block(source: &str, text: &str) -> Result<Strain, ModelError> {
    let mut r = None;
    let mut h = None;
    let mut m = None;
    let mut n = 0.0;
    let mut s = false;
    let mut c = None;

    for entry in entries(source, text) {
        let (key, value) = entry?;
        match key {
            "r" => r = Some(number(source, key, value)?),
            "h" => h = Some(number(source, key, value)?),
            "m" => m = Some(number(source, key, value)?),
            "N" => n = number(source, key, value)?,
            "S" => s = value == "T",
            "c" => c = Some(number(source, key, value)?),
            other => {
                return Err(ModelError::malformed(
                    source,
                    format!("unexpected strain key {:?}", other),
                ))
            }
        }
    }

    if n < 0.0 {
        return Err(ModelError::malformed(
            source,
            format!("initial population N = {} is negative", n),
        ));
    }

    Ok(Strain::new(
        source,
        required(source, "r", r)?,
        required(source, "h", h)?,
        required(source, "m", m)?,
        n,
        s,
        required(source, "c", c)?,
    ))
}

/// Parse one environment block. Any key containing `h` (other than the exact
/// keys checked first) is the habitat value, so `moisture_h:0.3` works.
pub fn parse_environment_block(source: &str, text: &str) -> Result<Environment, ModelError> {
    let mut beta = None;
    let mut alpha = None;
    let mut h = None;
    let mut k = None;
    let mut name = None;

    for entry in entries(source, text) {
        let (key, value) = entry?;
        match key {
            "beta" => beta = Some(number(source, key, value)?),
            "alpha" => alpha = Some(number(source, key, value)?),
            "k" => k = Some(number(source, key, value)?),
            "name" => name = Some(value.to_string()),
            other if other.contains('h') => h = Some(number(source, key, value)?),
            other => {
                return Err(ModelError::malformed(
                    source,
                    format!("unexpected environment key {:?}", other),
                ))
            }
        }
    }

    Ok(Environment::new(
        name.unwrap_or_else(|| source.to_string()),
        required(source, "beta", beta)?,
        required(source, "alpha", alpha)?,
        required(source, "h", h)?,
        required(source, "k", k)?,
    ))
}

/// Regular files in `dir`, sorted by file name so strain order is stable.
fn sorted_files(dir: &Path, what: &'static str) -> Result<Vec<PathBuf>, ModelError> {
    let access = |e: std::io::Error| ModelError::Access {
        what,
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(access)? {
        let entry = entry.map_err(access)?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_block(path: &Path) -> Result<(String, String), ModelError> {
    let text = fs::read_to_string(path).map_err(|e| ModelError::Access {
        what: "parameter file",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((stem, text))
}

/// Load every strain and environment under `dir`. The first failure aborts the load.
pub fn load_parameters(dir: impl AsRef<Path>) -> Result<ParameterSet, ModelError> {
    let dir = dir.as_ref();
    info!(path = %dir.display(), "loading parameters");

    let mut strains = Vec::new();
    for path in sorted_files(dir, "variables folder")? {
        let is_environment_file = path
            .file_name()
            .map(|n| n.to_string_lossy().contains(ENVIRONMENTS_DIR))
            .unwrap_or(false);
        if is_environment_file {
            continue;
        }
        let (stem, text) = read_block(&path)?;
        let strain = parse_strain_block(&stem, &text)?;
        debug!(strain = %strain.label, "parsed strain");
        strains.push(strain);
    }

    let mut environments = Vec::new();
    for path in sorted_files(&dir.join(ENVIRONMENTS_DIR), "environments folder")? {
        let (stem, text) = read_block(&path)?;
        let env = parse_environment_block(&stem, &text)?;
        debug!(environment = %env.name, "parsed environment");
        environments.push(env);
    }

    info!(
        strains = strains.len(),
        environments = environments.len(),
        "parameters loaded"
    );
    Ok(ParameterSet {
        environments,
        strains,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn parses_full_strain_block() {
        let strain =
            parse_strain_block("fungus1", "r:1.2\nh: 0.5 \nm:2\nN:10\nS:T\nc:0.8\n").unwrap();
        assert_eq!(strain.label, "fungus1");
        assert_eq!(strain.intrinsic_rate, 1.2);
        assert_eq!(strain.habitat_value, 0.5);
        assert_eq!(strain.mismatch_sensitivity, 2.0);
        assert_eq!(strain.initial_population, 10.0);
        assert!(strain.is_decomposer);
        assert_eq!(strain.carrying_contribution, 0.8);
    }

    #[test]
    fn strain_defaults_population_and_decomposer_flag() {
        let strain = parse_strain_block("f", "r:1\nh:0\nm:1\nc:0").unwrap();
        assert_eq!(strain.initial_population, 0.0);
        assert!(!strain.is_decomposer);
    }

    #[test]
    fn decomposer_flag_requires_exact_t() {
        let yes = parse_strain_block("f", "r:1\nh:0\nm:1\nc:0\nS: T ").unwrap();
        let no = parse_strain_block("f", "r:1\nh:0\nm:1\nc:0\nS:true").unwrap();
        assert!(yes.is_decomposer);
        assert!(!no.is_decomposer);
    }

    #[test]
    fn unknown_strain_key_is_malformed() {
        let err = parse_strain_block("bad", "r:1\nfoo:1.0\nh:0\nm:1\nc:0").unwrap_err();
        match err {
            ModelError::MalformedInput { source_name, reason } => {
                assert_eq!(source_name, "bad");
                assert!(reason.contains("foo"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn non_numeric_value_is_malformed() {
        let err = parse_strain_block("f", "r:fast\nh:0\nm:1\nc:0").unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput { .. }));
    }

    #[test]
    fn non_finite_values_are_malformed() {
        for bad in ["NaN", "inf", "-inf"] {
            let strain = format!("r:1\nh:0\nm:{}\nc:0", bad);
            let err = parse_strain_block("f", &strain).unwrap_err();
            assert!(matches!(err, ModelError::MalformedInput { .. }), "m:{}", bad);

            let env = format!("beta:0\nalpha:0\nh:0\nk:{}", bad);
            let err = parse_environment_block("e", &env).unwrap_err();
            assert!(matches!(err, ModelError::MalformedInput { .. }), "k:{}", bad);
        }
    }

    #[test]
    fn missing_required_key_is_malformed() {
        let err = parse_strain_block("f", "r:1\nh:0\nm:1").unwrap_err();
        match err {
            ModelError::MalformedInput { reason, .. } => assert!(reason.contains('c')),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let err = parse_strain_block("f", "r 1").unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput { .. }));
    }

    #[test]
    fn negative_initial_population_is_malformed() {
        let err = parse_strain_block("f", "r:1\nh:0\nm:1\nc:0\nN:-2").unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput { .. }));
    }

    #[test]
    fn environment_habitat_key_matches_by_substring() {
        let env = parse_environment_block(
            "env1",
            "beta:0.5\nalpha:0.1\nmoisture_h:0.3\nk:1000\nname: semi-arid\n",
        )
        .unwrap();
        assert_eq!(env.name, "semi-arid");
        assert_eq!(env.dispersal_rate, 0.5);
        assert_eq!(env.alpha, 0.1);
        assert_eq!(env.habitat_value, 0.3);
        assert_eq!(env.carrying_capacity, 1000.0);
    }

    #[test]
    fn environment_name_falls_back_to_source() {
        let env = parse_environment_block("arid", "beta:0\nalpha:0\nh:0\nk:1").unwrap();
        assert_eq!(env.name, "arid");
    }

    #[test]
    fn unknown_environment_key_is_malformed() {
        let err = parse_environment_block("e", "beta:0\nalpha:0\nh:0\nk:1\nfoo:1.0").unwrap_err();
        assert!(matches!(err, ModelError::MalformedInput { .. }));
    }

    #[test]
    fn loads_directory_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b_strain.txt", "r:2\nh:0\nm:1\nc:0\nN:3");
        write(dir.path(), "a_strain.txt", "r:1\nh:0\nm:1\nc:0\nN:1");
        fs::create_dir(dir.path().join(ENVIRONMENTS_DIR)).unwrap();
        write(
            &dir.path().join(ENVIRONMENTS_DIR),
            "arid.txt",
            "beta:0.1\nalpha:0\nh:0\nk:10\nname:arid",
        );

        let set = load_parameters(dir.path()).unwrap();
        assert_eq!(set.strains.len(), 2);
        assert_eq!(set.strains[0].label, "a_strain");
        assert_eq!(set.strains[1].label, "b_strain");
        assert_eq!(set.environments.len(), 1);
        assert_eq!(set.environments[0].name, "arid");
    }

    #[test]
    fn missing_environments_folder_is_access_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "strain.txt", "r:1\nh:0\nm:1\nc:0");
        let err = load_parameters(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Access {
                what: "environments folder",
                ..
            }
        ));
    }

    #[test]
    fn missing_variables_folder_is_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_parameters(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ModelError::Access { .. }));
    }

    #[test]
    fn one_bad_file_aborts_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.txt", "r:1\nh:0\nm:1\nc:0");
        write(dir.path(), "worse.txt", "r:1\nh:0\nm:1\nc:0\nfoo:1.0");
        fs::create_dir(dir.path().join(ENVIRONMENTS_DIR)).unwrap();
        let err = load_parameters(dir.path()).unwrap_err();
        match err {
            ModelError::MalformedInput { source_name, .. } => assert_eq!(source_name, "worse"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
