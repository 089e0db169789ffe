//! The flat configuration struct: every numeric knob the GVI-GH
//! optimizer, the PGCS outer loop, and their shared factor library need,
//! as one `#[derive(Deserialize)]` struct with no section sub-structs.
//!
//! File resolution: an explicit `--config` path first, then a user
//! config directory, then `./config/config.toml`, erroring with
//! [`ConfigError::NoConfigFile`] if none exists.

#![allow(clippy::module_name_repetitions)]

use std::path::Path;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

/// Errors raised while locating, reading, or parsing a [`Config`] file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file's contents are not valid TOML, or are missing a field
    /// with no default.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Neither an explicit `--config` path nor any default location
    /// held a config file.
    #[error("no config file found")]
    NoConfigFile,
}

/// The flat configuration struct enumerated in Every field
/// has a default so that `gvi_cli --default` can run without a config
/// file at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// State dimension.
    pub nx: usize,
    /// Control dimension.
    pub nu: usize,
    /// Planning horizon.
    pub total_time: f64,
    /// Number of support states; `Δt = total_time / (nt - 1)`.
    pub nt: usize,

    /// Process-noise intensity for the minimum-acceleration GP prior.
    pub coeff_qc: f64,

    /// Obstacle-cost scale `σ_obs`.
    pub sig_obs: f64,
    /// Hinge margin `eps` for the obstacle cost.
    pub eps_sdf: f64,
    /// Robot body-sphere radius (consumed by the external collision
    /// collaborator, carried here since it is still one of the spec's
    /// flat scalar knobs).
    pub radius: f64,

    /// Base `γ` of the GVI-GH backtracking geometric sequence.
    pub step_size: f64,
    /// The free-energy margin `ε` a backtracking proposal must clear.
    pub backtrack_margin: f64,
    /// Scalar multiplying the identity for the initial joint precision.
    pub init_precision_factor: f64,
    /// Inverse variance for the fixed start/goal priors.
    pub boundary_penalties: f64,

    /// Steady-state inverse temperature.
    pub temperature: f64,
    /// Inverse temperature during the initial smoothing phase.
    pub high_temperature: f64,
    /// Number of leading iterations using `high_temperature`.
    pub low_temp_iterations: usize,

    /// GVI-GH/PGCS termination tolerance on successive cost change.
    pub stop_err: f64,
    /// Outer-iteration cap (shared by both engines).
    pub max_iter: usize,
    /// GVI-GH backtrack attempts before committing the last proposal.
    pub max_backtrack: u32,

    /// PGCS proximal parameter `η`.
    pub eta: f64,
    /// PGCS dynamics-noise coefficient `ε`.
    pub eps: f64,

    /// Boundary covariance diagonal at `t=0`.
    pub sig0: f64,
    /// Boundary covariance diagonal at `t=T`.
    pub sig_t: f64,
    /// Boundary mean at `t=0`.
    pub m0: Vec<f64>,
    /// Boundary mean at `t=T`.
    pub m_t: Vec<f64>,

    /// Gauss-Hermite cubature degree for nonlinear factors.
    pub gh_degree: usize,
    /// Cubature node-count cap.
    pub max_cubature_points: usize,
    /// Eigenvalue truncation tolerance for PGCS's `(BBᵀ)⁺` pseudoinverse.
    pub pinv_tolerance: f64,

    /// Name of the benchmark map, passed through to the external SDF
    /// loader.
    pub map_name: String,
    /// Path to the SDF grid file, passed through to the external SDF
    /// loader.
    pub sdf_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nx: 4,
            nu: 2,
            total_time: 5.0,
            nt: 11,
            coeff_qc: 1.0,
            sig_obs: 1.0,
            eps_sdf: 0.2,
            radius: 0.3,
            step_size: 0.9,
            backtrack_margin: 1e-10,
            init_precision_factor: 10.0,
            boundary_penalties: 1e4,
            temperature: 1.0,
            high_temperature: 10.0,
            low_temp_iterations: 10,
            stop_err: 1e-3,
            max_iter: 50,
            max_backtrack: 20,
            eta: 0.1,
            eps: 0.01,
            sig0: 1e-3,
            sig_t: 1e-3,
            m0: vec![0.0, 0.0, 0.0, 0.0],
            m_t: vec![5.5, 0.0, 0.0, 0.0],
            gh_degree: 6,
            max_cubature_points: 10_000,
            pinv_tolerance: 1e-9,
            map_name: "default".to_string(),
            sdf_file: "config/sdf.csv".to_string(),
        }
    }
}

impl Config {
    /// Parses a config from its TOML contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if `contents` is not valid TOML.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads and parses a config from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Resolves a config file: `path` if given, else a user config
    /// directory (`<config dir>/gvi/config.toml`), else
    /// `./config/config.toml`, in that order — the first path that
    /// exists wins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigFile`] if none of the candidate
    /// paths exist, or any error [`Config::from_file`] can return.
    pub fn read<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let candidate = path
        .map(|p| p.as_ref().to_path_buf())
        .into_iter()
        .chain(default_paths())
        .find(|p| p.exists());

        match candidate {
            Some(path) => Self::from_file(path),
            None => Err(ConfigError::NoConfigFile),
        }
    }
}

fn default_paths() -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    if let Some(base_dirs) = BaseDirs::new() {
        paths.push(base_dirs.config_dir().join("gvi").join("config.toml"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config/config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).expect("default config serializes");
        let parsed = Config::parse(&serialized).expect("serialized default config parses");
        assert_eq!(parsed, config);
    }

    #[test]
    fn parse_fills_in_missing_fields_from_default() {
        let config = Config::parse("nx = 6\nnt = 21\n").expect("partial config parses");
        assert_eq!(config.nx, 6);
        assert_eq!(config.nt, 21);
        assert_eq!(config.nu, Config::default().nu);
    }

    #[test]
    fn read_reports_no_config_file_when_nothing_resolves() {
        let missing = std::path::PathBuf::from("/nonexistent/gvi-config-test/config.toml");
        let err = Config::read(Some(&missing)).expect_err("the candidate path does not exist");
        assert!(matches!(err, ConfigError::NoConfigFile));
    }

    #[test]
    fn read_uses_an_explicit_path_when_it_exists() {
        let dir = std::env::temp_dir().join(format!("gvi-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir creation");
        let path = dir.join("config.toml");
        std::fs::write(&path, "nx = 8\n").expect("write temp config");

        let config = Config::read(Some(&path)).expect("explicit path should be read");
        assert_eq!(config.nx, 8);

        std::fs::remove_dir_all(&dir).ok();
    }
}
