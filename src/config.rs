//! Run configuration of the `twobar` binary.

use crate::core::SolveConfig;
use crate::equations::TrussProperties;
use crate::grid::arange;
use crate::truss::DesignSpace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a JSON run configuration.
pub const CONFIG_ENV: &str = "TWOBAR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Half-open `start..stop` axis sampled every `step`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl AxisRange {
    pub fn values(&self) -> Vec<f64> {
        arange(self.start, self.stop, self.step)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub height: AxisRange,
    pub diameter: AxisRange,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            height: AxisRange {
                start: 10.0,
                stop: 30.0,
                step: 2.0,
            },
            diameter: AxisRange {
                start: 1.0,
                stop: 3.0,
                step: 0.3,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub overview: PathBuf,
    pub detail: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overview: PathBuf::from("contour1.svg"),
            detail: PathBuf::from("contour2.svg"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub truss: TrussProperties,
    pub design: DesignSpace,
    pub solver: SolveConfig,
    pub grid: GridConfig,
    pub output: OutputConfig,
}

impl RunConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Defaults, or the file named by [`CONFIG_ENV`] when it is set.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_json_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SolverMethod;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RunConfig::from_json_str(
            r#"{"truss": {"load": 80.0}, "solver": {"method": "pso", "verbose": true}}"#,
        )
        .unwrap();

        assert_eq!(config.truss.load, 80.0);
        assert_eq!(config.truss.width, 60.0);
        assert_eq!(config.solver.method, SolverMethod::Pso);
        assert!(config.solver.verbose);
        assert_eq!(config.design, DesignSpace::default());
        assert_eq!(config.output.overview, PathBuf::from("contour1.svg"));
    }

    #[test]
    fn default_axes_match_worked_example() {
        let grid = GridConfig::default();
        assert_eq!(grid.height.values().len(), 10);
        assert_eq!(grid.diameter.values().len(), 7);
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(matches!(
            RunConfig::from_json_str("{\"truss\": 3}"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            RunConfig::from_json_file(Path::new("/nonexistent/twobar.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
