//! Tunable parameters and their JSON form.

use std::fs;
use std::path::Path;
use std::time::Duration;

use segmir_core::SolverParams;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Timing and retry policy of the alignment traversal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Wait after issuing an edge move before polling the panel.
    pub settle_delay_ms: u64,
    /// Poll period while the moving panel is busy.
    pub poll_interval_ms: u64,
    /// Moves per edge before giving up; `None` retries until stopped.
    pub max_align_attempts: Option<u32>,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            settle_delay_ms: 400,
            poll_interval_ms: 200,
            max_align_attempts: None,
        }
    }
}

impl AlignmentParams {
    #[inline]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Closed interval `[lower, upper]` for one fitted parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// Levenberg–Marquardt settings of the global pose fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    /// Bounds on `x, y, z, rot_x, rot_y, rot_z`.
    pub bounds: [Bound; 6],
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub patience: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            bounds: [
                Bound::new(-20.0, 20.0),
                Bound::new(-20.0, 20.0),
                Bound::new(-10.0, 40.0),
                Bound::new(-0.05, 0.05),
                Bound::new(-0.05, 0.05),
                Bound::new(-0.05, 0.05),
            ],
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            patience: 200,
        }
    }
}

/// All controller parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    pub solver: SolverParams,
    pub alignment: AlignmentParams,
    pub fit: FitParams,
}

impl ControlParams {
    /// Load parameters from JSON on disk; missing fields take defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write these parameters to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let params: ControlParams =
            serde_json::from_str(r#"{ "alignment": { "max_align_attempts": 5 } }"#).expect("parse");
        assert_eq!(params.alignment.max_align_attempts, Some(5));
        assert_eq!(params.alignment.poll_interval(), Duration::from_millis(200));
        assert_eq!(params.solver.max_iterations, 100);
        assert_eq!(params.fit.bounds[2], Bound::new(-10.0, 40.0));
    }

    #[test]
    fn params_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("control.json");
        let mut params = ControlParams::default();
        params.alignment.settle_delay_ms = 250;
        params.write_json(&path).expect("write");
        assert_eq!(ControlParams::load_json(&path).expect("load"), params);
        assert!(ControlParams::load_json(dir.path().join("missing.json")).is_err());
    }
}
