// Configuration - Layered sweep settings
// Defaults < JSON settings file < .env / environment < command-line flags

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SweepError};
use crate::stability::SimulationConfig;
use crate::sweep::{GridSpec, Resolution, SearchRegion};

pub const ENV_WORKERS: &str = "ORBITAL_SWEEP_WORKERS";
pub const ENV_OUTPUT: &str = "ORBITAL_SWEEP_OUTPUT";
pub const ENV_MAX_RUNS: &str = "ORBITAL_SWEEP_MAX_RUNS";
pub const ENV_CUTOFF: &str = "ORBITAL_SWEEP_CUTOFF";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepSettings {
    /// Two opposite corners of the search rectangle: [x1, y1, x2, y2]
    pub search_space: [f64; 4],
    pub resolution: Resolution,
    pub precision: u32,
    pub masses: Vec<f64>,
    pub record_mass: bool,

    pub max_runs: usize,
    pub collision_dist: f64,
    pub stability_cutoff: f64,
    pub check_for_collisions: bool,

    pub candidate_speed: f64,
    pub candidate_angle: Option<f64>,

    /// Seconds per simulation; measured before dispatch when unset
    pub sample_cost_secs: Option<f64>,
    /// Defaults to the machine's available parallelism
    pub workers: Option<usize>,

    pub output_dir: PathBuf,
    pub write_header: bool,
    /// JSON roster replacing the built-in inner solar system
    pub roster_file: Option<PathBuf>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            search_space: [-1.5, 1.5, 1.5, -1.5],
            resolution: Resolution::Step(0.01),
            precision: 14,
            masses: vec![1e26, 1e27, 1e28],
            record_mass: true,
            max_runs: 1000,
            collision_dist: 0.001,
            stability_cutoff: 15.0,
            check_for_collisions: true,
            candidate_speed: 0.015,
            candidate_angle: None,
            sample_cost_secs: None,
            workers: None,
            output_dir: PathBuf::from("output"),
            write_header: false,
            roster_file: None,
        }
    }
}

impl SweepSettings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Defaults, overlaid with `path` if given, then with the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // a missing .env is normal
        dotenv::dotenv().ok();

        let mut settings = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(workers) = parse_var::<usize>(&lookup, ENV_WORKERS)? {
            self.workers = Some(workers);
        }
        if let Some(output) = lookup(ENV_OUTPUT) {
            self.output_dir = PathBuf::from(output);
        }
        if let Some(max_runs) = parse_var::<usize>(&lookup, ENV_MAX_RUNS)? {
            self.max_runs = max_runs;
        }
        if let Some(cutoff) = parse_var::<f64>(&lookup, ENV_CUTOFF)? {
            self.stability_cutoff = cutoff;
        }
        Ok(())
    }

    pub fn region(&self) -> Result<SearchRegion> {
        let [x1, y1, x2, y2] = self.search_space;
        SearchRegion::from_corners(x1, y1, x2, y2)
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            max_runs: self.max_runs,
            collision_dist: self.collision_dist,
            stability_cutoff: self.stability_cutoff,
            check_for_collisions: self.check_for_collisions,
        }
    }

    pub fn grid(&self) -> Result<GridSpec> {
        Ok(GridSpec {
            region: self.region()?,
            resolution: self.resolution,
            masses: self.masses.clone(),
            precision: self.precision,
            candidate_speed: self.candidate_speed,
            candidate_angle: self.candidate_angle,
            record_mass: self.record_mass,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn sample_cost(&self) -> Option<Duration> {
        self.sample_cost_secs
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }

    /// Fail-fast checks that need no simulation work
    pub fn validate(&self) -> Result<()> {
        self.simulation().validate()?;
        self.region()?;
        self.resolution.validate()?;

        if self.masses.is_empty() {
            return Err(SweepError::invalid("mass set is empty"));
        }
        if self.workers == Some(0) {
            return Err(SweepError::invalid("worker count must be at least 1"));
        }
        if let Some(cost) = self.sample_cost_secs {
            if !(cost.is_finite() && cost >= 0.0) {
                return Err(SweepError::invalid(format!(
                    "sample cost must be non-negative, got {}",
                    cost
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SweepError::invalid(format!("{}={:?} is not a valid value", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_sweep() {
        let settings = SweepSettings::default();
        settings.validate().unwrap();

        let region = settings.region().unwrap();
        assert_eq!(region, SearchRegion::new(-1.5, -1.5, 1.5, 1.5).unwrap());
        assert_eq!(settings.simulation(), SimulationConfig::default());
        assert_eq!(settings.grid().unwrap().masses, vec![1e26, 1e27, 1e28]);
        assert!(settings.worker_count() >= 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: SweepSettings = serde_json::from_str(
            r#"{"masses": [5e27], "resolution": {"count": 3}, "max_runs": 500}"#,
        )
        .unwrap();

        assert_eq!(settings.masses, vec![5e27]);
        assert_eq!(settings.resolution, Resolution::Count(3));
        assert_eq!(settings.max_runs, 500);
        assert_eq!(settings.stability_cutoff, 15.0);
        assert_eq!(settings.candidate_speed, 0.015);
    }

    #[test]
    fn test_settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        fs::write(&path, r#"{"search_space": [0.0, 0.0, 1.0, 1.0], "workers": 3}"#).unwrap();

        let settings = SweepSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.workers, Some(3));
        assert_eq!(settings.region().unwrap().x_max, 1.0);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_WORKERS, "6"),
            (ENV_OUTPUT, "/tmp/sweeps"),
            (ENV_MAX_RUNS, "250"),
            (ENV_CUTOFF, " 3.5 "),
        ]
        .into_iter()
        .collect();

        let mut settings = SweepSettings::default();
        settings
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.workers, Some(6));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/sweeps"));
        assert_eq!(settings.max_runs, 250);
        assert_eq!(settings.stability_cutoff, 3.5);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut settings = SweepSettings::default();
        let err = settings
            .apply_env(|key| (key == ENV_WORKERS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, SweepError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let flat = SweepSettings {
            search_space: [0.0, 1.0, 2.0, 1.0],
            ..SweepSettings::default()
        };
        assert!(flat.validate().is_err());

        let no_masses = SweepSettings {
            masses: Vec::new(),
            ..SweepSettings::default()
        };
        assert!(no_masses.validate().is_err());

        let bad_cutoff = SweepSettings {
            stability_cutoff: -1.0,
            ..SweepSettings::default()
        };
        assert!(bad_cutoff.validate().is_err());

        let no_workers = SweepSettings {
            workers: Some(0),
            ..SweepSettings::default()
        };
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn test_huge_sample_cost_saturates() {
        let settings = SweepSettings {
            sample_cost_secs: Some(1e30),
            ..SweepSettings::default()
        };
        settings.validate().unwrap();
        assert_eq!(settings.sample_cost(), Some(Duration::MAX));
    }
}
