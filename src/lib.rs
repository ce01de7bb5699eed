// Orbital Sweep - Stability dataset generator
// Scores candidate planets against an N-body reference run over a parameter grid

pub mod config;
pub mod dataset;
pub mod ephemeris;
pub mod error;
pub mod physics_engine;
pub mod progress;
pub mod stability;
pub mod sweep;

pub use config::SweepSettings;
pub use error::{Result, SweepError};
pub use physics_engine::{attract, compose_velocity, move_position, Body, OrbitalSystem, Vector2};
pub use stability::{
    baseline_roster, normalize_score, Candidate, ReferenceTrajectory, RunOutcome,
    SimulationConfig, StabilityScore, StabilitySimulation,
};
pub use sweep::{
    DatasetRow, GridSpec, Resolution, Sample, SearchRegion, SweepDriver, SweepOutput, SweepPlan,
    SweepReport,
};
