// Stability Simulation - Scores how much a candidate body disturbs the baseline system
// Runs a fixed number of steps, records periodic snapshots, and compares them
// against an unperturbed reference trajectory.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::{Result, SweepError};
use crate::physics_engine::{
    Body, OrbitalSystem, Vector2, MASS_EARTH, MASS_MERCURY, MASS_MOON, MASS_SUN, MASS_VENUS,
};

/// Snapshots recorded per run when `max_runs >= SNAPSHOT_COUNT`
pub const SNAPSHOT_COUNT: usize = 10;

/// Positions of every tracked (non-candidate) body at one instant
pub type Snapshot = Vec<Vector2>;

// =============================================================================
// BASELINE ROSTER
// =============================================================================

/// Sun, Mercury, Venus and Earth (with the Moon's mass folded in), seeded
/// from heliocentric ephemeris values.
pub fn baseline_roster() -> Vec<Body> {
    vec![
        Body::new("Sun", Vector2::zero(), MASS_SUN, 0.0, 0.0),
        Body::new(
            "Mercury",
            Vector2::new(0.3590961172798053, -0.04164522874752517),
            MASS_MERCURY,
            0.029287836754110234,
            -3.2570492550785675,
        ),
        Body::new(
            "Venus",
            Vector2::new(0.5127350527183985, -0.5158182472028876),
            MASS_VENUS,
            0.02008004590994939,
            -3.9299884110350813,
        ),
        Body::new(
            "Earth",
            Vector2::new(0.97941231066402, 0.2024447197289333),
            MASS_EARTH + MASS_MOON,
            0.017200221950579502,
            -2.9377629737585336,
        ),
    ]
}

// =============================================================================
// CANDIDATE
// =============================================================================

/// The extra body under evaluation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub position: Vector2,
    pub mass: f64,
    pub speed: f64,
    /// Unset means "perpendicular to the line from the origin"
    pub angle: Option<f64>,
}

impl Candidate {
    pub fn new(position: Vector2, mass: f64) -> Self {
        Self {
            position,
            mass,
            speed: 0.0,
            angle: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_angle(mut self, angle: Option<f64>) -> Self {
        self.angle = angle;
        self
    }

    pub fn resolved_angle(&self) -> f64 {
        self.angle.unwrap_or_else(|| self.position.bearing() + PI)
    }

    pub fn to_body(&self) -> Body {
        Body::new(
            "Candidate",
            self.position,
            self.mass,
            self.speed,
            self.resolved_angle(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.position.x.is_finite() && self.position.y.is_finite()) {
            return Err(SweepError::invalid("candidate position must be finite"));
        }
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(SweepError::invalid(format!(
                "candidate mass must be positive, got {}",
                self.mass
            )));
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(SweepError::invalid(format!(
                "candidate speed must be non-negative, got {}",
                self.speed
            )));
        }
        if let Some(angle) = self.angle {
            if !angle.is_finite() {
                return Err(SweepError::invalid("candidate angle must be finite"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// REFERENCE TRAJECTORY
// =============================================================================

/// Snapshots of the unperturbed roster, the ground truth every run is scored against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceTrajectory {
    pub max_runs: usize,
    pub bodies: Vec<String>,
    pub snapshots: Vec<Snapshot>,
}

impl ReferenceTrajectory {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Accumulated L1 distance between `snapshots` and this reference
    pub fn divergence(&self, snapshots: &[Snapshot]) -> f64 {
        self.snapshots
            .iter()
            .zip(snapshots)
            .flat_map(|(expected, actual)| expected.iter().zip(actual))
            .map(|(expected, actual)| expected.manhattan(actual))
            .sum()
    }
}

// =============================================================================
// SIMULATION CONFIG & RESULTS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Number of one-day steps per run
    pub max_runs: usize,
    /// Bodies at or within this distance collide (AU)
    pub collision_dist: f64,
    /// Raw divergence at and beyond which the score is 0
    pub stability_cutoff: f64,
    pub check_for_collisions: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_runs: 1000,
            collision_dist: 0.001,
            stability_cutoff: 15.0,
            check_for_collisions: true,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_runs == 0 {
            return Err(SweepError::invalid("max_runs must be at least 1"));
        }
        if !(self.stability_cutoff.is_finite() && self.stability_cutoff > 0.0) {
            return Err(SweepError::invalid(format!(
                "stability_cutoff must be positive, got {}",
                self.stability_cutoff
            )));
        }
        if !(self.collision_dist.is_finite() && self.collision_dist >= 0.0) {
            return Err(SweepError::invalid(format!(
                "collision_dist must be non-negative, got {}",
                self.collision_dist
            )));
        }
        Ok(())
    }

    /// Steps between snapshots; step 0 is always sampled
    pub fn snapshot_interval(&self) -> usize {
        (self.max_runs / SNAPSHOT_COUNT).max(1)
    }

    pub fn snapshot_count(&self) -> usize {
        self.max_runs.min(SNAPSHOT_COUNT)
    }
}

/// Terminal state of one run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// `step` is `None` when the bodies already overlapped before the first step
    Collided { step: Option<usize> },
}

impl RunOutcome {
    pub fn is_collision(&self) -> bool {
        matches!(self, RunOutcome::Collided { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    pub outcome: RunOutcome,
    pub snapshots: Vec<Snapshot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StabilityScore {
    pub outcome: RunOutcome,
    /// Divergence before clamping, or the cutoff after a collision
    pub raw: f64,
    /// 1 = tracks the reference exactly, 0 = collided or fully diverged
    pub score: f64,
}

/// Clamp a raw divergence into `[0, cutoff]` and map it onto `[0, 1]`, best = 1
pub fn normalize_score(raw: f64, stability_cutoff: f64) -> f64 {
    let clamped = if raw.is_nan() {
        stability_cutoff
    } else {
        raw.clamp(0.0, stability_cutoff)
    };
    1.0 - clamped / stability_cutoff
}

// =============================================================================
// STABILITY SIMULATION
// =============================================================================

/// Immutable run settings plus the baseline roster; cheap to clone and share
/// across workers.
#[derive(Debug, Clone)]
pub struct StabilitySimulation {
    config: SimulationConfig,
    roster: Arc<[Body]>,
}

impl StabilitySimulation {
    pub fn new(config: SimulationConfig, roster: Vec<Body>) -> Result<Self> {
        config.validate()?;

        if roster.is_empty() {
            return Err(SweepError::invalid("baseline roster is empty"));
        }
        for body in &roster {
            if !(body.mass.is_finite() && body.mass > 0.0) {
                return Err(SweepError::invalid(format!(
                    "roster body '{}' has non-positive mass {}",
                    body.name, body.mass
                )));
            }
            if !(body.speed.is_finite() && body.speed >= 0.0) {
                return Err(SweepError::invalid(format!(
                    "roster body '{}' has invalid speed {}",
                    body.name, body.speed
                )));
            }
        }

        if config.max_runs < SNAPSHOT_COUNT {
            warn!(
                max_runs = config.max_runs,
                "fewer steps than snapshots; every step will be sampled"
            );
        }

        Ok(Self {
            config,
            roster: roster.into(),
        })
    }

    pub fn with_baseline(config: SimulationConfig) -> Result<Self> {
        Self::new(config, baseline_roster())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn roster(&self) -> &[Body] {
        &self.roster
    }

    /// Run the roster plus an optional candidate to completion or first collision
    pub fn run(&self, candidate: Option<&Candidate>) -> SimulationRun {
        let tracked = self.roster.len();
        let interval = self.config.snapshot_interval();
        let check = self.config.check_for_collisions;
        let collision_dist = self.config.collision_dist;

        let mut system = OrbitalSystem::new(self.roster.to_vec());
        if let Some(candidate) = candidate {
            system.add_body(candidate.to_body());
        }

        let mut snapshots = Vec::with_capacity(self.config.snapshot_count());

        if check && system.has_close_pair(collision_dist) {
            return SimulationRun {
                outcome: RunOutcome::Collided { step: None },
                snapshots,
            };
        }

        for step in 0..self.config.max_runs {
            system.advance();

            if step % interval == 0 && snapshots.len() < SNAPSHOT_COUNT {
                snapshots.push(system.positions(tracked));
            }

            if check && system.has_close_pair(collision_dist) {
                return SimulationRun {
                    outcome: RunOutcome::Collided { step: Some(step) },
                    snapshots,
                };
            }
        }

        SimulationRun {
            outcome: RunOutcome::Completed,
            snapshots,
        }
    }

    /// Record the unperturbed roster; fails if the roster collides with itself
    pub fn reference_trajectory(&self) -> Result<ReferenceTrajectory> {
        let run = self.run(None);
        if let RunOutcome::Collided { step } = run.outcome {
            return Err(SweepError::invalid(format!(
                "baseline roster collides on its own (step {:?})",
                step
            )));
        }

        Ok(ReferenceTrajectory {
            max_runs: self.config.max_runs,
            bodies: self.roster.iter().map(|b| b.name.clone()).collect(),
            snapshots: run.snapshots,
        })
    }

    /// Verify a reference was recorded with this roster and run length
    pub fn check_reference(&self, reference: &ReferenceTrajectory) -> Result<()> {
        let expected = self.config.snapshot_count();
        if reference.max_runs != self.config.max_runs || reference.len() != expected {
            return Err(SweepError::ReferenceMismatch {
                expected: format!("{} snapshots over {} runs", expected, self.config.max_runs),
                found: format!(
                    "{} snapshots over {} runs",
                    reference.len(),
                    reference.max_runs
                ),
            });
        }

        let tracked = self.roster.len();
        if let Some(bad) = reference.snapshots.iter().find(|s| s.len() != tracked) {
            return Err(SweepError::ReferenceMismatch {
                expected: format!("{} bodies per snapshot", tracked),
                found: format!("{} bodies per snapshot", bad.len()),
            });
        }

        Ok(())
    }

    /// Score a run without re-validating the reference; callers check it once up front
    pub fn score_unchecked(
        &self,
        candidate: Option<&Candidate>,
        reference: &ReferenceTrajectory,
    ) -> StabilityScore {
        let cutoff = self.config.stability_cutoff;
        let run = self.run(candidate);

        let raw = match run.outcome {
            RunOutcome::Collided { .. } => cutoff,
            RunOutcome::Completed => reference.divergence(&run.snapshots),
        };
        let score = normalize_score(raw, cutoff);

        trace!(outcome = ?run.outcome, raw, score, "simulation finished");

        StabilityScore {
            outcome: run.outcome,
            raw,
            score,
        }
    }

    /// Score one candidate (or none) against the reference trajectory
    pub fn score(
        &self,
        candidate: Option<&Candidate>,
        reference: &ReferenceTrajectory,
    ) -> Result<StabilityScore> {
        self.check_reference(reference)?;
        if let Some(candidate) = candidate {
            candidate.validate()?;
        }
        Ok(self.score_unchecked(candidate, reference))
    }
}

// =============================================================================
// TESTS
// =============================================================================
