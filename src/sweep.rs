// Sweep Driver - Evaluates the stability score over a sampled parameter grid
// Builds the (mass, y, x) sample grid, splits it into contiguous chunks, runs
// the chunks on a fixed-size blocking pool and stitches the rows back in order.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{Result, SweepError};
use crate::physics_engine::Vector2;
use crate::progress::{ProgressSnapshot, SweepProgress};
use crate::stability::{Candidate, ReferenceTrajectory, StabilitySimulation};

/// Upper bound on grid points along one axis
pub const MAX_AXIS_POINTS: usize = 1_000_000;

// =============================================================================
// SEARCH SPACE
// =============================================================================

/// Axis-aligned search rectangle (AU)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchRegion {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl SearchRegion {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let region = Self {
            x_min,
            y_min,
            x_max,
            y_max,
        };
        region.validate()?;
        Ok(region)
    }

    /// Build from two opposite corners given in any order
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        Self::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
    }

    pub fn validate(&self) -> Result<()> {
        let all_finite = [self.x_min, self.y_min, self.x_max, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(SweepError::invalid("search region bounds must be finite"));
        }
        if self.x_max <= self.x_min || self.y_max <= self.y_min {
            return Err(SweepError::invalid(format!(
                "search region ({}, {}) - ({}, {}) is inverted or has zero area",
                self.x_min, self.y_min, self.x_max, self.y_max
            )));
        }
        Ok(())
    }

}

/// Sampling density along each axis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Fixed spacing starting at the lower bound, upper bound included when reached
    Step(f64),
    /// Evenly spaced points with both bounds included
    Count(usize),
}

impl Resolution {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Resolution::Step(step) if !(step.is_finite() && step > 0.0) => Err(
                SweepError::invalid(format!("step size must be positive, got {}", step)),
            ),
            Resolution::Count(0) => Err(SweepError::invalid("sample count must be at least 1")),
            _ => Ok(()),
        }
    }

    /// Grid coordinates from `min` to `max`, ascending
    pub fn axis(&self, min: f64, max: f64) -> Result<Vec<f64>> {
        self.validate()?;

        // counted in f64 so a tiny step cannot overflow the cast
        let count = match *self {
            Resolution::Step(step) => ((max - min) / step + 1e-9).floor() + 1.0,
            Resolution::Count(count) => count as f64,
        };
        if count > MAX_AXIS_POINTS as f64 {
            return Err(SweepError::invalid(format!(
                "{} points per axis exceeds the limit of {}",
                count, MAX_AXIS_POINTS
            )));
        }
        let count = count as usize;

        let points = match *self {
            Resolution::Step(step) => (0..count).map(|i| min + i as f64 * step).collect(),
            Resolution::Count(1) => vec![min],
            Resolution::Count(count) => {
                let span = max - min;
                let last = (count - 1) as f64;
                (0..count)
                    .map(|i| min + span * (i as f64 / last))
                    .collect()
            }
        };
        Ok(points)
    }
}

/// Round to `digits` decimal places; keeps grid coordinates free of
/// accumulated floating-point noise before they reach the simulation.
pub fn round_to_precision(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

// =============================================================================
// SAMPLES & ROWS
// =============================================================================

/// One point of the search space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

/// One output row: `x, y, [m,] score`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DatasetRow {
    pub x: f64,
    pub y: f64,
    pub mass: Option<f64>,
    pub score: f64,
}

/// Everything that shapes the sample grid and the candidate placed at each sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSpec {
    pub region: SearchRegion,
    pub resolution: Resolution,
    pub masses: Vec<f64>,
    /// Decimal digits kept in sample coordinates
    pub precision: u32,
    pub candidate_speed: f64,
    pub candidate_angle: Option<f64>,
    /// Emit the mass column even when only one mass is tested
    pub record_mass: bool,
}

/// Validated grid with its flat sample list, ordered mass → y → x
#[derive(Debug, Clone)]
pub struct SweepPlan {
    spec: GridSpec,
    xs: Vec<f64>,
    ys: Vec<f64>,
    samples: Arc<[Sample]>,
}

impl SweepPlan {
    pub fn new(spec: GridSpec) -> Result<Self> {
        spec.region.validate()?;

        if spec.masses.is_empty() {
            return Err(SweepError::invalid("mass set is empty"));
        }
        if let Some(bad) = spec.masses.iter().find(|m| !(m.is_finite() && **m > 0.0)) {
            return Err(SweepError::invalid(format!(
                "masses must be positive, got {}",
                bad
            )));
        }
        if !(spec.candidate_speed.is_finite() && spec.candidate_speed >= 0.0) {
            return Err(SweepError::invalid(format!(
                "candidate speed must be non-negative, got {}",
                spec.candidate_speed
            )));
        }
        if matches!(spec.candidate_angle, Some(a) if !a.is_finite()) {
            return Err(SweepError::invalid("candidate angle must be finite"));
        }

        let region = spec.region;
        let round = |v: f64| round_to_precision(v, spec.precision);
        let xs: Vec<f64> = spec
            .resolution
            .axis(region.x_min, region.x_max)?
            .into_iter()
            .map(round)
            .collect();
        let ys: Vec<f64> = spec
            .resolution
            .axis(region.y_min, region.y_max)?
            .into_iter()
            .map(round)
            .collect();

        let mut samples = Vec::with_capacity(spec.masses.len() * ys.len() * xs.len());
        for &mass in &spec.masses {
            for &y in &ys {
                for &x in &xs {
                    samples.push(Sample { x, y, mass });
                }
            }
        }

        Ok(Self {
            spec,
            xs,
            ys,
            samples: samples.into(),
        })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Grid size as (points along x, points along y)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.xs.len(), self.ys.len())
    }

    pub fn records_mass(&self) -> bool {
        self.spec.record_mass || self.spec.masses.len() > 1
    }

    pub fn candidate_for(&self, sample: &Sample) -> Candidate {
        Candidate::new(Vector2::new(sample.x, sample.y), sample.mass)
            .with_speed(self.spec.candidate_speed)
            .with_angle(self.spec.candidate_angle)
    }

    fn row_for(&self, sample: &Sample, score: f64) -> DatasetRow {
        DatasetRow {
            x: sample.x,
            y: sample.y,
            mass: self.records_mass().then_some(sample.mass),
            score,
        }
    }
}

// =============================================================================
// CHUNKING & ESTIMATION
// =============================================================================

/// Split `len` items into at most `workers` contiguous ranges of near-equal size
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let workers = workers.max(1);
    let chunk_size = len.div_ceil(workers);

    (0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect()
}

/// Wall-clock estimate for the operator: per-sample cost × samples ÷ workers,
/// saturating at `Duration::MAX`
pub fn estimate_duration(per_sample: Duration, samples: usize, workers: usize) -> Duration {
    let workers = workers.max(1) as f64;
    let secs = per_sample.as_secs_f64() * samples as f64 / workers;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

// =============================================================================
// SWEEP DRIVER
// =============================================================================

/// Figures reported after a sweep; diagnostics only
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SweepReport {
    pub samples: usize,
    pub workers: usize,
    pub chunks: usize,
    pub chunk_size: usize,
    pub per_sample_estimate_secs: f64,
    pub estimated_secs: f64,
    pub elapsed_secs: f64,
    pub avg_secs_per_sample: f64,
    pub avg_secs_per_sample_per_worker: f64,
    pub collisions: usize,
}

#[derive(Debug, Clone)]
pub struct SweepOutput {
    pub rows: Vec<DatasetRow>,
    pub report: SweepReport,
}

/// Scores one contiguous chunk of the plan; `index` is the chunk's position
type ChunkEvaluator = fn(
    usize,
    Range<usize>,
    &SweepPlan,
    &StabilitySimulation,
    &ReferenceTrajectory,
    &SweepProgress,
) -> Vec<DatasetRow>;

pub struct SweepDriver {
    simulation: StabilitySimulation,
    reference: Arc<ReferenceTrajectory>,
    workers: usize,
    per_sample_cost: Option<Duration>,
}

impl SweepDriver {
    pub fn new(
        simulation: StabilitySimulation,
        reference: ReferenceTrajectory,
        workers: usize,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(SweepError::invalid("worker count must be at least 1"));
        }
        if !simulation.config().check_for_collisions {
            return Err(SweepError::invalid(
                "sweeps score collisions as 0 and require collision checks",
            ));
        }
        simulation.check_reference(&reference)?;

        Ok(Self {
            simulation,
            reference: Arc::new(reference),
            workers,
            per_sample_cost: None,
        })
    }

    /// Use a known per-sample cost instead of timing a calibration run
    pub fn with_sample_cost(mut self, cost: Duration) -> Self {
        self.per_sample_cost = Some(cost);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured cost, or the time one simulation of the plan's first sample takes
    pub fn sample_cost(&self, plan: &SweepPlan) -> Duration {
        if let Some(cost) = self.per_sample_cost {
            return cost;
        }
        match plan.samples().first() {
            Some(sample) => {
                let candidate = plan.candidate_for(sample);
                let start = Instant::now();
                self.simulation
                    .score_unchecked(Some(&candidate), &self.reference);
                start.elapsed()
            }
            None => Duration::ZERO,
        }
    }

    pub fn estimate(&self, plan: &SweepPlan) -> Duration {
        estimate_duration(self.sample_cost(plan), plan.len(), self.workers)
    }

    /// Score every sample of `plan`. Blocks until all chunks finish; any
    /// failed chunk fails the whole sweep and no rows are returned.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(&self, plan: &SweepPlan) -> Result<SweepOutput> {
        self.run_with(plan, evaluate_chunk)
    }

    fn run_with(&self, plan: &SweepPlan, evaluate: ChunkEvaluator) -> Result<SweepOutput> {
        let ranges = partition(plan.len(), self.workers);
        let chunk_size = ranges.first().map(|r| r.len()).unwrap_or(0);
        let per_sample = self.sample_cost(plan);
        let estimated = estimate_duration(per_sample, plan.len(), self.workers);
        let (nx, ny) = plan.dimensions();

        info!(
            samples = plan.len(),
            grid = %format!("{}x{}", nx, ny),
            masses = plan.spec().masses.len(),
            workers = self.workers,
            chunks = ranges.len(),
            chunk_size,
            estimated_secs = estimated.as_secs_f64(),
            "starting sweep"
        );

        let progress = SweepProgress::new(plan.len(), ranges.len());
        let started = Instant::now();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(self.workers)
            .thread_name("sweep-worker")
            .build()
            .map_err(|e| SweepError::Runtime(e.to_string()))?;

        let rows = runtime.block_on(self.dispatch(plan, ranges.clone(), progress.clone(), evaluate))?;

        let elapsed = started.elapsed().as_secs_f64();
        let finished: ProgressSnapshot = progress.snapshot();
        let avg = if plan.is_empty() {
            0.0
        } else {
            elapsed / plan.len() as f64
        };

        let report = SweepReport {
            samples: plan.len(),
            workers: self.workers,
            chunks: ranges.len(),
            chunk_size,
            per_sample_estimate_secs: per_sample.as_secs_f64(),
            estimated_secs: estimated.as_secs_f64(),
            elapsed_secs: elapsed,
            avg_secs_per_sample: avg,
            avg_secs_per_sample_per_worker: avg / self.workers as f64,
            collisions: finished.collisions,
        };

        info!(
            elapsed_secs = report.elapsed_secs,
            avg_secs_per_sample = report.avg_secs_per_sample,
            collisions = report.collisions,
            "sweep finished"
        );

        Ok(SweepOutput { rows, report })
    }

    async fn dispatch(
        &self,
        plan: &SweepPlan,
        ranges: Vec<Range<usize>>,
        progress: SweepProgress,
        evaluate: ChunkEvaluator,
    ) -> Result<Vec<DatasetRow>> {
        let handles: Vec<_> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let plan = plan.clone();
                let simulation = self.simulation.clone();
                let reference = Arc::clone(&self.reference);
                let progress = progress.clone();

                tokio::task::spawn_blocking(move || {
                    evaluate(index, range, &plan, &simulation, &reference, &progress)
                })
            })
            .collect();

        // awaited in chunk order, so rows come back in sample order
        let mut rows = Vec::with_capacity(plan.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let chunk_rows = handle.await.map_err(|e| SweepError::WorkerFailed {
                chunk: index,
                reason: if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                },
            })?;
            rows.extend(chunk_rows);
        }

        Ok(rows)
    }
}

fn evaluate_chunk(
    index: usize,
    range: Range<usize>,
    plan: &SweepPlan,
    simulation: &StabilitySimulation,
    reference: &ReferenceTrajectory,
    progress: &SweepProgress,
) -> Vec<DatasetRow> {
    let samples = &plan.samples()[range];
    let mut rows = Vec::with_capacity(samples.len());

    for sample in samples {
        let candidate = plan.candidate_for(sample);
        let result = simulation.score_unchecked(Some(&candidate), reference);
        progress.record_sample(result.outcome.is_collision());
        rows.push(plan.row_for(sample, result.score));
    }

    progress.record_chunk();
    let snapshot = progress.snapshot();
    debug!(
        chunk = index,
        rows = rows.len(),
        done = %format!("{:.1}%", snapshot.fraction() * 100.0),
        remaining_secs = snapshot.remaining().map(|d| d.as_secs_f64()),
        "chunk finished"
    );

    rows
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
