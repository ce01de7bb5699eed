// Orbital Sweep CLI - Reference runs, single-candidate scoring and full sweeps

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orbital_sweep::dataset::write_dataset;
use orbital_sweep::ephemeris::{load_roster, save_roster};
use orbital_sweep::stability::baseline_roster;
use orbital_sweep::sweep::partition;
use orbital_sweep::{
    Candidate, ReferenceTrajectory, StabilitySimulation, SweepDriver, SweepPlan, SweepSettings,
    Vector2,
};

#[derive(Parser)]
#[command(name = "orbital-sweep")]
#[command(about = "Planet stability dataset generator")]
struct Cli {
    /// JSON settings file; unset fields keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON roster replacing the built-in inner solar system
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    /// Simulation steps per run
    #[arg(long, global = true)]
    max_runs: Option<usize>,

    #[arg(long, global = true)]
    stability_cutoff: Option<f64>,

    #[arg(long, global = true)]
    collision_dist: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the unperturbed reference trajectory as JSON
    Reference {
        #[arg(short, long, default_value = "reference.json")]
        output: PathBuf,
    },

    /// Write the active roster in polar form as JSON
    Roster {
        #[arg(short, long, default_value = "roster.json")]
        output: PathBuf,
    },

    /// Score a single candidate planet
    Simulate {
        #[arg(short)]
        x: f64,
        #[arg(short)]
        y: f64,
        #[arg(short, long)]
        mass: f64,
        /// AU/day
        #[arg(long, default_value_t = 0.015)]
        speed: f64,
        /// Radians; perpendicular to the origin when omitted
        #[arg(long)]
        angle: Option<f64>,
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Print the sweep size and time estimate without running it
    Estimate {
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run the full parameter sweep and write the dataset
    Sweep {
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Precomputed reference trajectory
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Write a header row
        #[arg(long)]
        header: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings =
        SweepSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(max_runs) = cli.max_runs {
        settings.max_runs = max_runs;
    }
    if let Some(cutoff) = cli.stability_cutoff {
        settings.stability_cutoff = cutoff;
    }
    if let Some(dist) = cli.collision_dist {
        settings.collision_dist = dist;
    }
    if cli.roster.is_some() {
        settings.roster_file = cli.roster.clone();
    }

    match cli.command {
        Commands::Reference { output } => {
            let simulation = build_simulation(&settings)?;
            let reference = simulation.reference_trajectory()?;
            std::fs::write(&output, serde_json::to_string_pretty(&reference)?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Wrote {} snapshots of {} bodies -> {}",
                reference.len(),
                reference.bodies.len(),
                output.display()
            );
        }

        Commands::Roster { output } => {
            let simulation = build_simulation(&settings)?;
            save_roster(&output, simulation.roster())
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Wrote {} bodies -> {}",
                simulation.roster().len(),
                output.display()
            );
        }

        Commands::Simulate {
            x,
            y,
            mass,
            speed,
            angle,
            reference,
        } => {
            let start = Instant::now();
            let simulation = build_simulation(&settings)?;
            let reference = resolve_reference(&simulation, reference.as_deref())?;

            let candidate = Candidate::new(Vector2::new(x, y), mass)
                .with_speed(speed)
                .with_angle(angle);
            let result = simulation.score(Some(&candidate), &reference)?;

            println!("Outcome:      {:?}", result.outcome);
            println!("Raw score:    {:.10}", result.raw);
            println!("Score:        {:.10}", result.score);
            println!("Time Elapsed: {:.3}s", start.elapsed().as_secs_f64());
        }

        Commands::Estimate { workers } => {
            if workers.is_some() {
                settings.workers = workers;
            }
            settings.validate()?;

            let simulation = build_simulation(&settings)?;
            let reference = simulation.reference_trajectory()?;
            let plan = SweepPlan::new(settings.grid()?)?;
            let driver = build_driver(&settings, simulation, reference)?;
            print_plan(&settings, &plan, driver.workers());
            println!(
                "Estimated total time: {:.3}s",
                driver.estimate(&plan).as_secs_f64()
            );
        }

        Commands::Sweep {
            workers,
            output,
            reference,
            header,
        } => {
            if workers.is_some() {
                settings.workers = workers;
            }
            if let Some(output) = output {
                settings.output_dir = output;
            }
            settings.write_header |= header;
            settings.validate()?;

            let simulation = build_simulation(&settings)?;
            let reference = resolve_reference(&simulation, reference.as_deref())?;
            let plan = SweepPlan::new(settings.grid()?)?;
            let driver = build_driver(&settings, simulation.clone(), reference)?;
            print_plan(&settings, &plan, driver.workers());

            let result = driver.run(&plan)?;
            let files = write_dataset(
                &settings.output_dir,
                &plan,
                simulation.config(),
                &result,
                settings.write_header,
            )?;

            println!("Avg. time per sim: {:.6}s", result.report.avg_secs_per_sample);
            println!(
                "Avg. time per sim per worker: {:.6}s",
                result.report.avg_secs_per_sample_per_worker
            );
            println!("Finished in {:.3}s", result.report.elapsed_secs);
            println!("Wrote results to {}", files.csv.display());
        }
    }

    Ok(())
}

fn build_simulation(settings: &SweepSettings) -> Result<StabilitySimulation> {
    let roster = match &settings.roster_file {
        Some(path) => load_roster(path)
            .with_context(|| format!("failed to load roster {}", path.display()))?,
        None => baseline_roster(),
    };
    Ok(StabilitySimulation::new(settings.simulation(), roster)?)
}

fn build_driver(
    settings: &SweepSettings,
    simulation: StabilitySimulation,
    reference: ReferenceTrajectory,
) -> Result<SweepDriver> {
    let mut driver = SweepDriver::new(simulation, reference, settings.worker_count())?;
    if let Some(cost) = settings.sample_cost() {
        driver = driver.with_sample_cost(cost);
    }
    Ok(driver)
}

fn resolve_reference(
    simulation: &StabilitySimulation,
    path: Option<&Path>,
) -> Result<ReferenceTrajectory> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let reference: ReferenceTrajectory = serde_json::from_str(&json)?;
            simulation.check_reference(&reference)?;
            Ok(reference)
        }
        None => Ok(simulation.reference_trajectory()?),
    }
}

fn print_plan(settings: &SweepSettings, plan: &SweepPlan, workers: usize) {
    let spec = plan.spec();
    let (nx, ny) = plan.dimensions();
    let chunk_size = partition(plan.len(), workers)
        .first()
        .map(|r| r.len())
        .unwrap_or(0);

    println!(
        "Search space: ({}, {}) ({}, {})",
        spec.region.x_min, spec.region.y_max, spec.region.x_max, spec.region.y_min
    );
    println!("Search space size: {} x {}", nx, ny);
    println!("Search space resolution: {:?}", spec.resolution);
    println!("Testing masses: {:?}", spec.masses);
    println!("Total number of samples: {}", plan.len());
    println!(
        "Simulation: {} runs, cutoff {}, collision distance {}",
        settings.max_runs, settings.stability_cutoff, settings.collision_dist
    );
    println!("Using up to {} workers, chunk size {}", workers, chunk_size);
}
