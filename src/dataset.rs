// Dataset Writer - Persists sweep rows as delimited text plus a JSON manifest
// Column order is x, y, [m,] score; rows are written in sample order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::stability::SimulationConfig;
use crate::sweep::{DatasetRow, GridSpec, SearchRegion, SweepOutput, SweepPlan, SweepReport};

/// Conventional file name: search rectangle (top-left, bottom-right), masses, sample count
pub fn dataset_file_name(region: &SearchRegion, masses: &[f64], samples: usize) -> String {
    let masses = masses
        .iter()
        .map(|m| format!("{:e}", m))
        .collect::<Vec<_>>()
        .join("_");
    format!(
        "{}_{}-{}_{}-M{}-N{}.csv",
        region.x_min, region.y_max, region.x_max, region.y_min, masses, samples
    )
}

pub fn column_names(with_mass: bool) -> Vec<&'static str> {
    if with_mass {
        vec!["x", "y", "m", "score"]
    } else {
        vec!["x", "y", "score"]
    }
}

/// Write rows as comma-separated records; the header row is optional because
/// downstream readers usually name the columns themselves.
pub fn write_rows<W: io::Write>(writer: W, rows: &[DatasetRow], header: bool) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    if header {
        let with_mass = rows.first().map_or(true, |r| r.mass.is_some());
        csv.write_record(column_names(with_mass))?;
    }

    for row in rows {
        let mut record = vec![row.x.to_string(), row.y.to_string()];
        if let Some(mass) = row.mass {
            record.push(format!("{:e}", mass));
        }
        record.push(row.score.to_string());
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct DatasetManifest<'a> {
    pub generated_at: DateTime<Utc>,
    pub file: String,
    pub samples: usize,
    pub columns: Vec<&'static str>,
    pub grid: &'a GridSpec,
    pub simulation: &'a SimulationConfig,
    pub report: &'a SweepReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFiles {
    pub csv: PathBuf,
    pub manifest: PathBuf,
}

/// Write `<name>.csv` and `<name>.json` into `dir`, creating it if needed
pub fn write_dataset(
    dir: &Path,
    plan: &SweepPlan,
    simulation: &SimulationConfig,
    output: &SweepOutput,
    header: bool,
) -> Result<DatasetFiles> {
    fs::create_dir_all(dir)?;

    let spec = plan.spec();
    let file_name = dataset_file_name(&spec.region, &spec.masses, output.rows.len());
    let csv_path = dir.join(&file_name);
    let manifest_path = csv_path.with_extension("json");

    write_rows(fs::File::create(&csv_path)?, &output.rows, header)?;

    let manifest = DatasetManifest {
        generated_at: Utc::now(),
        file: file_name,
        samples: output.rows.len(),
        columns: column_names(plan.records_mass()),
        grid: spec,
        simulation,
        report: &output.report,
    };
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    info!(path = %csv_path.display(), rows = output.rows.len(), "wrote dataset");

    Ok(DatasetFiles {
        csv: csv_path,
        manifest: manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::Resolution;

    fn rows() -> Vec<DatasetRow> {
        vec![
            DatasetRow {
                x: -1.5,
                y: 0.25,
                mass: Some(1e26),
                score: 0.75,
            },
            DatasetRow {
                x: 0.0,
                y: 0.25,
                mass: Some(1e26),
                score: 0.0,
            },
        ]
    }

    #[test]
    fn test_file_name_encodes_region_masses_and_count() {
        let region = SearchRegion::new(-1.5, -1.5, 1.5, 1.5).unwrap();
        assert_eq!(
            dataset_file_name(&region, &[1e26, 1e27], 18),
            "-1.5_1.5-1.5_-1.5-M1e26_1e27-N18.csv"
        );
    }

    #[test]
    fn test_rows_keep_field_order() {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &rows(), false).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "-1.5,0.25,1e26,0.75\n0,0.25,1e26,0\n"
        );
    }

    #[test]
    fn test_header_follows_mass_column() {
        let without_mass: Vec<DatasetRow> = rows()
            .into_iter()
            .map(|r| DatasetRow { mass: None, ..r })
            .collect();

        let mut buffer = Vec::new();
        write_rows(&mut buffer, &without_mass, true).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("x,y,score\n-1.5,0.25,0.75\n"));
    }

    #[test]
    fn test_write_dataset_creates_csv_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let plan = SweepPlan::new(GridSpec {
            region: SearchRegion::new(-1.5, 0.0, 0.0, 0.25).unwrap(),
            resolution: Resolution::Count(2),
            masses: vec![1e26],
            precision: 14,
            candidate_speed: 0.015,
            candidate_angle: None,
            record_mass: true,
        })
        .unwrap();
        let output = SweepOutput {
            rows: rows(),
            report: SweepReport {
                samples: 2,
                workers: 1,
                chunks: 1,
                chunk_size: 2,
                per_sample_estimate_secs: 0.01,
                estimated_secs: 0.02,
                elapsed_secs: 0.02,
                avg_secs_per_sample: 0.01,
                avg_secs_per_sample_per_worker: 0.01,
                collisions: 1,
            },
        };

        let files = write_dataset(
            &dir.path().join("output"),
            &plan,
            &SimulationConfig::default(),
            &output,
            false,
        )
        .unwrap();

        let csv = fs::read_to_string(&files.csv).unwrap();
        assert_eq!(csv.lines().count(), 2);

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files.manifest).unwrap()).unwrap();
        assert_eq!(manifest["samples"], 2);
        assert_eq!(manifest["columns"], serde_json::json!(["x", "y", "m", "score"]));
        assert_eq!(manifest["simulation"]["max_runs"], 1000);
        assert!(manifest["generated_at"].is_string());
    }
}
