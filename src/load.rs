use crate::error::{PipelineError, Result};
use crate::extract::CEMADEN_COLUMNS;
use crate::structs::{RainObservation, RainStation, RunSummary, SampleTable, WindObservation};
use csv::{ReaderBuilder, Writer};
use log::debug;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

/// Rows kept in a raw-data sample
pub const SAMPLE_ROWS: usize = 10;

pub const CEMADEN_SAMPLE_FILE: &str = "sample_cemaden.csv";
pub const INMET_SAMPLE_FILE: &str = "sample_inmet.csv";

pub const INMET_SAMPLE_COLUMNS: [&str; 5] =
    ["data", "hora", "vento_dir", "vento_rajmax", "vento_vel"];

/// Writes the first filtered CEMADEN rows of a station in the source column layout.
///
/// # Arguments
/// * `station` - Station the readings belong to
/// * `observations` - Filtered readings; only the first `SAMPLE_ROWS` are written
/// * `output_path` - Path where the CSV file will be created
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_cemaden_sample(
    station: &RainStation,
    observations: &[RainObservation],
    output_path: &Path,
) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(CEMADEN_COLUMNS)?;
    for observation in observations.iter().take(SAMPLE_ROWS) {
        writer.write_record(&[
            station.municipality.clone(),
            station.code.clone(),
            station.state.clone(),
            station.name.clone(),
            round(station.latitude, 6).to_string(),
            round(station.longitude, 6).to_string(),
            observation.raw_timestamp.clone(),
            observation.value.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the first filtered INMET rows, wind columns only.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_inmet_sample(observations: &[WindObservation], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(INMET_SAMPLE_COLUMNS)?;
    for observation in observations.iter().take(SAMPLE_ROWS) {
        writer.write_record(&[
            observation.raw_date.clone(),
            observation.raw_time.clone(),
            observation.direction.to_string(),
            observation.gust.to_string(),
            observation.speed.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Rounds to `decimals` places for display.
pub(crate) fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Reads a sample side file back for the report.
///
/// # Errors
/// Returns `PipelineError::SourceFileNotFound` if the sample was never written.
pub fn read_sample(path: &Path) -> Result<SampleTable> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::SourceFileNotFound(path.to_path_buf()),
        _ => PipelineError::Io(e),
    })?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(SampleTable { headers, rows })
}

/// Writes the run aggregates to a pretty-formatted JSON file.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

/// Removes every file in the scratch directory.
///
/// Best effort: files that vanished meanwhile are ignored, and other failures
/// are returned as messages instead of aborting.
pub fn clean_scratch(scratch: &Path) -> Vec<String> {
    let entries = match fs::read_dir(scratch) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => return vec![format!("cannot list {}: {}", scratch.display(), e)],
    };

    let mut problems = Vec::new();
    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => problems.push(format!("cannot remove {}: {}", path.display(), e)),
        }
    }
    debug!("Removed {} scratch files from {}", removed, scratch.display());
    problems
}
