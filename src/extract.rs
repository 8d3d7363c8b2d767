use crate::error::{PipelineError, Result};
use crate::structs::{RainObservation, RainStation, WindObservation, WindStation};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

/// CEMADEN column layout:
/// municipio,codEstacao,uf,nomeEstacao,latitude,longitude,datahora,valorMedida
pub const CEMADEN_COLUMNS: [&str; 8] = [
    "municipio",
    "codEstacao",
    "uf",
    "nomeEstacao",
    "latitude",
    "longitude",
    "datahora",
    "valorMedida",
];

/// Number of `key,value` lines heading an INMET file
pub const INMET_METADATA_LINES: usize = 8;

const CEMADEN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const INMET_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Reads a CEMADEN rain-gauge export and groups the readings by station name.
///
/// Stations are returned in order of first appearance; each station keeps its
/// readings in file order and takes its metadata from its first row.
///
/// # Errors
/// Returns `PipelineError::SourceFileNotFound` if `path` does not exist and
/// `PipelineError::MalformedRecord` for a short row, a bad timestamp or a bad value.
pub fn read_cemaden(path: &Path) -> Result<Vec<RainStation>> {
    debug!("Reading CEMADEN file: {}", path.display());
    let file = open_source(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut stations: Vec<RainStation> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let line = record_line(&record);
        if record.len() < CEMADEN_COLUMNS.len() {
            return Err(PipelineError::malformed(
                path,
                line,
                format!(
                    "expected {} columns, found {}",
                    CEMADEN_COLUMNS.len(),
                    record.len()
                ),
            ));
        }

        let raw_timestamp = record[6].trim().to_string();
        let timestamp = parse_cemaden_timestamp(&raw_timestamp).ok_or_else(|| {
            PipelineError::malformed(path, line, format!("invalid datahora '{}'", raw_timestamp))
        })?;
        let value = parse_number(&record[7])
            .ok_or_else(|| PipelineError::malformed(path, line, "invalid valorMedida"))?;

        let name = record[3].trim();
        let slot = match by_name.get(name) {
            Some(&slot) => slot,
            None => {
                let latitude = parse_number(&record[4])
                    .ok_or_else(|| PipelineError::malformed(path, line, "invalid latitude"))?;
                let longitude = parse_number(&record[5])
                    .ok_or_else(|| PipelineError::malformed(path, line, "invalid longitude"))?;
                stations.push(RainStation {
                    name: name.to_string(),
                    code: record[1].trim().to_string(),
                    municipality: record[0].trim().to_string(),
                    state: record[2].trim().to_string(),
                    latitude,
                    longitude,
                    observations: Vec::new(),
                });
                by_name.insert(name.to_string(), stations.len() - 1);
                stations.len() - 1
            }
        };

        stations[slot].observations.push(RainObservation {
            raw_timestamp,
            timestamp,
            value,
        });
    }

    debug!(
        "Read {} CEMADEN stations from {}",
        stations.len(),
        path.display()
    );
    Ok(stations)
}

/// Reads an INMET station export: the metadata header followed by hourly rows.
///
/// Only date, time of day and the three wind columns (the last three of the
/// table) are kept. Rows missing any of them are dropped.
///
/// # Errors
/// Returns `PipelineError::SourceFileNotFound` if `path` does not exist and
/// `PipelineError::MalformedRecord` for a bad metadata line, timestamp or number.
pub fn read_inmet(path: &Path) -> Result<WindStation> {
    debug!("Reading INMET file: {}", path.display());
    let bytes = fs::read(path).map_err(|e| source_error(path, e))?;
    let text = decode_text(bytes);

    let mut parts = text.splitn(INMET_METADATA_LINES + 1, '\n');
    let mut metadata = Vec::with_capacity(INMET_METADATA_LINES);
    for line_no in 1..=INMET_METADATA_LINES {
        let line = parts.next().unwrap_or_default();
        let value = line
            .trim()
            .split(',')
            .nth(1)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                PipelineError::malformed(path, line_no as u64, "expected a 'key,value' metadata line")
            })?;
        metadata.push(value.to_string());
    }
    let body = parts.next().unwrap_or_default();

    let coordinate = |index: usize, what: &str| {
        parse_number(&metadata[index]).ok_or_else(|| {
            PipelineError::malformed(path, index as u64 + 1, format!("invalid {}", what))
        })
    };
    let latitude = coordinate(4, "latitude")?;
    let longitude = coordinate(5, "longitude")?;
    let altitude = coordinate(6, "altitude")?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let header_line = INMET_METADATA_LINES as u64 + 1;
    let headers = reader.headers()?.clone();
    let width = table_width(&headers);
    if width < 5 {
        return Err(PipelineError::malformed(
            path,
            header_line,
            format!("expected at least 5 columns, found {}", width),
        ));
    }
    let columns = [0, 1, width - 3, width - 2, width - 1];

    let mut observations = Vec::new();
    let mut dropped = 0usize;
    for result in reader.records() {
        let record = result?;
        let line = record_line(&record) + INMET_METADATA_LINES as u64;
        let fields = columns.map(|i| record.get(i).map(str::trim).unwrap_or_default());
        if fields.iter().any(|f| f.is_empty()) {
            dropped += 1;
            continue;
        }
        let [date, time, direction, gust, speed] = fields;

        let timestamp = parse_inmet_timestamp(date, time).ok_or_else(|| {
            PipelineError::malformed(path, line, format!("invalid date/time '{} {}'", date, time))
        })?;
        let number = |value: &str, what: &str| {
            parse_number(value)
                .ok_or_else(|| PipelineError::malformed(path, line, format!("invalid {}", what)))
        };

        observations.push(WindObservation {
            raw_date: date.to_string(),
            raw_time: time.to_string(),
            timestamp,
            direction: number(direction, "wind direction")?,
            gust: number(gust, "max gust")?,
            speed: number(speed, "wind speed")?,
        });
    }

    debug!(
        "Read {} INMET rows from {} ({} incomplete rows dropped)",
        observations.len(),
        path.display(),
        dropped
    );

    let [region, state, name, code, raw_latitude, raw_longitude, raw_altitude, founded]: [String; INMET_METADATA_LINES] = metadata
        .try_into()
        .map_err(|_| PipelineError::malformed(path, 1, "incomplete metadata header"))?;
    Ok(WindStation {
        region,
        state,
        name,
        code,
        latitude,
        longitude,
        altitude,
        raw_latitude,
        raw_longitude,
        raw_altitude,
        founded,
        observations,
    })
}

/// Parses `2020-12-04 22:20:00.0`, ignoring the sub-second fragment.
pub fn parse_cemaden_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let whole_seconds = raw.trim().split('.').next()?;
    NaiveDateTime::parse_from_str(whole_seconds, CEMADEN_TIMESTAMP_FORMAT).ok()
}

/// Joins an INMET date (`2020/12/04`) and time of day (`2200`, `2200 UTC`).
pub fn parse_inmet_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let digits: Vec<u32> = time
        .chars()
        .filter_map(|c| c.to_digit(10))
        .take(4)
        .collect();
    if digits.len() != 4 {
        return None;
    }
    let hour = digits[0] * 10 + digits[1];
    let minute = digits[2] * 10 + digits[3];

    let date = INMET_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date.trim(), format).ok())?;
    date.and_hms_opt(hour, minute, 0)
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    value
        .parse::<f64>()
        .or_else(|_| value.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|v| v.is_finite())
}

/// Columns of the table, not counting the empty one a trailing delimiter leaves.
fn table_width(headers: &StringRecord) -> usize {
    let mut width = headers.len();
    while width > 0 && headers[width - 1].trim().is_empty() {
        width -= 1;
    }
    width
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| source_error(path, e))
}

fn source_error(path: &Path, error: std::io::Error) -> PipelineError {
    if error.kind() == ErrorKind::NotFound {
        PipelineError::SourceFileNotFound(path.to_path_buf())
    } else {
        PipelineError::Io(error)
    }
}

/// INMET exports are ISO-8859-15; anything that is not UTF-8 is read as Latin-1.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}
