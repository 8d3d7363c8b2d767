use crate::error::{PipelineError, Result};
use chrono::{NaiveDateTime, TimeDelta};
use log::{Log, Metadata, Record as LogRecord};
use serde::Serialize;
use std::fmt::Display;
use std::io::{self, Stdout, Write};

/// Simple logger implementation
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        println!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Severity of an operator-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

impl Severity {
    fn header(self) -> &'static str {
        match self {
            Severity::Message => "Message:",
            Severity::Warning => "Warning:",
            Severity::Error => "Error:",
        }
    }
}

/// Operator-facing run log.
///
/// Messages are grouped under a severity header, which is only printed again
/// when the severity changes. The log is passed explicitly to every stage of
/// the run.
pub struct RunLog<W: Write = Stdout> {
    out: W,
    verbose: bool,
    last_level: Option<Severity>,
}

impl RunLog<Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write> RunLog<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            last_level: None,
        }
    }

    pub fn message(&mut self, message: impl Display) {
        if self.verbose {
            self.emit(Severity::Message, message);
        }
    }

    pub fn warning(&mut self, message: impl Display) {
        self.emit(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Display) {
        self.emit(Severity::Error, message);
    }

    pub fn last_level(&self) -> Option<Severity> {
        self.last_level
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, level: Severity, message: impl Display) {
        // Losing a console line is not worth failing the run over.
        if self.last_level != Some(level) {
            let _ = writeln!(self.out);
            let _ = writeln!(self.out, "{}", level.header());
            self.last_level = Some(level);
        }
        let _ = writeln!(self.out, "  {}", message);
    }
}

/// Anything carrying an observation timestamp
pub trait Timestamped {
    fn timestamp(&self) -> NaiveDateTime;
}

/// Precipitation reading from a CEMADEN rain gauge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainObservation {
    /// Timestamp exactly as written in the source file
    pub raw_timestamp: String,
    pub timestamp: NaiveDateTime,
    /// Measured precipitation (mm)
    pub value: f64,
}

impl Timestamped for RainObservation {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Wind reading from an INMET weather station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindObservation {
    pub raw_date: String,
    pub raw_time: String,
    pub timestamp: NaiveDateTime,
    /// Direction the wind blows from (degrees)
    pub direction: f64,
    /// Max gust (m/s)
    pub gust: f64,
    /// Mean speed (m/s)
    pub speed: f64,
}

impl Timestamped for WindObservation {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// CEMADEN rain-gauge station with its readings in file order
#[derive(Debug, Clone, PartialEq)]
pub struct RainStation {
    pub name: String,
    pub code: String,
    pub municipality: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observations: Vec<RainObservation>,
}

/// INMET weather station metadata and readings
#[derive(Debug, Clone, PartialEq)]
pub struct WindStation {
    pub region: String,
    pub state: String,
    pub name: String,
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Latitude, longitude and altitude exactly as written in the header
    pub raw_latitude: String,
    pub raw_longitude: String,
    pub raw_altitude: String,
    pub founded: String,
    pub observations: Vec<WindObservation>,
}

/// Half-open `[start, end)` analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(PipelineError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Number of whole one-hour buckets. A trailing partial hour is dropped.
    pub fn hours(&self) -> usize {
        ((self.end - self.start).num_seconds() / 3600) as usize
    }

    pub fn has_partial_hour(&self) -> bool {
        (self.end - self.start).num_seconds() % 3600 != 0
    }

    /// Bucket holding `t`, if `t` falls inside one of the whole hours.
    pub fn bucket_index(&self, t: NaiveDateTime) -> Option<usize> {
        if !self.contains(t) {
            return None;
        }
        let index = ((t - self.start).num_seconds() / 3600) as usize;
        (index < self.hours()).then_some(index)
    }

    /// Label of bucket `index`: the middle of its hour.
    pub fn bucket_midpoint(&self, index: usize) -> NaiveDateTime {
        self.start + TimeDelta::hours(index as i64) + TimeDelta::minutes(30)
    }
}

/// Hourly accumulated precipitation for one station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySeries {
    pub buckets: Vec<(NaiveDateTime, f64)>,
}

impl HourlySeries {
    pub fn total(&self) -> f64 {
        self.buckets.iter().map(|(_, amount)| amount).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Accumulated rain of every station plus the mean across stations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainSummary {
    pub totals: Vec<(String, f64)>,
    pub mean: f64,
}

/// Wind statistics over the analysis window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindStats {
    pub max_gust: f64,
    pub mean_speed: f64,
}

/// Small raw-data table read back from a sample side file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Aggregates of one run, exported as JSON on request
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub window: TimeWindow,
    pub cemaden: Option<CemadenSummary>,
    pub inmet: Option<InmetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CemadenSummary {
    pub stations: Vec<StationSeries>,
    pub mean_total: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationSeries {
    pub name: String,
    pub code: String,
    pub total: f64,
    pub series: HourlySeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct InmetSummary {
    pub name: String,
    pub code: String,
    pub observations: usize,
    pub stats: Option<WindStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 12, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_window_rejects_empty_and_reversed() {
        assert!(matches!(
            TimeWindow::new(at(4, 22, 0), at(4, 22, 0)),
            Err(PipelineError::InvalidWindow { .. })
        ));
        assert!(TimeWindow::new(at(5, 0, 0), at(4, 22, 0)).is_err());
    }

    #[test]
    fn test_window_is_half_open() {
        let window = TimeWindow::new(at(4, 22, 0), at(5, 0, 0)).unwrap();
        assert!(window.contains(at(4, 22, 0)));
        assert!(window.contains(at(4, 23, 59)));
        assert!(!window.contains(at(5, 0, 0)));
        assert!(!window.contains(at(4, 21, 59)));
    }

    #[test]
    fn test_partial_hour_is_truncated() {
        let window = TimeWindow::new(at(4, 22, 0), at(5, 0, 30)).unwrap();
        assert_eq!(window.hours(), 2);
        assert!(window.has_partial_hour());
        assert_eq!(window.bucket_index(at(4, 23, 10)), Some(1));
        assert_eq!(window.bucket_index(at(5, 0, 10)), None);
    }

    #[test]
    fn test_bucket_midpoints() {
        let window = TimeWindow::new(at(4, 22, 0), at(5, 0, 0)).unwrap();
        assert_eq!(window.bucket_midpoint(0), at(4, 22, 30));
        assert_eq!(window.bucket_midpoint(1), at(4, 23, 30));
    }

    #[test]
    fn test_run_log_groups_by_severity() {
        let mut run_log = RunLog::new(Vec::new(), true);
        run_log.message("Cemaden...");
        run_log.message("Inmet...");
        run_log.warning("partial hour");
        run_log.message("done");
        assert_eq!(run_log.last_level(), Some(Severity::Message));

        let text = String::from_utf8(run_log.into_inner()).unwrap();
        assert_eq!(
            text,
            "\nMessage:\n  Cemaden...\n  Inmet...\n\nWarning:\n  partial hour\n\nMessage:\n  done\n"
        );
    }

    #[test]
    fn test_quiet_run_log_keeps_warnings() {
        let mut run_log = RunLog::new(Vec::new(), false);
        run_log.message("hidden");
        run_log.warning("shown");
        let text = String::from_utf8(run_log.into_inner()).unwrap();
        assert_eq!(text, "\nWarning:\n  shown\n");
    }
}
