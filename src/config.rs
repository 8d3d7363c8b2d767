use crate::error::{PipelineError, Result};
use crate::structs::TimeWindow;
use chrono::NaiveDateTime;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const HOUR_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Written when no configuration file exists yet.
pub const DEFAULT_TEMPLATE: &str = r#"# Meteorological report configuration.
# Remove a key under [files] to skip that data source.

[files]
cemaden = "<path_to>/cemaden.csv"
inmet = "<path_to>/inmet.csv"

# Analysis window [start, end), UTC, hour resolution
[time]
start = "YYYY-mm-dd HH"
end = "YYYY-mm-dd HH"

[cemaden]
write_sample = true
write_stats = true
plots = true

[inmet]
write_sample = true
write_stats = true
windrose = true

[report]
# summary = "summary.json"
"#;

/// Run configuration read from the TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: SourceFiles,
    pub time: TimeRange,
    #[serde(default)]
    pub cemaden: CemadenOptions,
    #[serde(default)]
    pub inmet: InmetOptions,
    #[serde(default)]
    pub report: ReportOptions,
}

/// Input file per network; `None` disables the source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFiles {
    pub cemaden: Option<PathBuf>,
    pub inmet: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CemadenOptions {
    #[serde(default = "enabled")]
    pub write_sample: bool,
    #[serde(default = "enabled")]
    pub write_stats: bool,
    #[serde(default = "enabled")]
    pub plots: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InmetOptions {
    #[serde(default = "enabled")]
    pub write_sample: bool,
    #[serde(default = "enabled")]
    pub write_stats: bool,
    #[serde(default = "enabled")]
    pub windrose: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportOptions {
    /// Optional JSON export of the computed aggregates
    pub summary: Option<PathBuf>,
}

fn enabled() -> bool {
    true
}

impl Default for CemadenOptions {
    fn default() -> Self {
        Self {
            write_sample: true,
            write_stats: true,
            plots: true,
        }
    }
}

impl Default for InmetOptions {
    fn default() -> Self {
        Self {
            write_sample: true,
            write_stats: true,
            windrose: true,
        }
    }
}

impl Config {
    /// Reads the configuration file.
    ///
    /// # Errors
    /// Returns `PipelineError::ConfigMissing` when the file does not exist, so the
    /// caller can bootstrap a template, and `PipelineError::Toml` when it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ConfigMissing(path.to_path_buf()));
        }
        debug!("Reading configuration: {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Analysis window from `[time]`.
    pub fn window(&self) -> Result<TimeWindow> {
        let start = parse_hour(&self.time.start)?;
        let end = parse_hour(&self.time.end)?;
        TimeWindow::new(start, end)
    }
}

/// Writes `DEFAULT_TEMPLATE` to `path`, creating parent directories.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_TEMPLATE)?;
    Ok(())
}

/// Parses `YYYY-mm-dd HH`.
pub fn parse_hour(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{}:00", value.trim()), HOUR_FORMAT).map_err(|e| {
        PipelineError::Config(format!(
            "invalid time '{}' (expected YYYY-mm-dd HH): {}",
            value, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [files]
            cemaden = "data/cemaden.csv"

            [time]
            start = "2020-12-04 22"
            end = "2020-12-05 00"

            [cemaden]
            write_sample = false
            plots = false

            [inmet]
            windrose = false
            "#,
        )
        .unwrap();

        assert_eq!(config.files.cemaden, Some(PathBuf::from("data/cemaden.csv")));
        assert!(config.files.inmet.is_none());
        assert!(!config.cemaden.write_sample);
        assert!(config.cemaden.write_stats);
        assert!(!config.cemaden.plots);
        assert!(config.inmet.write_sample);
        assert!(!config.inmet.windrose);
        assert!(config.report.summary.is_none());

        let window = config.window().unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 12, 4).unwrap();
        assert_eq!(window.start(), day.and_hms_opt(22, 0, 0).unwrap());
        assert_eq!(window.hours(), 2);
    }

    #[test]
    fn test_template_parses_but_needs_editing() {
        let config = Config::parse(DEFAULT_TEMPLATE).unwrap();
        assert!(config.files.cemaden.is_some());
        assert!(config.files.inmet.is_some());
        assert!(matches!(config.window(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        let config = Config::parse(
            r#"
            [time]
            start = "2020-12-05 00"
            end = "2020-12-04 22"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.window(),
            Err(PipelineError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_config_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(matches!(
            Config::load(&path),
            Err(PipelineError::ConfigMissing(p)) if p == path
        ));

        write_template(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_TEMPLATE);
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_parse_hour_rejects_minutes() {
        assert!(parse_hour("2020-12-04 22").is_ok());
        assert!(parse_hour("2020-12-04 22:15").is_err());
        assert!(parse_hour("04/12/2020 22").is_err());
    }
}
