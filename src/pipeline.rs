use crate::chart::{plot_precipitation, plot_windrose};
use crate::config::{CemadenOptions, Config, InmetOptions, write_template};
use crate::error::{PipelineError, Result};
use crate::extract::{read_cemaden, read_inmet};
use crate::load::{
    CEMADEN_SAMPLE_FILE, INMET_SAMPLE_FILE, clean_scratch, write_cemaden_sample,
    write_inmet_sample, write_json,
};
use crate::pdf::write_pdf;
use crate::report::{CemadenSection, InmetSection, compose};
use crate::structs::{
    CemadenSummary, HourlySeries, InmetSummary, RainStation, RainSummary, RunLog, RunSummary,
    StationSeries, TimeWindow, WindObservation, WindStation, WindStats,
};
use crate::transform::{filter_window, hourly_precipitation, rain_summary, wind_statistics};
use log::debug;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const REPORT_TITLE: &str = "Relatório meteorológico";

/// Paths of one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub output: PathBuf,
    pub scratch_dir: PathBuf,
}

/// Stages of a run, in order. Source stages are skipped when disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ReadRainSource,
    ReadWindSource,
    Compose,
    Cleanup,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::ReadRainSource => write!(f, "cemaden"),
            Stage::ReadWindSource => write!(f, "inmet"),
            Stage::Compose => write!(f, "compose"),
            Stage::Cleanup => write!(f, "cleanup"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No configuration existed; a template was written for the operator.
    TemplateCreated(PathBuf),
    ReportWritten(PathBuf),
}

/// Results of the CEMADEN stage
pub struct CemadenRun {
    pub stations: Vec<RainStation>,
    pub series: Vec<HourlySeries>,
    pub summary: Option<RainSummary>,
    pub sample: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
}

/// Results of the INMET stage
pub struct InmetRun {
    pub station: WindStation,
    pub filtered: Vec<WindObservation>,
    pub stats: Option<WindStats>,
    pub sample: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
}

/// Runs the whole report from the configuration file.
///
/// A missing configuration file is not an error: the default template is
/// written in its place and `RunOutcome::TemplateCreated` is returned.
///
/// # Errors
/// Returns the first failure of any stage; nothing is written to
/// `options.output` when reading a source fails.
pub fn run<W: Write>(options: &RunOptions, log: &mut RunLog<W>) -> Result<RunOutcome> {
    let config = match Config::load(&options.config_path) {
        Ok(config) => config,
        Err(PipelineError::ConfigMissing(path)) => {
            log.warning(format!("No such file or directory: {}", path.display()));
            write_template(&path)?;
            log.warning("Default configuration file created. Check values to proceed");
            return Ok(RunOutcome::TemplateCreated(path));
        }
        Err(e) => return Err(e),
    };
    run_with_config(&config, options, log)
}

/// Runs every stage with an already loaded configuration.
pub fn run_with_config<W: Write>(
    config: &Config,
    options: &RunOptions,
    log: &mut RunLog<W>,
) -> Result<RunOutcome> {
    enter(Stage::Init);
    let window = config.window()?;
    if window.has_partial_hour() {
        log.warning(format!(
            "Window is not a whole number of hours; only the first {} hours are summed",
            window.hours()
        ));
    }
    if config.files.cemaden.is_none() && config.files.inmet.is_none() {
        return Err(PipelineError::NothingToReport);
    }
    let scratch = options.scratch_dir.as_path();
    fs::create_dir_all(scratch)?;

    let cemaden = match &config.files.cemaden {
        Some(path) => {
            enter(Stage::ReadRainSource);
            log.message("Cemaden...");
            Some(run_cemaden(path, &config.cemaden, &window, scratch)?)
        }
        None => None,
    };

    let inmet = match &config.files.inmet {
        Some(path) => {
            enter(Stage::ReadWindSource);
            log.message("Inmet...");
            Some(run_inmet(path, &config.inmet, &window, scratch)?)
        }
        None => None,
    };

    enter(Stage::Compose);
    log.message("Writing PDF...");
    let cemaden_section = cemaden.as_ref().map(|run| CemadenSection {
        stations: &run.stations,
        summary: run.summary.as_ref(),
        sample: run.sample.clone(),
        charts: &run.charts,
    });
    let inmet_section = inmet.as_ref().map(|run| InmetSection {
        station: &run.station,
        stats: run.stats,
        sample: run.sample.clone(),
        charts: &run.charts,
    });
    let document = compose(&window, cemaden_section.as_ref(), inmet_section.as_ref())?;
    write_pdf(&document, REPORT_TITLE, &options.output)?;

    let exported = match &config.report.summary {
        Some(path) => {
            let written = write_json(&summarize(&window, cemaden.as_ref(), inmet.as_ref()), path);
            if written.is_ok() {
                log.message(format!("Summary written to {}", path.display()));
            }
            written
        }
        None => Ok(()),
    };

    // Scratch files are removed once the report exists, even if the summary failed.
    enter(Stage::Cleanup);
    log.message("Cleaning tmp...");
    for problem in clean_scratch(scratch) {
        log.warning(problem);
    }
    exported?;

    enter(Stage::Done);
    log.message(format!("Report written to {}", options.output.display()));
    Ok(RunOutcome::ReportWritten(options.output.clone()))
}

/// Hourly rain per station, plus the optional sample, totals and charts.
pub fn run_cemaden(
    path: &Path,
    options: &CemadenOptions,
    window: &TimeWindow,
    scratch: &Path,
) -> Result<CemadenRun> {
    let stations = read_cemaden(path)?;

    let mut series = Vec::with_capacity(stations.len());
    let mut charts = Vec::new();
    let mut sample = None;
    for (i, station) in stations.iter().enumerate() {
        let filtered = filter_window(&station.observations, window);
        debug!(
            "{}: {} of {} readings in window",
            station.name,
            filtered.len(),
            station.observations.len()
        );

        if i == 0 && options.write_sample {
            let sample_path = scratch.join(CEMADEN_SAMPLE_FILE);
            write_cemaden_sample(station, &filtered, &sample_path)?;
            sample = Some(sample_path);
        }

        let hourly = hourly_precipitation(&filtered, window);
        if options.plots {
            charts.push(plot_precipitation(&hourly, station, scratch)?);
        }
        series.push(hourly);
    }

    let summary = if options.write_stats {
        Some(rain_summary(
            stations.iter().map(|s| s.name.as_str()).zip(series.iter()),
        )?)
    } else {
        None
    };

    Ok(CemadenRun {
        stations,
        series,
        summary,
        sample,
        charts,
    })
}

/// Wind of the INMET station: optional wind rose, sample and statistics.
pub fn run_inmet(
    path: &Path,
    options: &InmetOptions,
    window: &TimeWindow,
    scratch: &Path,
) -> Result<InmetRun> {
    let station = read_inmet(path)?;
    let filtered = filter_window(&station.observations, window);
    debug!(
        "{}: {} of {} readings in window",
        station.name,
        filtered.len(),
        station.observations.len()
    );

    let mut charts = Vec::new();
    if options.windrose {
        charts.push(plot_windrose(&filtered, scratch)?);
    }

    let sample = if options.write_sample {
        let sample_path = scratch.join(INMET_SAMPLE_FILE);
        write_inmet_sample(&filtered, &sample_path)?;
        Some(sample_path)
    } else {
        None
    };

    let stats = if options.write_stats {
        Some(wind_statistics(&filtered)?)
    } else {
        None
    };

    Ok(InmetRun {
        station,
        filtered,
        stats,
        sample,
        charts,
    })
}

/// Aggregates of the run in export form.
pub fn summarize(
    window: &TimeWindow,
    cemaden: Option<&CemadenRun>,
    inmet: Option<&InmetRun>,
) -> RunSummary {
    RunSummary {
        window: *window,
        cemaden: cemaden.map(|run| CemadenSummary {
            stations: run
                .stations
                .iter()
                .zip(&run.series)
                .map(|(station, series)| StationSeries {
                    name: station.name.clone(),
                    code: station.code.clone(),
                    total: series.total(),
                    series: series.clone(),
                })
                .collect(),
            mean_total: run.summary.as_ref().map(|s| s.mean),
        }),
        inmet: inmet.map(|run| InmetSummary {
            name: run.station.name.clone(),
            code: run.station.code.clone(),
            observations: run.filtered.len(),
            stats: run.stats,
        }),
    }
}

fn enter(stage: Stage) {
    debug!("Stage: {}", stage);
}
