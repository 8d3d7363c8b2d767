use clap::Parser;
use lib::{RunLog, RunOptions, RunOutcome, SimpleLogger, run};
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Output PDF report
    #[arg(short, long, default_value = "report.pdf")]
    output: PathBuf,

    /// Directory for charts and sample tables, emptied after the report is written
    #[arg(long, default_value = "./tmp")]
    scratch_dir: PathBuf,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Only print warnings and errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

fn main() -> ExitCode {
    let total_start = Instant::now();
    let args = Args::parse();

    if log::set_logger(&LOGGER).is_ok() {
        if args.debug {
            log::set_max_level(log::LevelFilter::Debug);
        } else {
            log::set_max_level(log::LevelFilter::Info);
        }
    }
    debug!(
        "Config: {} | Output: {} | Scratch: {}",
        args.config.display(),
        args.output.display(),
        args.scratch_dir.display()
    );

    let mut run_log = RunLog::stdout(!args.quiet);
    let options = RunOptions {
        config_path: args.config,
        output: args.output,
        scratch_dir: args.scratch_dir,
    };

    match run(&options, &mut run_log) {
        Ok(RunOutcome::TemplateCreated(path)) => {
            debug!("Template written to {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::ReportWritten(_)) => {
            debug!("Total runtime: {:.2?}", total_start.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            run_log.error(e);
            ExitCode::FAILURE
        }
    }
}
