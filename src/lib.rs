pub mod chart;
pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod pdf;
pub mod pipeline;
pub mod report;
pub mod structs;
pub mod transform;

// Re-export public API
pub use config::{Config, write_template};
pub use error::{PipelineError, Result};
pub use extract::{read_cemaden, read_inmet};
pub use load::write_json;
pub use pipeline::{RunOptions, RunOutcome, run, run_with_config};
pub use structs::{RunLog, SimpleLogger, TimeWindow};
pub use transform::{filter_window, hourly_precipitation, rain_summary, wind_statistics};
