use crate::configuration::constants::cargo_env::CARGO_PKG_NAME;
use crate::time::timeunit::parse_duration;
use clap::arg_enum;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug, Clone, Copy)]
    pub enum LogLevel {
        Off, Error, Warn, Info, Debug, Trace,
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = CARGO_PKG_NAME)]
pub struct Opt {
    /// Manifest describing suites, tests and hooks. Supported: YAML, JSON, TOML, HJSON
    #[structopt(parse(from_os_str))]
    pub file: PathBuf,

    /// Sets a logging level
    #[structopt(case_insensitive = true, long, short = "L", possible_values = &LogLevel::variants(), env = "LOG_LEVEL")]
    pub logging: Option<LogLevel>,

    /// File to which application will write logs
    #[structopt(long, short = "O", env = "LOG_OUTPUT_FILE")]
    pub log_output_file: Option<PathBuf>,

    /// Write a JSON report of the run into this file
    #[structopt(long, short = "r", parse(from_os_str))]
    pub report: Option<PathBuf>,

    /// Overrides the manifest test timeout, e.g. `500ms`
    #[structopt(long, parse(try_from_str = parse_duration))]
    pub timeout: Option<Duration>,

    /// Overrides the manifest hook timeout
    #[structopt(long, parse(try_from_str = parse_duration))]
    pub hook_timeout: Option<Duration>,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
