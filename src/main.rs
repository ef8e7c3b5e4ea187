// #![forbid(unsafe_code)]
// #![deny(unused_imports)]
//#![deny(missing_docs)]

#[macro_use]
extern crate log;

use kurtex::app::error::Error;
use kurtex::app::executor::RunnerOptions;
use kurtex::app::App;
use kurtex::configuration::command_line::{LogLevel, Opt};
use kurtex::configuration::manifest::Manifest;
use log::LevelFilter;
use signal_hook::{iterator::Signals, SIGINT};
use std::{path::PathBuf, process::exit, thread};
use structopt::StructOpt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Opt::from_args();
    let level = options.logging.unwrap_or(LogLevel::Info);

    if let Err(e) = init_logging(level.into(), &options.log_output_file) {
        eprintln!("Failed to initialize logging: {}", e);
        exit(2);
    }

    match Signals::new(&[SIGINT]) {
        Ok(signals) => {
            thread::spawn(move || {
                for sig in signals.forever() {
                    info!("Received signal {:?}, stopping", sig);
                    exit(130);
                }
            });
        }
        Err(e) => warn!("Cannot listen for signals: {}", e),
    }

    match run(options).await {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(e) => {
            error!("{}", e);
            exit(2);
        }
    }
}

async fn run(options: Opt) -> Result<bool, Error> {
    let manifest = Manifest::from(options.file)?;
    debug!("Initiated configuration {:#?}", manifest);

    let runner_options = RunnerOptions {
        test_timeout: Some(options.timeout.unwrap_or(manifest.timeout)),
        hook_timeout: Some(options.hook_timeout.unwrap_or(manifest.hook_timeout)),
    };
    let app = App::new(manifest)
        .with_options(runner_options)
        .with_report(options.report);
    let summary = app.run().await?;
    Ok(summary.is_success())
}

fn init_logging(level: LevelFilter, output: &Option<PathBuf>) -> Result<(), fern::InitError> {
    let mut dispatcher = fern::Dispatch::new()
        // Perform allocation-free log formatting
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "".to_owned()),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(log_file) = output {
        dispatcher = dispatcher.chain(fern::log_file(log_file)?)
    }
    dispatcher.apply()?;
    info!("Logging level {} enabled", level);
    Ok(())
}
