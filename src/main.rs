use std::{
    env,
    io::{self, BufReader},
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::{Itertools, chain};
use log::info;

use downlink::{
    config::Config, core::cancel::CancelToken, health::probe::ProcfsProbe, pipeline::Pipeline,
    sink::ConsoleSink,
};

#[derive(Parser, Debug)]
#[command(version, about = "Telemetry downlink aggregator", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/downlink.toml")]
    config: PathBuf,

    /// Read protocol lines from stdin instead of spawning the odometry source
    #[arg(long)]
    stdin: bool,

    /// Override the configured odometry source command
    #[arg(long)]
    command: Option<String>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }
    pretty_env_logger::init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(command) = args.command {
        config.odometry.command = command;
        config.odometry.args = vec![];
    }

    let cancel = CancelToken::new();
    let probe = ProcfsProbe::new();
    let sink = ConsoleSink::new(config.sink.format);

    let source = Arc::new(Mutex::new(None::<Child>));

    let pipeline = if args.stdin {
        info!("Reading odometry protocol from stdin");
        Pipeline::new(
            &config,
            BufReader::new(io::stdin()),
            probe,
            sink,
            cancel.clone(),
        )
    } else {
        let cmdline: String =
            chain([&config.odometry.command], &config.odometry.args).join(" ");
        info!("Spawning odometry source: {cmdline}");

        let mut child = Command::new(&config.odometry.command)
            .args(&config.odometry.args)
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn odometry source '{cmdline}'"))?;

        let stdout = child
            .stdout
            .take()
            .context("Odometry source has no stdout pipe")?;
        *source.lock().unwrap() = Some(child);

        Pipeline::new(
            &config,
            BufReader::new(stdout),
            probe,
            sink,
            cancel.clone(),
        )
    };

    {
        let cancel = cancel.clone();
        let source = source.clone();
        ctrlc::set_handler(move || {
            info!("Interrupted, shutting down");
            cancel.cancel();
            kill_source(&source);
        })?;
    }

    let res = pipeline.run_blocking(|| kill_source(&source));

    info!("Downlink pipeline stopped");
    res
}

/// Kills and reaps the odometry source, unblocking the decoder's read at
/// end of file. Safe to call more than once.
fn kill_source(source: &Arc<Mutex<Option<Child>>>) {
    if let Some(mut child) = source.lock().unwrap().take() {
        let _ = child.kill();
        let _ = child.wait();
    }
}
