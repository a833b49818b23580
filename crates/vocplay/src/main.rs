//! vocplay: play the first sound block of a Creative Voice File on an output device.
//!
//! The clip is written to the device once, topped up from the device's notifications, and
//! the engine status is polled until playback ends or Ctrl-C stops it.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use vocplay::{cli, runtime};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,vocplay=info,voc_dsp=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    match &args.cmd {
        Some(cli::Command::Play { path }) => {
            let outcome = runtime::run_play(args.play_config(path.clone()), true)?;
            tracing::info!(?outcome, "done");
        }
        Some(cli::Command::Info { path }) => runtime::run_info(path)?,
        None => cli::Args::command().print_help()?,
    }

    Ok(())
}
