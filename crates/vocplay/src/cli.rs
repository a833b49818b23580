use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PlayConfig;
use voc_dsp::DspConfig;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "vocplay", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Pending-sample ring size in frames (larger => more latency, fewer underruns)
    #[arg(long, default_value_t = 4096)]
    pub buffer_frames: usize,

    /// Disable async device notifications and detect the end of playback by polling
    #[arg(long)]
    pub no_async: bool,

    /// Status poll interval in milliseconds
    #[arg(long, default_value_t = 10)]
    pub poll_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play the first sound block of a VOC file
    Play {
        /// Path to a Creative Voice File
        path: PathBuf,
    },

    /// Print VOC header and first-block details without playing
    Info {
        /// Path to a Creative Voice File
        path: PathBuf,
    },
}

impl Args {
    pub fn dsp_config(&self) -> DspConfig {
        DspConfig {
            device: self
                .device
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            buffer_frames: self.buffer_frames,
            async_notify: !self.no_async,
        }
    }

    pub fn play_config(&self, path: PathBuf) -> PlayConfig {
        PlayConfig {
            path,
            dsp: self.dsp_config(),
            poll_interval: std::time::Duration::from_millis(self.poll_ms.max(1)),
        }
    }
}
