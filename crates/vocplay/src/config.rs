use std::path::PathBuf;
use std::time::Duration;

pub use voc_dsp::DspConfig;

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub path: PathBuf,
    pub dsp: DspConfig,
    /// How often the status is polled while playing.
    pub poll_interval: Duration,
}
