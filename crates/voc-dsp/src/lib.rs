//! Digital sound playback for Creative Voice File (VOC) clips.
//!
//! ## Pipeline
//! 1. **Decode**: [`voc::decode`] extracts the first sound block (8-bit unsigned mono PCM) and
//!    derives its sample rate from the frequency divisor.
//! 2. **Open**: the engine opens and configures a PCM device through a [`pcm::PcmBackend`]
//!    (CPAL in production).
//! 3. **Stream**: the clip is written once up front, then topped up from the device's async
//!    notification when available.
//! 4. **Complete**: callers poll [`engine::Dsp::status`] until it reports stopped.

pub mod clip;
pub mod completion;
pub mod config;
pub mod cpal_pcm;
pub mod device;
pub mod engine;
pub mod pcm;
pub mod status;
pub mod stream;
pub mod voc;

#[cfg(test)]
mod fake;

pub use config::DspConfig;
pub use engine::Dsp;
pub use status::{DspSnapshot, DspStatus};
