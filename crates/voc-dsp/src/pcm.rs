//! PCM output device abstraction.
//!
//! The engine talks to an output device through these traits rather than to a concrete
//! audio API. A device is opened in non-blocking mode:
//! - [`PcmWriter::write`] accepts as many bytes as currently fit and returns that count
//! - [`PcmWriter::avail`] reports how many bytes would currently be accepted
//!
//! Configuration happens in steps so each one can fail independently; only
//! [`PcmDevice::commit`] is fatal. Dropping a device closes it.

use anyhow::Result;

/// Device state as seen by the completion detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmState {
    /// Opened, hardware parameters not committed yet.
    Setup,
    /// Committed, waiting for the first samples.
    Prepared,
    /// Consuming samples.
    Running,
    /// Ran out of samples while running.
    Xrun,
    /// The device went away.
    Disconnected,
}

/// Sample layout in the device buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Interleaved,
    NonInterleaved,
}

/// Sample format of the bytes handed to [`PcmWriter::write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmFormat {
    /// 8-bit unsigned, silence at 0x80.
    U8,
}

/// Write side of an open device.
pub trait PcmWriter {
    /// Bytes the device would accept right now.
    fn avail(&self) -> usize;

    /// Queue up to `data.len()` bytes without blocking; returns how many were accepted.
    fn write(&self, data: &[u8]) -> usize;
}

/// Callback invoked from the device's own thread whenever buffer space frees up.
pub type AsyncHandler = Box<dyn FnMut(&dyn PcmWriter) + Send + 'static>;

/// An open playback device.
pub trait PcmDevice: PcmWriter {
    /// Human-readable device name for diagnostics.
    fn name(&self) -> &str;

    /// Start from the full hardware configuration space.
    fn hw_params_any(&mut self) -> Result<()>;
    fn set_access(&mut self, access: Access) -> Result<()>;
    fn set_format(&mut self, format: PcmFormat) -> Result<()>;
    fn set_channels(&mut self, channels: u16) -> Result<()>;
    fn set_rate(&mut self, rate_hz: u32) -> Result<()>;

    /// Apply the requested parameters. Failure means the device is unusable.
    fn commit(&mut self) -> Result<()>;

    /// Register a space-available notification.
    ///
    /// Returns an error when the device cannot deliver notifications; the caller is then
    /// expected to poll.
    fn add_async_handler(&mut self, handler: AsyncHandler) -> Result<()>;

    fn state(&self) -> PcmState;

    /// Stop immediately, discarding queued samples and any registered handler.
    fn drop_pending(&mut self);
}

/// Opens devices for the engine.
pub trait PcmBackend {
    type Device: PcmDevice;

    /// Open a playback device in non-blocking mode.
    fn open(&self) -> Result<Self::Device>;
}
