//! CPAL-backed PCM device.
//!
//! CPAL pulls samples from a callback, so the device keeps a bounded ring of pending
//! bytes that [`PcmWriter::write`] fills and the output callback drains. The callback:
//! - converts 8-bit unsigned samples to the device sample format
//! - duplicates the mono signal across every output channel
//! - steps through the ring at `clip_rate / device_rate` with linear interpolation
//! - invokes the registered async handler after every slice of at most half the ring, so a
//!   long device period is refilled before the ring drains
//!
//! The ring drives [`PcmState`]: the first accepted byte moves `Prepared` to `Running`, and
//! draining the ring while running moves it to `Xrun`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::DspConfig;
use crate::device::{self, OutputRequest};
use crate::pcm::{Access, AsyncHandler, PcmBackend, PcmDevice, PcmFormat, PcmState, PcmWriter};

/// Opens CPAL output devices according to a [`DspConfig`].
pub struct CpalBackend {
    host: cpal::Host,
    device: Option<String>,
    buffer_frames: usize,
    async_notify: bool,
}

impl CpalBackend {
    pub fn new(config: &DspConfig) -> Self {
        Self {
            host: cpal::default_host(),
            device: config.device.clone(),
            buffer_frames: config.buffer_frames.max(1),
            async_notify: config.async_notify,
        }
    }
}

impl PcmBackend for CpalBackend {
    type Device = CpalPcm;

    fn open(&self) -> Result<CpalPcm> {
        let device = device::pick_device(&self.host, self.device.as_deref())?;
        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!(device = %name, ring_bytes = self.buffer_frames, "opened output device");
        Ok(CpalPcm {
            device,
            name,
            ranges: Vec::new(),
            request: OutputRequest::default(),
            shared: Arc::new(RingShared::new(self.buffer_frames)),
            async_notify: self.async_notify,
            stream: None,
        })
    }
}

/// An open CPAL output device.
pub struct CpalPcm {
    device: cpal::Device,
    name: String,
    ranges: Vec<cpal::SupportedStreamConfigRange>,
    request: OutputRequest,
    shared: Arc<RingShared>,
    async_notify: bool,
    stream: Option<cpal::Stream>,
}

impl PcmWriter for CpalPcm {
    fn avail(&self) -> usize {
        self.shared.avail()
    }

    fn write(&self, data: &[u8]) -> usize {
        self.shared.write(data)
    }
}

impl PcmDevice for CpalPcm {
    fn name(&self) -> &str {
        &self.name
    }

    fn hw_params_any(&mut self) -> Result<()> {
        self.ranges = self
            .device
            .supported_output_configs()
            .context("query supported output configs")?
            .collect();
        if self.ranges.is_empty() {
            return Err(anyhow!("No supported output configs"));
        }
        Ok(())
    }

    fn set_access(&mut self, access: Access) -> Result<()> {
        match access {
            Access::Interleaved => Ok(()),
            Access::NonInterleaved => Err(anyhow!("CPAL output is interleaved only")),
        }
    }

    fn set_format(&mut self, format: PcmFormat) -> Result<()> {
        self.request.format = format;
        let wanted = match format {
            PcmFormat::U8 => cpal::SampleFormat::U8,
        };
        if self.ranges.iter().any(|r| r.sample_format() == wanted) {
            Ok(())
        } else {
            Err(anyhow!("no native {wanted:?} output; samples will be converted"))
        }
    }

    fn set_channels(&mut self, channels: u16) -> Result<()> {
        self.request.channels = channels;
        if self.ranges.iter().any(|r| r.channels() == channels) {
            Ok(())
        } else {
            Err(anyhow!("no {channels}-channel output; signal will be duplicated"))
        }
    }

    fn set_rate(&mut self, rate_hz: u32) -> Result<()> {
        self.request.rate_hz = rate_hz;
        if self
            .ranges
            .iter()
            .any(|r| r.min_sample_rate() <= rate_hz && rate_hz <= r.max_sample_rate())
        {
            Ok(())
        } else {
            Err(anyhow!("{rate_hz} Hz unsupported; samples will be rate-converted"))
        }
    }

    fn commit(&mut self) -> Result<()> {
        if self.ranges.is_empty() {
            self.hw_params_any()?;
        }
        let config = device::pick_output_config(&self.ranges, &self.request)?;
        let stream_config: cpal::StreamConfig = config.clone().into();
        let device_rate = stream_config.sample_rate;
        if device_rate == 0 {
            return Err(anyhow!("device reported a 0 Hz sample rate"));
        }

        {
            let mut ring = self.shared.lock_ring();
            ring.step = f64::from(self.request.rate_hz) / f64::from(device_rate);
            ring.phase = 0.0;
            ring.state = PcmState::Prepared;
        }

        let stream = match config.sample_format() {
            cpal::SampleFormat::U8 => build_stream::<u8>(&self.device, &stream_config, &self.shared),
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &stream_config, &self.shared),
            cpal::SampleFormat::I32 => build_stream::<i32>(&self.device, &stream_config, &self.shared),
            cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &stream_config, &self.shared),
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &stream_config, &self.shared),
            other => Err(anyhow!("Unsupported sample format: {other:?}")),
        }?;
        stream.play().context("start output stream")?;

        tracing::info!(
            device = %self.name,
            clip_rate_hz = self.request.rate_hz,
            output_rate_hz = device_rate,
            channels = stream_config.channels,
            sample_format = ?config.sample_format(),
            "output stream ready"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn add_async_handler(&mut self, handler: AsyncHandler) -> Result<()> {
        if !self.async_notify {
            return Err(anyhow!("async notification disabled"));
        }
        *self.shared.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
        Ok(())
    }

    fn state(&self) -> PcmState {
        self.shared.lock_ring().state
    }

    fn drop_pending(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("pause on drop: {e}");
            }
        }
        self.shared.handler.lock().unwrap_or_else(|e| e.into_inner()).take();
        let mut ring = self.shared.lock_ring();
        ring.pending.clear();
        ring.phase = 0.0;
        ring.state = PcmState::Setup;
    }
}

impl Drop for CpalPcm {
    fn drop(&mut self) {
        self.drop_pending();
    }
}

/// State shared between the writer side and the output callback.
struct RingShared {
    ring: Mutex<Ring>,
    handler: Mutex<Option<AsyncHandler>>,
}

struct Ring {
    pending: VecDeque<u8>,
    capacity: usize,
    state: PcmState,
    /// Fractional read position between `pending[0]` and `pending[1]`.
    phase: f64,
    /// Source samples consumed per output frame.
    step: f64,
}

impl RingShared {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                pending: VecDeque::with_capacity(capacity),
                capacity,
                state: PcmState::Setup,
                phase: 0.0,
                step: 1.0,
            }),
            handler: Mutex::new(None),
        }
    }

    fn lock_ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run the async handler, if any. Skipped when a previous notification is still running.
    fn notify(&self) {
        let Ok(mut guard) = self.handler.try_lock() else {
            return;
        };
        if let Some(handler) = guard.as_mut() {
            handler(self);
        }
    }

    /// Output frames rendered between notifications.
    ///
    /// Each frame consumes at most `ceil(step)` pending bytes, so a slice never takes more than
    /// half the ring and the handler can refill it before it runs dry.
    fn slice_frames(&self) -> usize {
        let ring = self.lock_ring();
        let per_frame = ring.step.ceil().max(1.0) as usize;
        (ring.capacity / 2 / per_frame).max(1)
    }

    /// Fill one output period, notifying the handler after every slice.
    fn render<T>(&self, data: &mut [T], channels_out: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
        let slice_len = self.slice_frames() * channels_out;
        for slice in data.chunks_mut(slice_len) {
            {
                let mut ring = self.lock_ring();
                for frame in slice.chunks_mut(channels_out) {
                    let value = ring
                        .next_sample()
                        .map(<T as cpal::Sample>::from_sample::<f32>)
                        .unwrap_or(silence);
                    frame.fill(value);
                }
            }
            self.notify();
        }
    }
}

impl PcmWriter for RingShared {
    fn avail(&self) -> usize {
        let ring = self.lock_ring();
        match ring.state {
            PcmState::Disconnected => 0,
            _ => ring.capacity - ring.pending.len(),
        }
    }

    fn write(&self, data: &[u8]) -> usize {
        let mut ring = self.lock_ring();
        if !matches!(ring.state, PcmState::Prepared | PcmState::Running) {
            return 0;
        }
        let n = data.len().min(ring.capacity - ring.pending.len());
        ring.pending.extend(&data[..n]);
        if n > 0 && ring.state == PcmState::Prepared {
            ring.state = PcmState::Running;
        }
        n
    }
}

impl Ring {
    /// Next output sample in `[-1.0, 1.0)`, or `None` when nothing is playing.
    fn next_sample(&mut self) -> Option<f32> {
        if self.state != PcmState::Running {
            return None;
        }
        let Some(&cur) = self.pending.front() else {
            self.state = PcmState::Xrun;
            return None;
        };
        let next = self.pending.get(1).copied().unwrap_or(cur);
        let cur = u8_to_f32(cur);
        let out = cur + (u8_to_f32(next) - cur) * self.phase as f32;

        self.phase += self.step;
        let whole = self.phase.floor();
        let consumed = (whole as usize).min(self.pending.len());
        self.pending.drain(..consumed);
        self.phase -= whole;
        Some(out)
    }
}

fn u8_to_f32(sample: u8) -> f32 {
    (f32::from(sample) - 128.0) / 128.0
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<RingShared>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = (config.channels as usize).max(1);
    let shared_cb = shared.clone();
    let shared_err = shared.clone();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| shared_cb.render(data, channels_out),
        move |err| {
            tracing::warn!("stream error: {err}");
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                shared_err.lock_ring().state = PcmState::Disconnected;
            }
        },
        None,
    )?;

    Ok(stream)
}
