//! The playback engine context.
//!
//! [`Dsp`] owns everything a playback needs: the backend that opens devices, the shared
//! clip/cursor, the current session and its completion detector. It exposes the classic
//! operations:
//! - `init` / `uninit` bound the engine's lifetime
//! - `play` decodes a VOC image and starts it, preempting anything already playing
//! - `status` is polled by the caller to learn when playback is over
//! - `stop` drops in-flight audio immediately
//!
//! None of these block and none return errors; failures are logged through `tracing`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::completion::{Completion, CompletionDetector, CompletionStrategy};
use crate::config::DspConfig;
use crate::cpal_pcm::CpalBackend;
use crate::pcm::{Access, AsyncHandler, PcmBackend, PcmDevice, PcmFormat, PcmWriter};
use crate::status::{DspSnapshot, DspStatus};
use crate::stream::{self, SharedStream, StreamBuffer};
use crate::voc;

/// Mono output; the engine never mixes.
const CHANNELS: u16 = 1;

struct Session<D> {
    device: D,
    sample_rate: u32,
}

/// Digital sound playback engine.
pub struct Dsp<B: PcmBackend> {
    backend: B,
    initialized: bool,
    stream: SharedStream,
    /// Read by the async handler before feeding.
    playing: Arc<AtomicBool>,
    session: Option<Session<B::Device>>,
    detector: CompletionDetector,
}

impl Dsp<CpalBackend> {
    /// Engine backed by the host's CPAL output devices.
    pub fn with_cpal(config: &DspConfig) -> Self {
        Self::new(CpalBackend::new(config))
    }
}

impl<B: PcmBackend> Dsp<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            initialized: false,
            stream: StreamBuffer::shared(),
            playing: Arc::new(AtomicBool::new(false)),
            session: None,
            detector: CompletionDetector::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn init(&mut self) -> bool {
        self.initialized = true;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Play the first sound block of a VOC image.
    ///
    /// Input whose first block is not sound data is ignored without touching the current
    /// playback. Otherwise any current playback is stopped first.
    pub fn play(&mut self, raw: &[u8]) {
        if !self.initialized {
            tracing::warn!("play requested before init; ignoring");
            return;
        }

        let sound = match voc::decode(raw) {
            Ok(Some(sound)) => sound,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("ignoring malformed VOC data: {e:#}");
                return;
            }
        };

        self.stop();
        stream::lock(&self.stream).load(&sound);

        if let Err(e) = self.start_session(sound.sample_rate) {
            tracing::error!("failed to start playback: {e:#}");
        }
    }

    /// Poll playback status.
    ///
    /// Returns [`DspStatus::Busy`] while the current clip is playing and
    /// [`DspStatus::Stopped`] otherwise.
    pub fn status(&mut self) -> DspStatus {
        if !self.playing.load(Ordering::Acquire) {
            return DspStatus::Stopped;
        }
        let Some(session) = &self.session else {
            return DspStatus::Stopped;
        };

        let remaining = stream::lock(&self.stream).remaining();
        let state = session.device.state();
        match self.detector.poll(state, || session.device.avail(), remaining) {
            Completion::Playing => DspStatus::Busy,
            Completion::Finished => {
                self.playing.store(false, Ordering::Release);
                DspStatus::Stopped
            }
            Completion::Truncated { .. } => {
                self.stop();
                DspStatus::Stopped
            }
        }
    }

    /// Stop playback immediately and close the device. No-op when nothing is open.
    pub fn stop(&mut self) {
        self.playing.store(false, Ordering::Release);
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.device.drop_pending();
        tracing::debug!(device = %session.device.name(), "playback stopped");
        drop(session);
        self.detector.reset();
    }

    /// Stop playback and free the clip buffer. Safe to call repeatedly.
    pub fn uninit(&mut self) {
        if !self.initialized {
            return;
        }
        self.stop();
        stream::lock(&self.stream).release();
        self.initialized = false;
    }

    pub fn snapshot(&self) -> DspSnapshot {
        let buf = stream::lock(&self.stream);
        DspSnapshot {
            initialized: self.initialized,
            phase: self.detector.phase(),
            strategy: self.detector.strategy(),
            device: self.session.as_ref().map(|s| s.device.name().to_string()),
            sample_rate: self.session.as_ref().map(|s| s.sample_rate),
            clip_len: buf.clip().len(),
            codec: buf.clip().codec(),
            remaining: buf.cursor().remaining,
            capacity: buf.clip().capacity(),
        }
    }

    fn start_session(&mut self, rate_hz: u32) -> Result<()> {
        let mut device = self.backend.open().context("failed to open PCM device")?;
        configure(&mut device, rate_hz)?;

        let strategy = self.register_completion(&mut device);
        let written = stream::lock(&self.stream).prime(&device);
        self.playing.store(true, Ordering::Release);
        self.detector.start(strategy);

        tracing::info!(
            device = %device.name(),
            rate_hz,
            written,
            strategy = ?strategy,
            "playback started"
        );
        self.session = Some(Session {
            device,
            sample_rate: rate_hz,
        });
        Ok(())
    }

    fn register_completion(&self, device: &mut B::Device) -> CompletionStrategy {
        let stream = self.stream.clone();
        let playing = self.playing.clone();
        let handler: AsyncHandler = Box::new(move |out: &dyn PcmWriter| {
            if !playing.load(Ordering::Acquire) {
                return;
            }
            stream::lock(&stream).feed(out);
        });

        match device.add_async_handler(handler) {
            Ok(()) => CompletionStrategy::Async,
            Err(e) => {
                let avail = device.avail();
                tracing::warn!(
                    avail,
                    "async callbacks not supported ({e:#}); polling for end of stream"
                );
                CompletionStrategy::Watermark {
                    avail_at_start: avail,
                }
            }
        }
    }
}

impl<B: PcmBackend> Drop for Dsp<B> {
    fn drop(&mut self) {
        self.uninit();
    }
}

/// Negotiate mono U8 interleaved output at `rate_hz`.
///
/// Every step but the final commit is best-effort.
fn configure<D: PcmDevice>(device: &mut D, rate_hz: u32) -> Result<()> {
    if let Err(e) = device.hw_params_any() {
        tracing::warn!("hw_params_any failed: {e:#}");
    }
    if let Err(e) = device.set_access(Access::Interleaved) {
        tracing::warn!("set_access failed: {e:#}");
    }
    if let Err(e) = device.set_format(PcmFormat::U8) {
        tracing::warn!("set_format failed: {e:#}");
    }
    if let Err(e) = device.set_channels(CHANNELS) {
        tracing::warn!("set_channels failed: {e:#}");
    }
    if let Err(e) = device.set_rate(rate_hz) {
        tracing::warn!("set_rate failed: {e:#}");
    }
    device
        .commit()
        .with_context(|| format!("failed to set parameters for {}", device.name()))
}
