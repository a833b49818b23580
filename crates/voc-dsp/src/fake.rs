//! Scripted in-memory PCM backend for engine tests.
//!
//! Devices never consume on their own; tests drive them with `consume`, `set_state` and
//! `fire` (the async notification).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::pcm::{Access, AsyncHandler, PcmBackend, PcmDevice, PcmFormat, PcmState, PcmWriter};

#[derive(Clone, Debug)]
pub(crate) struct FakeScript {
    pub capacity: usize,
    pub async_supported: bool,
    pub fail_open: bool,
    pub fail_commit: bool,
    /// Fail every configuration step except commit.
    pub fail_steps: bool,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            capacity: 64,
            async_supported: true,
            fail_open: false,
            fail_commit: false,
            fail_steps: false,
        }
    }
}

pub(crate) struct FakeBackend {
    script: FakeScript,
    devices: Mutex<Vec<Arc<FakeShared>>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            devices: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn last_device(&self) -> Arc<FakeShared> {
        self.devices.lock().unwrap().last().cloned().expect("no device opened")
    }
}

impl PcmBackend for FakeBackend {
    type Device = FakeDevice;

    fn open(&self) -> Result<FakeDevice> {
        if self.script.fail_open {
            return Err(anyhow!("no such device"));
        }
        let shared = Arc::new(FakeShared {
            inner: Mutex::new(FakeInner {
                capacity: self.script.capacity,
                pending: 0,
                written: Vec::new(),
                state: PcmState::Setup,
                rate: None,
                steps: Vec::new(),
                dropped: false,
            }),
            handler: Mutex::new(None),
        });
        self.devices.lock().unwrap().push(shared.clone());
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
        Ok(FakeDevice {
            shared,
            script: self.script.clone(),
            live: self.live.clone(),
        })
    }
}

struct FakeInner {
    capacity: usize,
    pending: usize,
    written: Vec<u8>,
    state: PcmState,
    rate: Option<u32>,
    steps: Vec<&'static str>,
    dropped: bool,
}

/// Device state shared between the engine's device and the test.
pub(crate) struct FakeShared {
    inner: Mutex<FakeInner>,
    handler: Mutex<Option<AsyncHandler>>,
}

impl FakeShared {
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn config_rate(&self) -> Option<u32> {
        self.inner.lock().unwrap().rate
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().steps.clone()
    }

    pub fn dropped(&self) -> bool {
        self.inner.lock().unwrap().dropped
    }

    /// Pretend the hardware played `n` queued bytes.
    pub fn consume(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending = inner.pending.saturating_sub(n);
    }

    pub fn set_pending(&self, n: usize) {
        self.inner.lock().unwrap().pending = n;
    }

    pub fn set_state(&self, state: PcmState) {
        self.inner.lock().unwrap().state = state;
    }

    /// Deliver a space-available notification.
    pub fn fire(&self) {
        let mut handler = self.handler.lock().unwrap();
        if let Some(handler) = handler.as_mut() {
            handler(self);
        }
    }

    pub fn take_handler(&self) -> Option<AsyncHandler> {
        self.handler.lock().unwrap().take()
    }

    pub fn fire_with(&self, mut handler: AsyncHandler) {
        handler(self);
    }

    fn step(&self, name: &'static str) {
        self.inner.lock().unwrap().steps.push(name);
    }
}

impl PcmWriter for FakeShared {
    fn avail(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.capacity.saturating_sub(inner.pending)
    }

    fn write(&self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, PcmState::Prepared | PcmState::Running) {
            return 0;
        }
        let n = data.len().min(inner.capacity.saturating_sub(inner.pending));
        inner.pending += n;
        inner.written.extend_from_slice(&data[..n]);
        if n > 0 {
            inner.state = PcmState::Running;
        }
        n
    }
}

pub(crate) struct FakeDevice {
    shared: Arc<FakeShared>,
    script: FakeScript,
    live: Arc<AtomicUsize>,
}

impl FakeDevice {
    fn scripted_step(&self, name: &'static str) -> Result<()> {
        self.shared.step(name);
        if self.script.fail_steps {
            return Err(anyhow!("{name} rejected"));
        }
        Ok(())
    }
}

impl PcmWriter for FakeDevice {
    fn avail(&self) -> usize {
        self.shared.avail()
    }

    fn write(&self, data: &[u8]) -> usize {
        self.shared.write(data)
    }
}

impl PcmDevice for FakeDevice {
    fn name(&self) -> &str {
        "fake"
    }

    fn hw_params_any(&mut self) -> Result<()> {
        self.scripted_step("any")
    }

    fn set_access(&mut self, _access: Access) -> Result<()> {
        self.scripted_step("access")
    }

    fn set_format(&mut self, _format: PcmFormat) -> Result<()> {
        self.scripted_step("format")
    }

    fn set_channels(&mut self, _channels: u16) -> Result<()> {
        self.scripted_step("channels")
    }

    fn set_rate(&mut self, rate_hz: u32) -> Result<()> {
        self.shared.inner.lock().unwrap().rate = Some(rate_hz);
        self.scripted_step("rate")
    }

    fn commit(&mut self) -> Result<()> {
        self.shared.step("commit");
        if self.script.fail_commit {
            return Err(anyhow!("commit rejected"));
        }
        self.shared.set_state(PcmState::Prepared);
        Ok(())
    }

    fn add_async_handler(&mut self, handler: AsyncHandler) -> Result<()> {
        if !self.script.async_supported {
            return Err(anyhow!("not supported"));
        }
        *self.shared.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn state(&self) -> PcmState {
        self.shared.inner.lock().unwrap().state
    }

    fn drop_pending(&mut self) {
        self.shared.handler.lock().unwrap().take();
        let mut inner = self.shared.inner.lock().unwrap();
        inner.pending = 0;
        inner.dropped = true;
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
