/// Engine tuning parameters shared by the device backend and the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DspConfig {
    /// Output device name substring; `None` selects the host default.
    pub device: Option<String>,
    /// Pending-sample ring size in frames (one byte per mono U8 frame).
    pub buffer_frames: usize,
    /// Whether the device may deliver space-available notifications.
    ///
    /// When `false` the engine falls back to watermark polling.
    pub async_notify: bool,
}

impl Default for DspConfig {
    /// Half a second of headroom at the common 8 kHz VOC rates.
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: 4096,
            async_notify: true,
        }
    }
}
