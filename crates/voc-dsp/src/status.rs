//! Playback status codes and diagnostic snapshots.

use crate::completion::{CompletionStrategy, PlaybackPhase};
use crate::voc::VocCodec;

/// Externally visible playback status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DspStatus {
    Stopped = 0,
    Busy = 2,
}

impl DspStatus {
    /// Numeric status code (0 stopped, 2 busy).
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_busy(self) -> bool {
        self == Self::Busy
    }
}

/// Point-in-time view of the engine for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DspSnapshot {
    pub initialized: bool,
    pub phase: PlaybackPhase,
    pub strategy: Option<CompletionStrategy>,
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    /// Codec declared by the loaded clip's sound block.
    pub codec: VocCodec,
    /// Length of the loaded clip in bytes.
    pub clip_len: usize,
    /// Clip bytes not yet written to the device.
    pub remaining: usize,
    /// Clip buffer capacity in bytes.
    pub capacity: usize,
}

impl DspSnapshot {
    /// Percentage of the clip handed to the device so far.
    pub fn written_percent(&self) -> u8 {
        if self.clip_len == 0 {
            return 100;
        }
        let written = self.clip_len.saturating_sub(self.remaining);
        (written.saturating_mul(100) / self.clip_len) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(clip_len: usize, remaining: usize) -> DspSnapshot {
        DspSnapshot {
            initialized: true,
            phase: PlaybackPhase::Playing,
            strategy: Some(CompletionStrategy::Async),
            device: Some("test".to_string()),
            sample_rate: Some(7812),
            codec: VocCodec::PcmU8,
            clip_len,
            remaining,
            capacity: clip_len,
        }
    }

    #[test]
    fn status_codes_are_zero_and_two() {
        assert_eq!(DspStatus::Stopped.code(), 0);
        assert_eq!(DspStatus::Busy.code(), 2);
        assert!(DspStatus::Busy.is_busy());
        assert!(!DspStatus::Stopped.is_busy());
    }

    #[test]
    fn written_percent_tracks_cursor() {
        assert_eq!(snapshot(200, 150).written_percent(), 25);
        assert_eq!(snapshot(200, 0).written_percent(), 100);
        assert_eq!(snapshot(0, 0).written_percent(), 100);
    }
}
