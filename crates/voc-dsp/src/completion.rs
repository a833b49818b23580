//! Completion detection for a playing session.
//!
//! The strategy is fixed when a session opens:
//! - [`CompletionStrategy::Async`]: the device notifies us as space frees up, keeps being fed,
//!   and eventually underruns once the clip is exhausted.
//! - [`CompletionStrategy::Watermark`]: no notifications. The available-space count captured
//!   before the first write acts as a watermark; some devices never underrun, so reaching
//!   `watermark - 1` available bytes also counts as finished. Nothing is fed after the
//!   initial write in this mode, so clips larger than that write are cut short.

use crate::pcm::PcmState;

/// How the end of playback is detected for the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionStrategy {
    Async,
    Watermark { avail_at_start: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Playing,
    Finished,
}

/// Result of one poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Playing,
    Finished,
    /// The device stopped with `unsent` clip bytes never written. The session should be torn
    /// down.
    Truncated { unsent: usize },
}

#[derive(Debug, Default)]
pub struct CompletionDetector {
    phase: PlaybackPhase,
    strategy: Option<CompletionStrategy>,
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn strategy(&self) -> Option<CompletionStrategy> {
        self.strategy
    }

    /// Enter `Playing` for a freshly primed session.
    pub fn start(&mut self, strategy: CompletionStrategy) {
        self.phase = PlaybackPhase::Playing;
        self.strategy = Some(strategy);
    }

    /// Back to `Idle`; the session is gone.
    pub fn reset(&mut self) {
        self.phase = PlaybackPhase::Idle;
        self.strategy = None;
    }

    /// Inspect the device and decide whether playback is over.
    ///
    /// `avail` is only queried for the watermark strategy. Polls outside `Playing` report
    /// `Finished`.
    pub fn poll(
        &mut self,
        state: PcmState,
        avail: impl FnOnce() -> usize,
        remaining: usize,
    ) -> Completion {
        if self.phase != PlaybackPhase::Playing {
            return Completion::Finished;
        }

        if state != PcmState::Running {
            return self.finish(state, remaining);
        }

        if let Some(CompletionStrategy::Watermark { avail_at_start }) = self.strategy {
            // A zero watermark disables the heuristic.
            if avail_at_start != 0 && avail() == avail_at_start - 1 {
                return self.finish(state, remaining);
            }
        }

        Completion::Playing
    }

    fn finish(&mut self, state: PcmState, remaining: usize) -> Completion {
        self.phase = PlaybackPhase::Finished;
        if remaining == 0 {
            tracing::debug!(state = ?state, "playback finished");
            return Completion::Finished;
        }

        match self.strategy {
            Some(CompletionStrategy::Watermark { .. }) => tracing::warn!(
                unsent = remaining,
                state = ?state,
                "clip exceeded the initial write; watermark mode does not refill"
            ),
            _ => tracing::error!(
                unsent = remaining,
                state = ?state,
                "device stopped with unsent samples; forcing stop"
            ),
        }
        Completion::Truncated { unsent: remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(strategy: CompletionStrategy) -> CompletionDetector {
        let mut d = CompletionDetector::new();
        d.start(strategy);
        d
    }

    #[test]
    fn idle_detector_reports_finished() {
        let mut d = CompletionDetector::new();
        assert_eq!(d.phase(), PlaybackPhase::Idle);
        assert_eq!(d.poll(PcmState::Running, || 0, 0), Completion::Finished);
        assert_eq!(d.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn running_device_keeps_playing() {
        let mut d = playing(CompletionStrategy::Async);
        assert_eq!(d.poll(PcmState::Running, || 0, 12), Completion::Playing);
        assert_eq!(d.phase(), PlaybackPhase::Playing);
    }

    #[test]
    fn async_mode_never_queries_avail() {
        let mut d = playing(CompletionStrategy::Async);
        let result = d.poll(PcmState::Running, || panic!("avail queried"), 0);
        assert_eq!(result, Completion::Playing);
    }

    #[test]
    fn non_running_device_finishes() {
        for state in [PcmState::Xrun, PcmState::Setup, PcmState::Prepared] {
            let mut d = playing(CompletionStrategy::Async);
            assert_eq!(d.poll(state, || 0, 0), Completion::Finished);
            assert_eq!(d.phase(), PlaybackPhase::Finished);
        }
    }

    #[test]
    fn unsent_bytes_on_stop_are_truncation() {
        let mut d = playing(CompletionStrategy::Async);
        assert_eq!(
            d.poll(PcmState::Disconnected, || 0, 7),
            Completion::Truncated { unsent: 7 }
        );
        assert_eq!(d.phase(), PlaybackPhase::Finished);
    }

    #[test]
    fn watermark_mode_underrun_is_truncation() {
        let mut d = playing(CompletionStrategy::Watermark { avail_at_start: 4 });
        assert_eq!(d.poll(PcmState::Xrun, || 4, 6), Completion::Truncated { unsent: 6 });
        assert_eq!(d.phase(), PlaybackPhase::Finished);
    }

    #[test]
    fn watermark_minus_one_finishes() {
        let mut d = playing(CompletionStrategy::Watermark { avail_at_start: 64 });
        assert_eq!(d.poll(PcmState::Running, || 60, 0), Completion::Playing);
        assert_eq!(d.poll(PcmState::Running, || 64, 0), Completion::Playing);
        assert_eq!(d.poll(PcmState::Running, || 63, 0), Completion::Finished);
    }

    #[test]
    fn zero_watermark_is_ignored() {
        let mut d = playing(CompletionStrategy::Watermark { avail_at_start: 0 });
        assert_eq!(d.poll(PcmState::Running, || usize::MAX, 0), Completion::Playing);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut d = playing(CompletionStrategy::Async);
        d.reset();
        assert_eq!(d.phase(), PlaybackPhase::Idle);
        assert!(d.strategy().is_none());
    }
}
