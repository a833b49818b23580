//! Output device discovery and config selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - choosing the supported output config closest to a mono U8 request

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::pcm::PcmFormat;

/// Output shape requested by the configuration steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputRequest {
    pub format: PcmFormat,
    pub channels: u16,
    pub rate_hz: u32,
}

impl Default for OutputRequest {
    fn default() -> Self {
        Self {
            format: PcmFormat::U8,
            channels: 1,
            rate_hz: 22_050,
        }
    }
}

/// Pick a CPAL output device.
///
/// - If `needle` is `Some`, chooses the first output device whose name contains the substring
///   (case-insensitive).
/// - Otherwise, returns the host default output device.
///
/// Returns an error if no matching device exists or if the host reports no output devices.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices: Vec<cpal::Device> = host
            .output_devices()
            .context("No output devices")?
            .collect();
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Print available output devices to stdout.
///
/// This is intended for CLI UX (`--list-devices`) rather than structured output.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

/// Choose the supported output config closest to `request`.
///
/// Preference order:
/// 1. ranges that contain the requested rate
/// 2. ranges with the requested channel count
/// 3. sample formats closest to U8 (see [`sample_format_rank`])
/// 4. fewer channels
///
/// Ranges with sample formats the playback callback cannot produce are skipped.
pub fn pick_output_config(
    ranges: &[cpal::SupportedStreamConfigRange],
    request: &OutputRequest,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(Rank, cpal::SupportedStreamConfig)> = None;

    for range in ranges {
        let Some(format_rank) = sample_format_rank(range.sample_format()) else {
            continue;
        };
        let min = range.min_sample_rate();
        let max = range.max_sample_rate();
        let rate = pick_rate_for_range(min, max, request.rate_hz);
        let rank = Rank {
            rate_exact: rate == request.rate_hz,
            channels_exact: range.channels() == request.channels,
            format_rank,
            channels: range.channels(),
        };
        let replace = match &best {
            None => true,
            Some((b_rank, _)) => is_better_candidate(rank, *b_rank),
        };
        if replace {
            best = Some((rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| anyhow!("No usable output config"))
}

/// Clamp `target` into `[min, max]`.
fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    if target < min {
        min
    } else if target > max {
        max
    } else {
        target
    }
}

/// Lower is closer to 8-bit unsigned; `None` for formats the callback cannot write.
pub(crate) fn sample_format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::U8 => Some(0),
        cpal::SampleFormat::I16 => Some(1),
        cpal::SampleFormat::F32 => Some(2),
        cpal::SampleFormat::I32 => Some(3),
        cpal::SampleFormat::U16 => Some(4),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rank {
    rate_exact: bool,
    channels_exact: bool,
    format_rank: u8,
    channels: u16,
}

fn is_better_candidate(candidate: Rank, best: Rank) -> bool {
    if candidate.rate_exact != best.rate_exact {
        candidate.rate_exact
    } else if candidate.channels_exact != best.channels_exact {
        candidate.channels_exact
    } else if candidate.format_rank != best.format_rank {
        candidate.format_rank < best.format_rank
    } else {
        candidate.channels < best.channels
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(rate_exact: bool, channels_exact: bool, format_rank: u8, channels: u16) -> Rank {
        Rank {
            rate_exact,
            channels_exact,
            format_rank,
            channels,
        }
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", "  "));
    }

    #[test]
    fn pick_rate_for_range_clamps() {
        assert_eq!(pick_rate_for_range(8_000, 48_000, 7_812), 8_000);
        assert_eq!(pick_rate_for_range(4_000, 48_000, 7_812), 7_812);
        assert_eq!(pick_rate_for_range(44_100, 48_000, 96_000), 48_000);
    }

    #[test]
    fn exact_rate_beats_everything_else() {
        let exact = rank(true, false, 2, 2);
        let mono_u8 = rank(false, true, 0, 1);
        assert!(is_better_candidate(exact, mono_u8));
        assert!(!is_better_candidate(mono_u8, exact));
    }

    #[test]
    fn channels_then_format_then_width() {
        assert!(is_better_candidate(rank(true, true, 2, 1), rank(true, false, 0, 2)));
        assert!(is_better_candidate(rank(true, true, 0, 1), rank(true, true, 2, 1)));
        assert!(is_better_candidate(rank(true, false, 1, 2), rank(true, false, 1, 6)));
    }

    #[test]
    fn sample_format_rank_prefers_u8() {
        assert_eq!(sample_format_rank(cpal::SampleFormat::U8), Some(0));
        assert!(sample_format_rank(cpal::SampleFormat::I16) < sample_format_rank(cpal::SampleFormat::F32));
        assert_eq!(sample_format_rank(cpal::SampleFormat::I8), None);
    }
}
