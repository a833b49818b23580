//! Front-end runtime helpers.
//!
//! Provides device enumeration, VOC inspection and play-to-completion.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::PlayConfig;
use voc_dsp::pcm::PcmBackend;
use voc_dsp::voc::{self, VocHeader};
use voc_dsp::{Dsp, device};

/// How a `play` run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Nothing was playing right after `play` (no sound block, or the device failed).
    NotStarted,
    Completed,
    Interrupted,
}

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Print the VOC header and first block of `path`.
pub fn run_info(path: &Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    let header = VocHeader::parse(&raw)?;

    println!("file:        {}", path.display());
    println!("signature:   {}", if header.signature_ok { "ok" } else { "missing" });
    println!("header len:  {}", header.header_len);
    if let Some((major, minor)) = header.version {
        println!("version:     {major}.{minor}");
    }
    if let Some(ok) = header.checksum_ok {
        println!("checksum:    {}", if ok { "ok" } else { "mismatch" });
    }

    let kind = voc::first_block_type(&raw)?;
    println!("first block: {kind:?}");
    if let Some(sound) = voc::decode(&raw)? {
        println!("rate:        {} Hz (divisor 0x{:02x})", sound.sample_rate, sound.divisor);
        println!("codec:       {:?}", sound.codec);
        println!("payload:     {} bytes", sound.pcm.len());
        println!("duration:    {} ms", duration_ms(sound.pcm.len(), sound.sample_rate));
    }
    Ok(())
}

/// Play `config.path` on a CPAL device and wait for it to finish.
///
/// With `install_ctrlc`, Ctrl-C stops playback and returns [`PlayOutcome::Interrupted`].
pub fn run_play(config: PlayConfig, install_ctrlc: bool) -> Result<PlayOutcome> {
    let raw = std::fs::read(&config.path).with_context(|| format!("read {:?}", config.path))?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    if install_ctrlc {
        let tx = stop_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            let _ = tx.try_send(());
        }) {
            tracing::warn!("failed to install Ctrl-C handler: {e}");
        }
    }

    let mut dsp = Dsp::with_cpal(&config.dsp);
    if !dsp.init() {
        return Err(anyhow!("failed to initialize DSP"));
    }
    let outcome = play_and_wait(&mut dsp, &raw, config.poll_interval, &stop_rx);
    dsp.uninit();
    drop(stop_tx);
    Ok(outcome)
}

/// Start `raw` on `dsp` and poll until it stops or a stop request arrives on `stop_rx`.
pub fn play_and_wait<B: PcmBackend>(
    dsp: &mut Dsp<B>,
    raw: &[u8],
    poll_interval: Duration,
    stop_rx: &Receiver<()>,
) -> PlayOutcome {
    dsp.play(raw);
    if !dsp.status().is_busy() {
        return PlayOutcome::NotStarted;
    }

    let mut last_percent = None;
    loop {
        match stop_rx.recv_timeout(poll_interval) {
            Ok(()) => {
                tracing::info!("stop requested");
                dsp.stop();
                return PlayOutcome::Interrupted;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(poll_interval),
        }

        if !dsp.status().is_busy() {
            return PlayOutcome::Completed;
        }

        let percent = dsp.snapshot().written_percent();
        if last_percent != Some(percent) {
            tracing::debug!(written_percent = percent, "streaming");
            last_percent = Some(percent);
        }
    }
}

fn duration_ms(len: usize, rate_hz: u32) -> u64 {
    if rate_hz == 0 {
        return 0;
    }
    (len as u64).saturating_mul(1000) / u64::from(rate_hz)
}
