//! Engine-owned PCM storage for the clip being played.
//!
//! The backing buffer is reused across plays and only ever grows: a shorter clip reuses the
//! existing allocation, a longer one reallocates. It is released at engine teardown.

use crate::voc::{VocCodec, VocSound};

/// Decoded 8-bit unsigned PCM samples plus the metadata needed to play them.
#[derive(Debug)]
pub struct SoundClip {
    data: Vec<u8>,
    len: usize,
    sample_rate: u32,
    codec: VocCodec,
}

impl Default for SoundClip {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundClip {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            sample_rate: 0,
            codec: VocCodec::PcmU8,
        }
    }

    /// Replace the clip contents with `sound`'s payload.
    pub fn load(&mut self, sound: &VocSound<'_>) {
        let len = sound.pcm.len();
        if self.data.len() < len {
            tracing::debug!(from = self.data.len(), to = len, "growing clip buffer");
            self.data.resize(len, 0);
        }
        self.data[..len].copy_from_slice(sound.pcm);
        self.len = len;
        self.sample_rate = sound.sample_rate;
        self.codec = sound.codec;
    }

    /// PCM bytes of the current clip.
    pub fn samples(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn codec(&self) -> VocCodec {
        self.codec
    }

    /// Free the backing buffer.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.len = 0;
        self.sample_rate = 0;
    }
}
