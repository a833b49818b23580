//! Streaming buffer: the write cursor over the current clip.
//!
//! The engine shares one [`StreamBuffer`] between the caller thread and the device's async
//! handler through [`SharedStream`]. Only one side writes at a time:
//! - the caller primes the device once when a session starts
//! - afterwards only the async handler feeds, and the caller only reads `remaining`

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clip::SoundClip;
use crate::pcm::PcmWriter;
use crate::voc::VocSound;

/// Shared handle to the engine's stream buffer.
pub type SharedStream = Arc<Mutex<StreamBuffer>>;

/// Lock a [`SharedStream`], recovering the guard if a previous holder panicked.
pub fn lock(stream: &SharedStream) -> MutexGuard<'_, StreamBuffer> {
    stream.lock().unwrap_or_else(|e| e.into_inner())
}

/// Position in the clip and bytes not yet handed to the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamCursor {
    pub offset: usize,
    pub remaining: usize,
}

/// The clip being played plus its cursor.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    clip: SoundClip,
    cursor: StreamCursor,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStream {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Load a new clip and rewind the cursor to its start.
    pub fn load(&mut self, sound: &VocSound<'_>) {
        self.clip.load(sound);
        self.cursor = StreamCursor {
            offset: 0,
            remaining: self.clip.len(),
        };
    }

    pub fn clip(&self) -> &SoundClip {
        &self.clip
    }

    pub fn cursor(&self) -> StreamCursor {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining
    }

    /// Write as much of the clip as the device accepts right now.
    ///
    /// Used once at session start; a partial write is normal.
    pub fn prime(&mut self, out: &dyn PcmWriter) -> usize {
        let want = self.cursor.remaining;
        self.write_up_to(out, want)
    }

    /// Top up the device with newly available space.
    ///
    /// No-op when the clip is exhausted or the device has no room.
    pub fn feed(&mut self, out: &dyn PcmWriter) -> usize {
        if self.cursor.remaining == 0 {
            return 0;
        }
        let avail = out.avail();
        if avail == 0 {
            return 0;
        }
        let want = avail.min(self.cursor.remaining);
        self.write_up_to(out, want)
    }

    /// Drop the clip and free its storage.
    pub fn release(&mut self) {
        self.clip.release();
        self.cursor = StreamCursor::default();
    }

    fn write_up_to(&mut self, out: &dyn PcmWriter, want: usize) -> usize {
        if want == 0 {
            return 0;
        }
        let start = self.cursor.offset;
        let chunk = &self.clip.samples()[start..start + want];
        let written = out.write(chunk).min(want);
        self.cursor.offset += written;
        self.cursor.remaining -= written;
        written
    }
}
