//! Creative Voice File (VOC) decoding.
//!
//! Only the first data block is consumed, and only when it is a type 1
//! (sound data) block:
//! - the header is skipped using the little-endian header-length field at offset 20
//! - the block size is the 3 bytes following the block type
//! - the payload is preceded by a frequency divisor and a codec id
//!
//! Any other leading block means "nothing to play" and is not an error.

use anyhow::{Result, anyhow};

/// Signature found at the start of well-formed VOC files.
pub const VOC_SIGNATURE: &[u8; 20] = b"Creative Voice File\x1a";

const HEADER_LEN_OFFSET: usize = 20;
const VERSION_OFFSET: usize = 22;
const CHECKSUM_OFFSET: usize = 24;

/// Block header: 1 byte type + 3 bytes size.
const BLOCK_HEADER_LEN: usize = 4;
/// Frequency divisor + codec id preceding the sound data payload.
const SOUND_META_LEN: usize = 2;

/// VOC block kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    Terminator,
    SoundData,
    SoundContinuation,
    Silence,
    Marker,
    Text,
    RepeatStart,
    RepeatEnd,
    ExtraInfo,
    SoundDataNew,
    Unknown(u8),
}

impl From<u8> for BlockType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Terminator,
            0x01 => Self::SoundData,
            0x02 => Self::SoundContinuation,
            0x03 => Self::Silence,
            0x04 => Self::Marker,
            0x05 => Self::Text,
            0x06 => Self::RepeatStart,
            0x07 => Self::RepeatEnd,
            0x08 => Self::ExtraInfo,
            0x09 => Self::SoundDataNew,
            other => Self::Unknown(other),
        }
    }
}

/// Codec id carried by a sound data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VocCodec {
    /// 8-bit unsigned PCM (id 0), the only codec the engine plays.
    PcmU8,
    Other(u8),
}

impl VocCodec {
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => Self::PcmU8,
            other => Self::Other(other),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::PcmU8 => 0,
            Self::Other(id) => id,
        }
    }
}

/// A decoded sound block borrowing its payload from the input bytes.
#[derive(Clone, Copy, Debug)]
pub struct VocSound<'a> {
    /// Sample rate derived from the frequency divisor.
    pub sample_rate: u32,
    /// Raw frequency divisor byte.
    pub divisor: u8,
    pub codec: VocCodec,
    /// PCM payload (declared block size minus the two metadata bytes).
    pub pcm: &'a [u8],
}

/// Informational VOC header fields.
///
/// Playback never requires a valid signature; this is for display only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VocHeader {
    pub signature_ok: bool,
    pub header_len: u16,
    /// `(major, minor)` when the header is long enough to carry it.
    pub version: Option<(u8, u8)>,
    /// Whether the checksum equals `!version + 0x1234`.
    pub checksum_ok: Option<bool>,
}

impl VocHeader {
    /// Parse the header fields of `raw`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let header_len = read_le_u16(raw, HEADER_LEN_OFFSET)
            .ok_or_else(|| anyhow!("VOC header truncated ({} bytes)", raw.len()))?;
        let version = read_le_u16(raw, VERSION_OFFSET);
        let checksum_ok = match (version, read_le_u16(raw, CHECKSUM_OFFSET)) {
            (Some(v), Some(sum)) => Some((!v).wrapping_add(0x1234) == sum),
            _ => None,
        };
        Ok(Self {
            signature_ok: raw.starts_with(VOC_SIGNATURE),
            header_len,
            version: version.map(|v| ((v >> 8) as u8, (v & 0xff) as u8)),
            checksum_ok,
        })
    }
}

/// Sample rate in Hz for a VOC frequency divisor: `1_000_000 / (256 - d)`.
pub fn sample_rate_from_divisor(divisor: u8) -> u32 {
    1_000_000 / (256 - u32::from(divisor))
}

/// Type of the first block after the header.
pub fn first_block_type(raw: &[u8]) -> Result<BlockType> {
    let block = first_block(raw)?;
    block
        .first()
        .map(|&b| BlockType::from(b))
        .ok_or_else(|| anyhow!("VOC data ends before the first block"))
}

/// Decode the first block of `raw`.
///
/// Returns `Ok(None)` when the first block is not a sound data block. Returns an error only
/// when the input is too short for the fields it declares.
///
/// An unsupported codec id is logged as a warning and the payload is still returned.
pub fn decode(raw: &[u8]) -> Result<Option<VocSound<'_>>> {
    let block = first_block(raw)?;
    let kind = block
        .first()
        .map(|&b| BlockType::from(b))
        .ok_or_else(|| anyhow!("VOC data ends before the first block"))?;
    if kind != BlockType::SoundData {
        tracing::debug!(block = ?kind, "first VOC block is not sound data; nothing to play");
        return Ok(None);
    }

    let word = read_le_u32(block, 0).ok_or_else(|| anyhow!("VOC block header truncated"))?;
    let size = (word >> 8) as usize;
    let len = size
        .checked_sub(SOUND_META_LEN)
        .ok_or_else(|| anyhow!("VOC sound block too small (size {size})"))?;

    let meta = block
        .get(BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + SOUND_META_LEN)
        .ok_or_else(|| anyhow!("VOC sound block metadata truncated"))?;
    let divisor = meta[0];
    let codec = VocCodec::from_id(meta[1]);

    let start = BLOCK_HEADER_LEN + SOUND_META_LEN;
    let pcm = block.get(start..start + len).ok_or_else(|| {
        anyhow!(
            "VOC payload truncated: {len} bytes declared, {} available",
            block.len().saturating_sub(start)
        )
    })?;

    if codec != VocCodec::PcmU8 {
        tracing::warn!(codec = codec.id(), "unsupported VOC codec 0x{:02x}", codec.id());
    }

    Ok(Some(VocSound {
        sample_rate: sample_rate_from_divisor(divisor),
        divisor,
        codec,
        pcm,
    }))
}

fn first_block(raw: &[u8]) -> Result<&[u8]> {
    let header_len = read_le_u16(raw, HEADER_LEN_OFFSET)
        .ok_or_else(|| anyhow!("VOC header truncated ({} bytes)", raw.len()))?;
    raw.get(usize::from(header_len)..).ok_or_else(|| {
        anyhow!(
            "VOC header length {header_len} exceeds data length {}",
            raw.len()
        )
    })
}

fn read_le_u16(raw: &[u8], offset: usize) -> Option<u16> {
    let bytes = raw.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_le_u32(raw: &[u8], offset: usize) -> Option<u32> {
    let bytes = raw.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
