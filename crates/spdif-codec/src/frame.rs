//! Stereo frame assembler
//!
//! Decodes one PCM frame in the negotiated sample format and writes the two
//! encoded subframes of an S/PDIF frame contiguously into the output slot.

use crate::status::ChannelStatusCycle;
use crate::subframe::{encode_subframe, Preamble, SAMPLE_MASK, SUBFRAME_BYTES};

/// Serialized size of one encoded stereo frame in bytes.
pub const FRAME_BYTES: usize = 2 * SUBFRAME_BYTES;

/// Largest PCM frame size over all supported formats (S24In32Le/S32Le).
pub const MAX_PCM_FRAME_BYTES: usize = 8;

/// PCM source sample format, locked for a whole session at prepare time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed little-endian.
    S16Le,
    /// 24-bit signed in a 32-bit little-endian container, top 24 bits used.
    S24In32Le,
    /// 24-bit signed packed into 3 little-endian bytes.
    S24PackedLe,
    /// 32-bit signed little-endian, low 8 bits discarded.
    S32Le,
}

impl SampleFormat {
    /// Bytes per stereo PCM frame in this format.
    pub const fn frame_bytes(self) -> usize {
        match self {
            SampleFormat::S16Le => 4,
            SampleFormat::S24In32Le => 8,
            SampleFormat::S24PackedLe => 6,
            SampleFormat::S32Le => 8,
        }
    }

    /// Nominal sample width in bits.
    pub const fn bits(self) -> u8 {
        match self {
            SampleFormat::S16Le => 16,
            SampleFormat::S24In32Le => 24,
            SampleFormat::S24PackedLe => 24,
            SampleFormat::S32Le => 32,
        }
    }

    /// Extract the left and right 24-bit payloads from one PCM frame.
    fn decode(self, src: &[u8]) -> (u32, u32) {
        match self {
            SampleFormat::S16Le => (decode_s16(&src[0..2]), decode_s16(&src[2..4])),
            SampleFormat::S24In32Le | SampleFormat::S32Le => {
                (decode_top24(&src[0..4]), decode_top24(&src[4..8]))
            }
            SampleFormat::S24PackedLe => (decode_packed24(&src[0..3]), decode_packed24(&src[3..6])),
        }
    }
}

fn decode_s16(src: &[u8]) -> u32 {
    let value = i16::from_le_bytes([src[0], src[1]]);
    ((value as i32) << 8) as u32 & SAMPLE_MASK
}

fn decode_top24(src: &[u8]) -> u32 {
    let value = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    (value as u32) >> 8
}

fn decode_packed24(src: &[u8]) -> u32 {
    u32::from(src[0]) | u32::from(src[1]) << 8 | u32::from(src[2]) << 16
}

/// Per-session frame encoder state.
///
/// Owns the sample-validity mask and the channel-status cycle; one instance
/// per streaming session, reset at stream prepare.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    format: SampleFormat,
    sample_mask: u32,
    status: ChannelStatusCycle,
}

impl FrameEncoder {
    /// Create an encoder for the given source format with a full 24-bit
    /// validity mask and an all-zero status message.
    pub fn new(format: SampleFormat) -> Self {
        Self {
            format,
            sample_mask: SAMPLE_MASK,
            status: ChannelStatusCycle::new(),
        }
    }

    /// Negotiated source format.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Force payload bits below the negotiated bit depth to zero.
    pub fn set_sample_mask(&mut self, mask: u32) {
        self.sample_mask = mask & SAMPLE_MASK;
    }

    /// Install the session's channel-status message (rewinds the cycle).
    pub fn set_channel_status(&mut self, message: &[u8]) {
        self.status.set_message(message);
    }

    /// Encode one PCM frame into `dst` (exactly [`FRAME_BYTES`] bytes).
    pub fn encode_frame(&mut self, dst: &mut [u8], pcm: &[u8]) {
        debug_assert_eq!(pcm.len(), self.format.frame_bytes());
        let (left, right) = self.format.decode(pcm);
        self.encode_payloads(dst, left, right);
    }

    /// Encode one all-zero frame, keeping preambles and the status cycle
    /// running while no audio source is active.
    pub fn encode_silence(&mut self, dst: &mut [u8]) {
        self.encode_payloads(dst, 0, 0);
    }

    fn encode_payloads(&mut self, dst: &mut [u8], left: u32, right: u32) {
        debug_assert_eq!(dst.len(), FRAME_BYTES);
        let (bit, block_start) = self.status.next_bit();
        let left_preamble = if block_start { Preamble::B } else { Preamble::M };
        encode_subframe(
            &mut dst[..SUBFRAME_BYTES],
            left & self.sample_mask,
            left_preamble,
            bit,
        );
        encode_subframe(
            &mut dst[SUBFRAME_BYTES..],
            right & self.sample_mask,
            Preamble::W,
            bit,
        );
    }
}
