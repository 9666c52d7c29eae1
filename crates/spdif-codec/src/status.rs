//! Channel-status cycle
//!
//! The out-of-band metadata channel of IEC 60958: a 24-byte message carried
//! one bit per stereo frame over a 192-frame block, plus the consumer-profile
//! field constants needed to build one.

use bitflags::bitflags;

/// Length of the channel-status message in bytes.
pub const STATUS_BYTES: usize = 24;

/// Frames per channel-status block (one status bit per frame).
pub const BLOCK_FRAMES: usize = 192;

bitflags! {
    /// Channel-status byte 0 (consumer profile).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        /// Professional format when set; spdif-out always transmits consumer.
        const PROFESSIONAL = 0x01;
        /// Non-audio (compressed) payload.
        const NON_AUDIO = 0x02;
        /// Copyright not asserted, copying permitted.
        const COPY_PERMITTED = 0x04;
        /// 50/15 us pre-emphasis applied to the audio.
        const PREEMPHASIS = 0x08;
    }
}

/// Category codes and flags for channel-status byte 1.
pub mod category {
    /// General category.
    pub const GENERAL: u8 = 0x00;
    /// Digital/digital converter.
    pub const DIGITAL_CONVERTER: u8 = 0x02;
    /// L-bit: the source is an original, not a copy.
    pub const ORIGINAL: u8 = 0x80;
}

/// Sampling-frequency code for channel-status byte 3.
///
/// Returns `None` for rates the consumer profile (and this encoder) does not
/// carry.
pub fn fs_code(rate: u32) -> Option<u8> {
    match rate {
        44_100 => Some(0x00),
        48_000 => Some(0x02),
        88_200 => Some(0x08),
        96_000 => Some(0x0a),
        176_400 => Some(0x0c),
        192_000 => Some(0x0e),
        _ => None,
    }
}

/// Word-length code for channel-status byte 4.
pub fn wordlen_code(msbits: u8) -> u8 {
    const MAX_WORDLEN_24: u8 = 0x01;
    const WORDLEN_20_16: u8 = 0x02;
    const WORDLEN_24_20: u8 = 0x0a;

    match msbits {
        16 => WORDLEN_20_16,
        20 => WORDLEN_24_20,
        24 | 32 => MAX_WORDLEN_24 | WORDLEN_24_20,
        _ => 0,
    }
}

/// Cyclic generator over a fixed 24-byte channel-status message.
#[derive(Debug, Clone)]
pub struct ChannelStatusCycle {
    bytes: [u8; STATUS_BYTES],
    cursor: usize,
}

impl ChannelStatusCycle {
    /// Create a cycle over an all-zero message.
    pub fn new() -> Self {
        Self {
            bytes: [0; STATUS_BYTES],
            cursor: 0,
        }
    }

    /// Install a new message and rewind to the block start.
    ///
    /// Messages shorter than 24 bytes are zero-padded, longer ones
    /// truncated; resetting the cursor keeps block boundaries well-defined
    /// if this happens mid-stream.
    pub fn set_message(&mut self, message: &[u8]) {
        self.bytes = [0; STATUS_BYTES];
        let len = message.len().min(STATUS_BYTES);
        self.bytes[..len].copy_from_slice(&message[..len]);
        self.cursor = 0;
    }

    /// Current message.
    pub fn message(&self) -> &[u8; STATUS_BYTES] {
        &self.bytes
    }

    /// Draw the status bit for the next frame.
    ///
    /// Returns the bit and whether this frame starts a new 192-frame block
    /// (the frame that must carry the B preamble).
    pub fn next_bit(&mut self) -> (bool, bool) {
        let block_start = self.cursor == 0;
        let bit = self.bytes[self.cursor / 8] >> (self.cursor % 8) & 1 == 1;
        self.cursor = (self.cursor + 1) % BLOCK_FRAMES;
        (bit, block_start)
    }
}

impl Default for ChannelStatusCycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_reconstructs_message() {
        let mut cycle = ChannelStatusCycle::new();
        let message: Vec<u8> = (0..STATUS_BYTES as u8).map(|b| b.wrapping_mul(37)).collect();
        cycle.set_message(&message);

        let mut rebuilt = [0u8; STATUS_BYTES];
        for frame in 0..BLOCK_FRAMES {
            let (bit, block_start) = cycle.next_bit();
            assert_eq!(block_start, frame == 0);
            if bit {
                rebuilt[frame / 8] |= 1 << (frame % 8);
            }
        }
        assert_eq!(rebuilt.as_slice(), message.as_slice());

        // The cycle wraps: frame 192 is a block start again.
        let (_, block_start) = cycle.next_bit();
        assert!(block_start);
    }

    #[test]
    fn test_short_message_zero_padded() {
        let mut cycle = ChannelStatusCycle::new();
        cycle.set_message(&[0xff, 0xff]);
        assert_eq!(cycle.message()[0], 0xff);
        assert_eq!(cycle.message()[2], 0x00);
    }

    #[test]
    fn test_set_message_resets_cursor() {
        let mut cycle = ChannelStatusCycle::new();
        cycle.set_message(&[0x01]);
        let _ = cycle.next_bit();
        cycle.set_message(&[0x01]);
        let (bit, block_start) = cycle.next_bit();
        assert!(bit);
        assert!(block_start);
    }

    #[test]
    fn test_fs_codes() {
        assert_eq!(fs_code(44_100), Some(0x00));
        assert_eq!(fs_code(48_000), Some(0x02));
        assert_eq!(fs_code(192_000), Some(0x0e));
        assert_eq!(fs_code(32_000), None);
    }

    #[test]
    fn test_wordlen_codes() {
        assert_eq!(wordlen_code(16), 0x02);
        assert_eq!(wordlen_code(20), 0x0a);
        assert_eq!(wordlen_code(24), 0x0b);
        assert_eq!(wordlen_code(32), 0x0b);
        assert_eq!(wordlen_code(18), 0x00);
    }
}
