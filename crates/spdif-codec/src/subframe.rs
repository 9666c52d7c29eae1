//! Biphase-mark subframe encoder
//!
//! Turns one 24-bit sample payload into the 64 biphase-mark cells (8 bytes)
//! of an IEC 60958 subframe. Cells are packed in transmission order,
//! most-significant bit of each byte first.

/// Serialized size of one encoded subframe in bytes.
pub const SUBFRAME_BYTES: usize = 8;

/// Mask covering the 24-bit sample payload.
pub const SAMPLE_MASK: u32 = 0x00ff_ffff;

// Slot 28 (validity, 0 = valid PCM) and slot 29 (user data) stay zero.
const STATUS_BIT: u32 = 1 << 26;
const PARITY_BIT: u32 = 1 << 27;

/// Subframe synchronization preamble.
///
/// `B` marks the first left subframe of a 192-frame channel-status block,
/// `M` any other left subframe, `W` every right subframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    B,
    M,
    W,
}

impl Preamble {
    /// Cell pattern of the preamble, assuming the line enters low.
    ///
    /// Even parity over slots 4-31 guarantees every subframe ends at the
    /// level it started from, so these patterns never need inversion.
    pub const fn cells(self) -> u8 {
        match self {
            Preamble::B => 0b1110_1000,
            Preamble::M => 0b1110_0010,
            Preamble::W => 0b1110_0100,
        }
    }
}

/// Biphase-mark cells for one nibble (bit 0 transmitted first), entering
/// with the line low. Entries are inverted when the running level is high.
const BMC_NIBBLE: [u8; 16] = build_bmc_table();

const fn build_bmc_table() -> [u8; 16] {
    let mut table = [0u8; 16];
    let mut value = 0;
    while value < 16 {
        let mut cells = 0u8;
        let mut level = 0u8;
        let mut bit = 0;
        while bit < 4 {
            // Transition at the start of every bit, mid-bit only for a 1.
            let first = 1 - level;
            let second = if (value >> bit) & 1 == 1 { level } else { first };
            cells |= first << (7 - 2 * bit);
            cells |= second << (6 - 2 * bit);
            level = second;
            bit += 1;
        }
        table[value as usize] = cells;
        value += 1;
    }
    table
}

/// Encode one subframe into `dst` (exactly [`SUBFRAME_BYTES`] bytes).
///
/// `payload` carries the 24-bit sample in its low bits, LSB at time slot 4;
/// the validity and user bits are always 0, the parity bit keeps the set
/// bit count over slots 4-31 even.
pub fn encode_subframe(dst: &mut [u8], payload: u32, preamble: Preamble, status_bit: bool) {
    debug_assert_eq!(dst.len(), SUBFRAME_BYTES);

    let mut data = payload & SAMPLE_MASK;
    if status_bit {
        data |= STATUS_BIT;
    }
    if data.count_ones() & 1 == 1 {
        data |= PARITY_BIT;
    }

    dst[0] = preamble.cells();
    let mut level = 0u32;
    for (i, out) in dst[1..].iter_mut().enumerate() {
        let nibble = (data >> (4 * i)) & 0xf;
        let cells = BMC_NIBBLE[nibble as usize];
        *out = if level == 0 { cells } else { !cells };
        level ^= nibble.count_ones() & 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode the 56 data cells of an encoded subframe back into the
    /// 28 bits of slots 4-31, checking biphase-mark legality on the way.
    fn decode_data_bits(sub: &[u8]) -> u32 {
        let mut cells = Vec::new();
        for byte in &sub[1..] {
            for i in (0..8).rev() {
                cells.push((byte >> i) & 1);
            }
        }
        // Line enters the data section low (preambles end low).
        let mut prev = 0u8;
        let mut data = 0u32;
        for (bit, pair) in cells.chunks(2).enumerate() {
            assert_ne!(pair[0], prev, "missing start-of-bit transition");
            if pair[1] != pair[0] {
                data |= 1 << bit;
            }
            prev = pair[1];
        }
        assert_eq!(prev, 0, "subframe must end at its entry level");
        data
    }

    #[test]
    fn test_zero_payload_cells() {
        let mut sub = [0u8; SUBFRAME_BYTES];
        encode_subframe(&mut sub, 0, Preamble::B, false);
        // All-zero data encodes as alternating double cells.
        assert_eq!(sub, [0xe8, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc]);

        encode_subframe(&mut sub, 0, Preamble::M, false);
        assert_eq!(sub[0], 0xe2);
        encode_subframe(&mut sub, 0, Preamble::W, false);
        assert_eq!(sub[0], 0xe4);
    }

    #[test]
    fn test_lsb_payload_cells() {
        // Payload 1 sets slot 4 and forces the parity bit.
        let mut sub = [0u8; SUBFRAME_BYTES];
        encode_subframe(&mut sub, 1, Preamble::M, false);
        assert_eq!(sub, [0xe2, 0xb3, 0x33, 0x33, 0x33, 0x33, 0x33, 0x32]);
    }

    #[test]
    fn test_parity_is_even() {
        let samples = [
            0u32, 1, 0x800000, 0xffffff, 0x555555, 0xaaaaaa, 0x123456, 0x7fffff,
        ];
        for &payload in &samples {
            for status in [false, true] {
                let mut sub = [0u8; SUBFRAME_BYTES];
                encode_subframe(&mut sub, payload, Preamble::M, status);
                let data = decode_data_bits(&sub);
                assert_eq!(data.count_ones() & 1, 0, "payload {payload:#x}");
            }
        }
    }

    #[test]
    fn test_round_trip_payload_and_status() {
        for &payload in &[0x000001u32, 0xabcdef, 0x800001, 0xfffffe] {
            let mut sub = [0u8; SUBFRAME_BYTES];
            encode_subframe(&mut sub, payload, Preamble::W, true);
            let data = decode_data_bits(&sub);
            assert_eq!(data & SAMPLE_MASK, payload);
            assert_eq!(data & (1 << 24), 0, "validity stays 0 for PCM");
            assert_eq!(data & (1 << 25), 0, "user bit stays 0");
            assert_ne!(data & (1 << 26), 0, "status bit set");
        }
    }

    #[test]
    fn test_payload_truncated_to_24_bits() {
        let mut a = [0u8; SUBFRAME_BYTES];
        let mut b = [0u8; SUBFRAME_BYTES];
        encode_subframe(&mut a, 0xff123456, Preamble::M, false);
        encode_subframe(&mut b, 0x00123456, Preamble::M, false);
        assert_eq!(a, b);
    }
}
