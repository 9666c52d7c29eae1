//! Cyclic output buffer
//!
//! Fixed-size byte buffer holding the encoded bitstream, logically split
//! into two halves. The controller writes the half the transfer backend is
//! not draining; the backend reads it back out. One full buffer cycle spans
//! exactly one 192-frame channel-status block.

use parking_lot::{Mutex, MutexGuard};
use spdif_codec::{BLOCK_FRAMES, FRAME_BYTES};

/// Stereo frames per buffer half (one refill's worth).
pub const HALF_FRAMES: usize = BLOCK_FRAMES / 2;

/// Total stereo frames in the buffer (2 x 192 encoded subframes).
pub const BUFFER_FRAMES: usize = 2 * HALF_FRAMES;

/// Bytes per buffer half.
pub const HALF_BYTES: usize = HALF_FRAMES * FRAME_BYTES;

/// Total buffer size in bytes.
pub const BUFFER_BYTES: usize = BUFFER_FRAMES * FRAME_BYTES;

/// Shared cyclic output buffer.
///
/// Allocated once per stream and rewritten continuously. The mutex is held
/// only for one half-buffer write or one backend callback read; nothing
/// blocks while holding it.
pub struct OutputBuffer {
    bytes: Mutex<Box<[u8; BUFFER_BYTES]>>,
}

impl OutputBuffer {
    /// Create a zero-filled buffer.
    pub fn new() -> Self {
        Self {
            bytes: Mutex::new(Box::new([0; BUFFER_BYTES])),
        }
    }

    /// Lock the whole buffer for writing.
    pub fn lock(&self) -> MutexGuard<'_, Box<[u8; BUFFER_BYTES]>> {
        self.bytes.lock()
    }

    /// Copy `dst.len()` bytes starting at `pos`, wrapping at the buffer end.
    pub fn read_at(&self, pos: usize, dst: &mut [u8]) {
        let bytes = self.bytes.lock();
        for (i, out) in dst.iter_mut().enumerate() {
            *out = bytes[(pos + i) % BUFFER_BYTES];
        }
    }

    /// Snapshot the buffer contents (diagnostics and tests).
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().to_vec()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}
