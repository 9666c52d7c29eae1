//! Real-time S/PDIF streaming for spdif-out
//!
//! Owns the cyclic output buffer and the double-buffer refill protocol:
//! each half-consumed completion from the transfer backend refills the
//! freed half with encoded audio or silence, so the output bitstream never
//! stops while the stream exists.

pub mod backend;
pub mod buffer;
pub mod controller;
pub mod source;
pub mod transfer;

pub use buffer::{OutputBuffer, BUFFER_BYTES, BUFFER_FRAMES, HALF_BYTES, HALF_FRAMES};
pub use controller::{SpdifStream, StreamParams};
pub use source::{PcmRing, PcmSource};
pub use transfer::{CompletionHandler, CyclicTransfer};
