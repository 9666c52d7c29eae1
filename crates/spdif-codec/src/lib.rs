//! IEC 60958 (S/PDIF) encoding for spdif-out
//!
//! This crate holds the pure, bit-exact parts of the pipeline: the
//! biphase-mark subframe encoder, the 192-frame channel-status cycle and
//! the stereo frame assembler with its sample-format decoders.

pub mod frame;
pub mod status;
pub mod subframe;

pub use frame::{FrameEncoder, SampleFormat, FRAME_BYTES, MAX_PCM_FRAME_BYTES};
pub use status::{ChannelStatusCycle, StatusFlags, BLOCK_FRAMES, STATUS_BYTES};
pub use subframe::{encode_subframe, Preamble, SAMPLE_MASK, SUBFRAME_BYTES};
