//! Streaming buffer controller
//!
//! Drives the frame encoder from the transfer backend's half-consumed
//! completions: refills the freed half with live PCM or silence, keeps the
//! ring-position and period bookkeeping, and never lets the output
//! bitstream stop while a transfer is submitted.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use spdif_codec::status::{self, StatusFlags};
use spdif_codec::{FrameEncoder, SampleFormat, FRAME_BYTES, MAX_PCM_FRAME_BYTES, STATUS_BYTES};
use spdif_core::StreamError;

use crate::buffer::{OutputBuffer, HALF_BYTES, HALF_FRAMES};
use crate::source::PcmSource;
use crate::transfer::{CompletionHandler, CyclicTransfer};

/// Session parameters, fixed from prepare until the next prepare.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub format: SampleFormat,
    pub rate: u32,
    /// Valid most-significant bits per sample; 0 uses the format width.
    pub msbits: u8,
    pub copy_permitted: bool,
    pub preemphasis: bool,
}

impl StreamParams {
    /// Negotiated bit depth.
    pub fn effective_msbits(&self) -> u8 {
        if self.msbits == 0 {
            self.format.bits()
        } else {
            self.msbits
        }
    }

    /// Validity mask for the 24-bit payload: bits below the negotiated
    /// depth are forced to zero.
    pub fn sample_mask(&self) -> u32 {
        let msbits = self.effective_msbits();
        if msbits < 24 {
            (spdif_codec::SAMPLE_MASK << (24 - msbits)) & spdif_codec::SAMPLE_MASK
        } else {
            spdif_codec::SAMPLE_MASK
        }
    }

    /// Build the consumer-profile channel-status message for this session.
    pub fn channel_status(&self) -> Result<[u8; STATUS_BYTES], StreamError> {
        let msbits = self.effective_msbits();
        if !(8..=32).contains(&msbits) {
            return Err(StreamError::UnsupportedWordLength(msbits));
        }
        let fs = status::fs_code(self.rate).ok_or(StreamError::UnsupportedRate(self.rate))?;

        let mut flags = StatusFlags::empty();
        if self.copy_permitted {
            flags |= StatusFlags::COPY_PERMITTED;
        }
        if self.preemphasis {
            flags |= StatusFlags::PREEMPHASIS;
        }

        let mut message = [0u8; STATUS_BYTES];
        message[0] = flags.bits();
        message[1] = status::category::DIGITAL_CONVERTER | status::category::ORIGINAL;
        message[3] = fs;
        message[4] = status::wordlen_code(msbits);
        Ok(message)
    }
}

/// State touched only from the serialized completion context, plus the
/// control-path writes that happen while no refill can be in flight.
struct RefillState {
    encoder: Option<FrameEncoder>,
    source: Option<Box<dyn PcmSource>>,
    period_acc: usize,
}

struct Shared {
    refill: Mutex<RefillState>,
    /// 0: streaming live audio; 1: silence requested, not yet confirmed;
    /// >1: N-1 half-buffers of confirmed silence emitted. Accessed with
    /// swap/compare-exchange only, from both contexts.
    silence: AtomicU32,
    /// Frame cursor into the PCM ring; written only from the completion
    /// context (and reset at start), read by the pointer query.
    ring_pos: AtomicUsize,
}

/// One S/PDIF output stream over a cyclic transfer.
pub struct SpdifStream {
    shared: Arc<Shared>,
    buffer: Arc<OutputBuffer>,
    transfer: Box<dyn CyclicTransfer>,
    handler: CompletionHandler,
}

impl SpdifStream {
    /// Create a stream over `buffer`; the transfer backend must drain the
    /// same buffer.
    pub fn new(buffer: Arc<OutputBuffer>, transfer: Box<dyn CyclicTransfer>) -> Self {
        let shared = Arc::new(Shared {
            refill: Mutex::new(RefillState {
                encoder: None,
                source: None,
                period_acc: 0,
            }),
            silence: AtomicU32::new(0),
            ring_pos: AtomicUsize::new(0),
        });
        let handler: CompletionHandler = {
            let shared = Arc::clone(&shared);
            let buffer = Arc::clone(&buffer);
            Arc::new(move |residue| refill(&shared, &buffer, residue))
        };
        Self {
            shared,
            buffer,
            transfer,
            handler,
        }
    }

    /// Attach the PCM source for the next session.
    pub fn attach(&self, source: Box<dyn PcmSource>) {
        self.shared.refill.lock().source = Some(source);
    }

    /// Detach the PCM source; refills keep transmitting silence.
    pub fn detach(&self) {
        self.shared.refill.lock().source = None;
    }

    /// Negotiate a session: validate rate and bit depth, install the
    /// channel status and validity mask, arm the silence counter and make
    /// sure the transfer is running over a silence-primed buffer.
    pub fn prepare(&mut self, params: &StreamParams) -> Result<(), StreamError> {
        let message = params.channel_status()?;
        let msbits = params.effective_msbits();

        {
            let mut state = self.shared.refill.lock();
            let mut encoder = FrameEncoder::new(params.format);
            encoder.set_sample_mask(params.sample_mask());
            encoder.set_channel_status(&message);
            state.encoder = Some(encoder);
        }

        match self
            .shared
            .silence
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => tracing::info!(
                "prepare: {}-bit {} Hz {:?}",
                msbits,
                params.rate,
                params.format
            ),
            Err(count) => tracing::debug!("prepare: silence count {}", count),
        }

        self.submit_if_needed()
    }

    /// Start streaming live audio.
    pub fn trigger_start(&mut self) -> Result<(), StreamError> {
        {
            let mut state = self.shared.refill.lock();
            if state.encoder.is_none() {
                return Err(StreamError::NotPrepared);
            }
            state.period_acc = 0;
        }
        self.shared.ring_pos.store(0, Ordering::Relaxed);

        let silenced = self.shared.silence.swap(0, Ordering::AcqRel);
        if silenced > 1 {
            tracing::info!(
                "start: {} frames silenced",
                (silenced as usize + 1) * HALF_FRAMES
            );
        } else {
            tracing::info!("start");
        }

        self.submit_if_needed()
    }

    /// Stop the transfer; no refills occur until the next start.
    pub fn trigger_stop(&mut self) {
        tracing::info!("stop");
        self.transfer.terminate();
    }

    /// Current read position in the PCM ring, in frames.
    pub fn position(&self) -> usize {
        self.shared.ring_pos.load(Ordering::Relaxed)
    }

    /// Current silence-counter value (diagnostics).
    pub fn silence_count(&self) -> u32 {
        self.shared.silence.load(Ordering::Acquire)
    }

    /// Submit the cyclic transfer if it is not already running, priming the
    /// whole buffer with encoded silence so no stale frames are ever sent.
    fn submit_if_needed(&mut self) -> Result<(), StreamError> {
        if self.transfer.active() {
            return Ok(());
        }

        {
            let mut state = self.shared.refill.lock();
            let encoder = state.encoder.as_mut().ok_or(StreamError::NotPrepared)?;
            let mut bytes = self.buffer.lock();
            for slot in bytes.chunks_exact_mut(FRAME_BYTES) {
                encoder.encode_silence(slot);
            }
        }

        self.transfer.submit(Arc::clone(&self.handler))
    }
}

/// Wrapping increment unless the counter is zero. Returns whether the
/// counter was non-zero (silence regime in force).
fn silence_inc_not_zero(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            if v == 0 {
                None
            } else {
                Some(v.wrapping_add(1))
            }
        })
        .is_ok()
}

/// Refill one half of the output buffer. Runs in the completion context;
/// everything here must stay quick and non-blocking.
fn refill(shared: &Shared, buffer: &OutputBuffer, residue: usize) {
    let mut state = shared.refill.lock();
    let RefillState {
        encoder,
        source,
        period_acc,
    } = &mut *state;
    let Some(encoder) = encoder.as_mut() else {
        return;
    };

    // The half not being drained: low residue means the drain just moved
    // into the upper half, freeing the lower one.
    let half = usize::from(residue > HALF_BYTES);
    tracing::trace!("refill half {} (residue {})", half, residue);

    let mut bytes = buffer.lock();
    let dst = &mut bytes[half * HALF_BYTES..(half + 1) * HALF_BYTES];

    if silence_inc_not_zero(&shared.silence) {
        for slot in dst.chunks_exact_mut(FRAME_BYTES) {
            encoder.encode_silence(slot);
        }
        return;
    }

    let Some(source) = source.as_ref() else {
        // No session, but the receiver must keep its lock on the bitstream.
        for slot in dst.chunks_exact_mut(FRAME_BYTES) {
            encoder.encode_silence(slot);
        }
        return;
    };

    let ring_frames = source.ring_frames();
    let frame_bytes = encoder.format().frame_bytes();
    let mut pos = shared.ring_pos.load(Ordering::Relaxed);
    let mut pcm = [0u8; MAX_PCM_FRAME_BYTES];
    for slot in dst.chunks_exact_mut(FRAME_BYTES) {
        source.read_frame(pos, &mut pcm[..frame_bytes]);
        encoder.encode_frame(slot, &pcm[..frame_bytes]);
        pos += 1;
        if pos == ring_frames {
            pos = 0;
        }
    }
    drop(bytes);
    shared.ring_pos.store(pos, Ordering::Relaxed);

    *period_acc += HALF_FRAMES;
    let period_frames = source.period_frames();
    while *period_acc >= period_frames {
        *period_acc -= period_frames;
        source.period_elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullTransfer;
    use crate::buffer::{BUFFER_BYTES, BUFFER_FRAMES};
    use crate::source::PcmRing;

    fn params() -> StreamParams {
        StreamParams {
            format: SampleFormat::S16Le,
            rate: 48_000,
            msbits: 0,
            copy_permitted: true,
            preemphasis: false,
        }
    }

    /// Fill a ring with a recognizable ramp of 16-bit frames.
    fn ramp_ring(ring_frames: usize, period_frames: usize) -> PcmRing {
        let ring = PcmRing::new(4, ring_frames, period_frames);
        let mut data = Vec::with_capacity(ring_frames * 4);
        for n in 0..ring_frames {
            let left = (n as i16).to_le_bytes();
            let right = (!(n as i16)).to_le_bytes();
            data.extend_from_slice(&left);
            data.extend_from_slice(&right);
        }
        ring.write_frames(0, &data);
        ring
    }

    /// Encode the reference bitstream for the first `frames` live frames
    /// after a silence-primed buffer cycle.
    fn reference_after_prefill(ring: &PcmRing, frames: usize) -> Vec<u8> {
        let p = params();
        let mut encoder = FrameEncoder::new(p.format);
        encoder.set_sample_mask(p.sample_mask());
        encoder.set_channel_status(&p.channel_status().unwrap());
        let mut scratch = [0u8; FRAME_BYTES];
        for _ in 0..BUFFER_FRAMES {
            encoder.encode_silence(&mut scratch);
        }
        let mut out = vec![0u8; frames * FRAME_BYTES];
        let mut pcm = [0u8; 4];
        for (n, slot) in out.chunks_exact_mut(FRAME_BYTES).enumerate() {
            ring.read_frame(n, &mut pcm);
            encoder.encode_frame(slot, &pcm);
        }
        out
    }

    fn silence_block() -> Vec<u8> {
        let p = params();
        let mut encoder = FrameEncoder::new(p.format);
        encoder.set_sample_mask(p.sample_mask());
        encoder.set_channel_status(&p.channel_status().unwrap());
        let mut out = vec![0u8; BUFFER_BYTES];
        for slot in out.chunks_exact_mut(FRAME_BYTES) {
            encoder.encode_silence(slot);
        }
        out
    }

    fn start_stream(ring: &PcmRing) -> (SpdifStream, NullTransfer) {
        let buffer = Arc::new(OutputBuffer::new());
        let transfer = NullTransfer::new();
        let pump = transfer.clone();
        let mut stream = SpdifStream::new(buffer, Box::new(transfer));
        stream.attach(Box::new(ring.clone()));
        stream.prepare(&params()).unwrap();
        stream.trigger_start().unwrap();
        (stream, pump)
    }

    #[test]
    fn test_channel_status_fields() {
        let message = params().channel_status().unwrap();
        assert_eq!(message[0], 0x04, "copy permitted, no pre-emphasis");
        assert_eq!(message[1], 0x82, "digital converter, original");
        assert_eq!(message[3], 0x02, "48 kHz");
        assert_eq!(message[4], 0x02, "16-bit word length");
        assert!(message[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unsupported_rate_rejected() {
        let mut p = params();
        p.rate = 22_050;
        assert!(matches!(
            p.channel_status(),
            Err(StreamError::UnsupportedRate(22_050))
        ));
    }

    #[test]
    fn test_sample_mask_from_msbits() {
        let mut p = params();
        assert_eq!(p.sample_mask(), 0xffff00);
        p.format = SampleFormat::S24PackedLe;
        assert_eq!(p.sample_mask(), 0xffffff);
        p.msbits = 20;
        assert_eq!(p.sample_mask(), 0xfffff0);
    }

    #[test]
    fn test_trigger_start_requires_prepare() {
        let buffer = Arc::new(OutputBuffer::new());
        let mut stream = SpdifStream::new(buffer, Box::new(NullTransfer::new()));
        assert!(matches!(
            stream.trigger_start(),
            Err(StreamError::NotPrepared)
        ));
    }

    #[test]
    fn test_ring_and_period_accounting() {
        // The end-to-end scenario: 48 kHz S16, ring 1536, period 192.
        let ring = ramp_ring(1536, 192);
        let (stream, pump) = start_stream(&ring);

        for _ in 0..16 {
            assert!(pump.pump());
        }
        assert_eq!(stream.position(), 0, "1536 frames wrap the ring exactly");
        assert_eq!(ring.periods_elapsed(), 8);
        assert_eq!(stream.silence_count(), 0);
    }

    #[test]
    fn test_period_notifications_match_floor() {
        // Period smaller than one half-buffer: 3 refills consume 288
        // frames and must fire floor(288 / 64) = 4 notifications.
        let ring = ramp_ring(1536, 64);
        let (_stream, pump) = start_stream(&ring);

        for _ in 0..3 {
            pump.pump();
        }
        assert_eq!(ring.periods_elapsed(), 4);
    }

    #[test]
    fn test_refill_writes_correct_half() {
        let ring = ramp_ring(1536, 192);
        let (stream, pump) = start_stream(&ring);

        // First completion frees half 0; half 1 keeps its silence priming.
        pump.pump();
        let snapshot = stream.buffer.snapshot();
        let expected = reference_after_prefill(&ring, HALF_FRAMES);
        assert_eq!(&snapshot[..HALF_BYTES], expected.as_slice());
        assert_eq!(&snapshot[HALF_BYTES..], &silence_block()[HALF_BYTES..]);
    }

    #[test]
    fn test_silence_counting_before_start() {
        let ring = ramp_ring(1536, 192);
        let buffer = Arc::new(OutputBuffer::new());
        let transfer = NullTransfer::new();
        let pump = transfer.clone();
        let mut stream = SpdifStream::new(buffer, Box::new(transfer));
        stream.attach(Box::new(ring.clone()));
        stream.prepare(&params()).unwrap();
        assert_eq!(stream.silence_count(), 1);

        for _ in 0..3 {
            pump.pump();
        }
        assert_eq!(stream.silence_count(), 4);
        assert_eq!(ring.periods_elapsed(), 0, "silent halves consume no PCM");

        stream.trigger_start().unwrap();
        assert_eq!(stream.silence_count(), 0);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_background_silence_without_source() {
        let buffer = Arc::new(OutputBuffer::new());
        let transfer = NullTransfer::new();
        let pump = transfer.clone();
        let mut stream = SpdifStream::new(buffer, Box::new(transfer));
        stream.prepare(&params()).unwrap();
        stream.trigger_start().unwrap();

        // No source attached and the counter is 0: refills must still
        // produce valid silence and leave the counter alone.
        pump.pump();
        pump.pump();
        assert_eq!(stream.silence_count(), 0);
        assert_eq!(stream.buffer.snapshot(), silence_block());
    }

    #[test]
    fn test_stop_then_start_reprimes_buffer() {
        let ring = ramp_ring(1536, 192);
        let (mut stream, pump) = start_stream(&ring);
        pump.pump();
        pump.pump();
        assert_ne!(stream.buffer.snapshot(), silence_block());

        stream.trigger_stop();
        assert!(!pump.pump(), "no completions after stop");

        stream.trigger_start().unwrap();
        assert_eq!(stream.silence_count(), 0);
        assert_eq!(stream.position(), 0);
        assert_eq!(
            stream.buffer.snapshot(),
            silence_block(),
            "no stale audio may survive a restart"
        );
    }
}
