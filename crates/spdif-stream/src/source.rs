//! PCM source collaborator
//!
//! The audio pipeline owns the PCM ring buffer; the controller only reads
//! frames from it and reports period boundaries back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::Mutex;

/// Read-only view of an externally owned PCM ring buffer.
///
/// Implementations are notified from the completion context, so
/// `period_elapsed` must not block.
pub trait PcmSource: Send {
    /// Ring capacity in frames.
    fn ring_frames(&self) -> usize;

    /// Period size in frames.
    fn period_frames(&self) -> usize;

    /// Copy the PCM frame at `index` into `dst`.
    fn read_frame(&self, index: usize, dst: &mut [u8]);

    /// One period of frames has been consumed.
    fn period_elapsed(&self);
}

/// In-memory PCM ring buffer with period notifications.
///
/// Cheap to clone; all clones share the same ring.
#[derive(Clone)]
pub struct PcmRing {
    inner: Arc<RingInner>,
}

struct RingInner {
    frame_bytes: usize,
    ring_frames: usize,
    period_frames: usize,
    bytes: Mutex<Vec<u8>>,
    periods: AtomicUsize,
    notify: Option<Sender<()>>,
}

impl PcmRing {
    /// Create a zero-filled ring.
    pub fn new(frame_bytes: usize, ring_frames: usize, period_frames: usize) -> Self {
        Self::build(frame_bytes, ring_frames, period_frames, None)
    }

    /// Create a ring that sends one message per elapsed period.
    pub fn with_notify(
        frame_bytes: usize,
        ring_frames: usize,
        period_frames: usize,
        notify: Sender<()>,
    ) -> Self {
        Self::build(frame_bytes, ring_frames, period_frames, Some(notify))
    }

    fn build(
        frame_bytes: usize,
        ring_frames: usize,
        period_frames: usize,
        notify: Option<Sender<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(RingInner {
                frame_bytes,
                ring_frames,
                period_frames,
                bytes: Mutex::new(vec![0; frame_bytes * ring_frames]),
                periods: AtomicUsize::new(0),
                notify,
            }),
        }
    }

    /// Write consecutive frames starting at `frame_index`, wrapping at the
    /// ring capacity.
    pub fn write_frames(&self, frame_index: usize, data: &[u8]) {
        debug_assert_eq!(data.len() % self.inner.frame_bytes, 0);
        let mut bytes = self.inner.bytes.lock();
        let capacity = bytes.len();
        let start = (frame_index % self.inner.ring_frames) * self.inner.frame_bytes;
        for (i, &b) in data.iter().enumerate() {
            bytes[(start + i) % capacity] = b;
        }
    }

    /// Total periods elapsed since creation.
    pub fn periods_elapsed(&self) -> usize {
        self.inner.periods.load(Ordering::Relaxed)
    }
}

impl PcmSource for PcmRing {
    fn ring_frames(&self) -> usize {
        self.inner.ring_frames
    }

    fn period_frames(&self) -> usize {
        self.inner.period_frames
    }

    fn read_frame(&self, index: usize, dst: &mut [u8]) {
        let bytes = self.inner.bytes.lock();
        let start = (index % self.inner.ring_frames) * self.inner.frame_bytes;
        dst.copy_from_slice(&bytes[start..start + dst.len()]);
    }

    fn period_elapsed(&self) {
        self.inner.periods.fetch_add(1, Ordering::Relaxed);
        if let Some(notify) = &self.inner.notify {
            // Unbounded channel; a failed send only means the consumer left.
            let _ = notify.try_send(());
        }
    }
}
