//! Null transfer backend
//!
//! Inert sink for tests and headless runs: never touches a device and
//! delivers completions only when pumped explicitly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use spdif_core::StreamError;

use crate::buffer::{BUFFER_BYTES, HALF_BYTES};
use crate::transfer::{CompletionHandler, CyclicTransfer};

/// Manually pumped cyclic transfer.
///
/// Clones share the same state, so a caller can keep one clone to pump
/// while the controller owns the other.
#[derive(Clone)]
pub struct NullTransfer {
    inner: Arc<Inner>,
}

struct Inner {
    handler: Mutex<Option<CompletionHandler>>,
    active: AtomicBool,
    completions: AtomicUsize,
}

impl NullTransfer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: Mutex::new(None),
                active: AtomicBool::new(false),
                completions: AtomicUsize::new(0),
            }),
        }
    }

    /// Deliver one half-consumed completion, alternating halves the way a
    /// real cyclic transfer drains them (half 0 first).
    ///
    /// Returns false if no transfer is submitted.
    pub fn pump(&self) -> bool {
        if !self.inner.active.load(Ordering::Acquire) {
            return false;
        }
        let handler = self.inner.handler.lock().clone();
        let Some(handler) = handler else {
            return false;
        };
        let n = self.inner.completions.fetch_add(1, Ordering::Relaxed);
        // After draining half 0 the residue is one half; after half 1 a
        // fresh cycle's full buffer remains.
        let residue = if n % 2 == 0 { HALF_BYTES } else { BUFFER_BYTES };
        handler(residue);
        true
    }
}

impl Default for NullTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl CyclicTransfer for NullTransfer {
    fn submit(&mut self, handler: CompletionHandler) -> Result<(), StreamError> {
        *self.inner.handler.lock() = Some(handler);
        self.inner.completions.store(0, Ordering::Relaxed);
        self.inner.active.store(true, Ordering::Release);
        tracing::debug!("null transfer submitted");
        Ok(())
    }

    fn terminate(&mut self) {
        self.inner.active.store(false, Ordering::Release);
        *self.inner.handler.lock() = None;
    }

    fn active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_pump_requires_submit() {
        let transfer = NullTransfer::new();
        assert!(!transfer.pump());
        assert!(!transfer.active());
    }

    #[test]
    fn test_pump_alternates_residues() {
        let mut transfer = NullTransfer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        transfer
            .submit(Arc::new(move |residue| sink.lock().push(residue)))
            .unwrap();

        for _ in 0..4 {
            assert!(transfer.pump());
        }
        assert_eq!(
            *seen.lock(),
            vec![HALF_BYTES, BUFFER_BYTES, HALF_BYTES, BUFFER_BYTES]
        );
    }

    #[test]
    fn test_terminate_stops_completions() {
        let mut transfer = NullTransfer::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        transfer
            .submit(Arc::new(move |_| {
                sink.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();

        transfer.pump();
        transfer.terminate();
        assert!(!transfer.pump());
        assert_eq!(count.load(Ordering::Relaxed), 1);

        // Resubmitting starts a fresh cycle at half 0.
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        transfer
            .submit(Arc::new(move |residue| sink.lock().push(residue)))
            .unwrap();
        transfer.pump();
        assert_eq!(*seen.lock(), vec![HALF_BYTES]);
    }
}
