//! Cyclic transfer collaborator
//!
//! Abstraction over the hardware (or software) sink that drains the output
//! buffer and reports half-consumed completions back to the controller.

use std::sync::Arc;

use spdif_core::StreamError;

/// Completion callback, invoked once per drained buffer half with the
/// residual byte count of the current cycle. Runs on the backend's thread.
pub type CompletionHandler = Arc<dyn Fn(usize) + Send + Sync>;

/// A cyclic transfer over the shared output buffer.
///
/// Completions are inherently serialized: with only two halves, one must be
/// handled before the next can occur. A failed submit is reported once to
/// the caller; retrying is the caller's decision.
pub trait CyclicTransfer {
    /// Begin the cyclic transfer, delivering completions to `handler`.
    fn submit(&mut self, handler: CompletionHandler) -> Result<(), StreamError>;

    /// Stop the transfer; completions cease promptly. A completion already
    /// in flight is allowed to finish.
    fn terminate(&mut self);

    /// Whether a transfer is currently submitted.
    fn active(&self) -> bool;
}
