//! cpal transfer backend
//!
//! Plays the biphase-mark byte stream through an ordinary output device
//! opened at four times the audio rate, stereo 16-bit: one device frame
//! carries 32 biphase cells, so 128 cells per audio frame come out at the
//! S/PDIF line rate. The device takes the role of the cyclic DMA engine,
//! reporting one completion per drained buffer half.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use spdif_core::StreamError;

use crate::buffer::{OutputBuffer, BUFFER_BYTES, HALF_BYTES};
use crate::transfer::{CompletionHandler, CyclicTransfer};

/// Cyclic transfer over a cpal output stream.
pub struct CpalTransfer {
    buffer: Arc<OutputBuffer>,
    rate: u32,
    stream: Option<Stream>,
}

impl CpalTransfer {
    /// Create a transfer draining `buffer`; `rate` is the audio sample
    /// rate, not the device rate.
    pub fn new(rate: u32, buffer: Arc<OutputBuffer>) -> Self {
        Self {
            buffer,
            rate,
            stream: None,
        }
    }
}

impl CyclicTransfer for CpalTransfer {
    fn submit(&mut self, handler: CompletionHandler) -> Result<(), StreamError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| StreamError::Backend("no output device available".into()))?;

        tracing::info!(
            "output device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = StreamConfig {
            channels: 2,
            sample_rate: SampleRate(self.rate * 4),
            buffer_size: BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let mut consumed: u64 = 0;
        let mut scratch = Vec::new();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let pos = (consumed % BUFFER_BYTES as u64) as usize;
                    fill_samples(&buffer, pos, data, &mut scratch);
                    // Fire one completion per half boundary crossed, with
                    // the buffer lock released so the refill can take it.
                    let before = consumed / HALF_BYTES as u64;
                    consumed += (data.len() * 2) as u64;
                    let after = consumed / HALF_BYTES as u64;
                    for k in before + 1..=after {
                        let drained_to = (k as usize * HALF_BYTES) % BUFFER_BYTES;
                        let residue = if drained_to == 0 {
                            BUFFER_BYTES
                        } else {
                            BUFFER_BYTES - drained_to
                        };
                        handler(residue);
                    }
                },
                |err| {
                    tracing::error!("output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| StreamError::SubmitFailed(format!("build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| StreamError::SubmitFailed(format!("play stream: {e}")))?;

        self.stream = Some(stream);
        tracing::info!("cyclic transfer started at {} Hz device rate", self.rate * 4);
        Ok(())
    }

    fn terminate(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!("failed to pause stream: {}", e);
            }
            tracing::info!("cyclic transfer terminated");
        }
    }

    fn active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalTransfer {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Read the bitstream at `pos` (wrapping) into an interleaved i16 callback
/// buffer. `scratch` is reused across callbacks to keep allocation out of
/// the audio thread's steady state.
fn fill_samples(buffer: &OutputBuffer, pos: usize, data: &mut [i16], scratch: &mut Vec<u8>) {
    scratch.resize(data.len() * 2, 0);
    buffer.read_at(pos, scratch);
    for (sample, pair) in data.iter_mut().zip(scratch.chunks_exact(2)) {
        *sample = i16::from_le_bytes([pair[0], pair[1]]);
    }
}
