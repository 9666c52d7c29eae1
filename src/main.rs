//! spdif-out - software S/PDIF encoder
//!
//! Demo entry point: encodes a sine tone into an IEC 60958 consumer
//! bitstream and streams it through the configured transfer backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use spdif_codec::SampleFormat;
use spdif_core::config::{Backend, Config, SampleFormatConfig};
use spdif_stream::backend::{CpalTransfer, NullTransfer};
use spdif_stream::{CyclicTransfer, OutputBuffer, PcmRing, SpdifStream, StreamParams, HALF_FRAMES};

/// Sine generator producing 24-bit signed samples.
struct ToneGen {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl ToneGen {
    fn new(frequency_hz: f32, rate: u32, amplitude: f32) -> Self {
        Self {
            phase: 0.0,
            step: frequency_hz / rate as f32,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }

    fn next_sample(&mut self) -> i32 {
        let v = (self.phase * std::f32::consts::TAU).sin() * self.amplitude;
        self.phase += self.step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        (v * 8_388_607.0) as i32
    }
}

/// Append one stereo frame (same sample on both channels) in the session's
/// memory layout.
fn pack_frame(format: SampleFormat, sample: i32, out: &mut Vec<u8>) {
    for _ in 0..2 {
        match format {
            SampleFormat::S16Le => out.extend_from_slice(&((sample >> 8) as i16).to_le_bytes()),
            SampleFormat::S24In32Le | SampleFormat::S32Le => {
                out.extend_from_slice(&(sample << 8).to_le_bytes())
            }
            SampleFormat::S24PackedLe => {
                out.extend_from_slice(&[sample as u8, (sample >> 8) as u8, (sample >> 16) as u8])
            }
        }
    }
}

fn sample_format(config: SampleFormatConfig) -> SampleFormat {
    match config {
        SampleFormatConfig::S16Le => SampleFormat::S16Le,
        SampleFormatConfig::S24In32Le => SampleFormat::S24In32Le,
        SampleFormatConfig::S24PackedLe => SampleFormat::S24PackedLe,
        SampleFormatConfig::S32Le => SampleFormat::S32Le,
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting spdif-out");

    let config = Config::load().context("load configuration")?;
    let session = &config.session;
    let format = sample_format(session.format);

    let (tx, rx) = crossbeam::channel::unbounded();
    let ring = PcmRing::with_notify(
        format.frame_bytes(),
        session.ring_frames,
        session.period_frames,
        tx,
    );

    // Prefill the whole ring before the stream starts consuming it.
    let mut tone = ToneGen::new(config.tone.frequency_hz, session.rate, config.tone.amplitude);
    let mut chunk = Vec::with_capacity(session.ring_frames * format.frame_bytes());
    for _ in 0..session.ring_frames {
        pack_frame(format, tone.next_sample(), &mut chunk);
    }
    ring.write_frames(0, &chunk);

    let buffer = Arc::new(OutputBuffer::new());
    let mut pump = None;
    let transfer: Box<dyn CyclicTransfer> = match config.output.backend {
        Backend::Auto => Box::new(CpalTransfer::new(session.rate, Arc::clone(&buffer))),
        Backend::Null => {
            let null = NullTransfer::new();
            pump = Some(null.clone());
            Box::new(null)
        }
    };

    let mut stream = SpdifStream::new(buffer, transfer);
    stream.attach(Box::new(ring.clone()));
    stream.prepare(&StreamParams {
        format,
        rate: session.rate,
        msbits: session.msbits,
        copy_permitted: session.copy_permitted,
        preemphasis: session.preemphasis,
    })?;
    stream.trigger_start()?;

    // The null backend has no clock of its own; pace it at wall time, one
    // completion per half-buffer of audio.
    let pacer = pump.map(|pump| {
        let interval = Duration::from_secs_f64(HALF_FRAMES as f64 / session.rate as f64);
        std::thread::spawn(move || {
            while pump.pump() {
                std::thread::sleep(interval);
            }
        })
    });

    tracing::info!(
        "streaming {:.1} Hz tone for {} s ({:?} @ {} Hz)",
        config.tone.frequency_hz,
        config.tone.duration_secs,
        format,
        session.rate
    );

    // Refill the ring one period per consumed period until the tone ends.
    let total_frames = session.rate as u64 * config.tone.duration_secs as u64;
    let mut written: u64 = session.ring_frames as u64;
    while written < total_frames {
        rx.recv_timeout(Duration::from_secs(2))
            .context("period notification timed out")?;
        chunk.clear();
        for _ in 0..session.period_frames {
            pack_frame(format, tone.next_sample(), &mut chunk);
        }
        ring.write_frames(written as usize % session.ring_frames, &chunk);
        written += session.period_frames as u64;
    }

    stream.trigger_stop();
    if let Some(pacer) = pacer {
        let _ = pacer.join();
    }
    tracing::info!("done ({} frames)", written);
    Ok(())
}
