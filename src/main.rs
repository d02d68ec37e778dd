//! Application entry point for `media-monitor`.
//!
//! Microphone loopback through the full sending path, useful for checking a
//! device before a session.
//!
//! # Sequence
//!
//! 1. Initialise logging.
//! 2. Load [`PipelineConfig`] from disk (default on first run).
//! 3. Open the default input device and start capture.
//! 4. For `monitor.duration_secs`: encode every 50 ms PCM16 chunk as an
//!    audio wire frame, decode it back and check it survived intact.
//! 5. Print a JSON summary to stdout.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;

use media_pipeline::{
    audio::{AudioCapture, PcmChunk},
    codec::{decode_audio_frame, FrameWriter},
    config::PipelineConfig,
};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize)]
struct MonitorSummary {
    device_sample_rate: u32,
    device_channels: u16,
    target_sample_rate: u32,
    chunks_received: u64,
    samples_received: u64,
    audio_seconds: f64,
    wire_bytes: u64,
    frames_round_tripped: u64,
    round_trip_failures: u64,
    payload_rejections: u64,
    last_seq: Option<u32>,
    peak_amplitude: u16,
}

impl MonitorSummary {
    fn record_chunk(&mut self, chunk: &PcmChunk) {
        self.chunks_received += 1;
        self.samples_received += chunk.len() as u64;
        let peak = chunk
            .samples()
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0);
        self.peak_amplitude = self.peak_amplitude.max(peak);
    }
}

/// Capture-time timestamp of chunk `index`, in seconds from the first sample.
fn chunk_timestamp(index: u64, chunk_samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    index as f64 * chunk_samples as f64 / f64::from(sample_rate)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("media-monitor starting up");

    // 2. Configuration
    let config = PipelineConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        PipelineConfig::default()
    });

    // 3. Capture
    let capture = AudioCapture::new().context("opening default input device")?;
    let (chunk_tx, chunk_rx) = mpsc::channel::<PcmChunk>();
    let handle = capture
        .start(&config.audio, chunk_tx)
        .context("starting audio capture")?;

    let mut writer = FrameWriter::from_config(&config.codec);
    let mut summary = MonitorSummary {
        device_sample_rate: capture.sample_rate(),
        device_channels: capture.channels(),
        target_sample_rate: config.audio.target_sample_rate,
        ..MonitorSummary::default()
    };

    // 4. Loopback
    let started = Instant::now();
    let deadline = started + Duration::from_secs(config.monitor.duration_secs);
    log::info!("monitoring for {} s", config.monitor.duration_secs);

    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let chunk = match chunk_rx.recv_timeout(remaining) {
            Ok(chunk) => chunk,
            Err(mpsc::RecvTimeoutError::Timeout) => break,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::warn!("capture stopped before the monitoring window ended");
                break;
            }
        };
        let timestamp = chunk_timestamp(
            summary.chunks_received,
            config.audio.chunk_samples,
            config.audio.target_sample_rate,
        );
        summary.record_chunk(&chunk);

        let pcm = chunk.to_le_bytes();
        let wire = match writer.write_audio(timestamp, &pcm) {
            Ok(wire) => wire,
            Err(e) => {
                log::warn!("chunk rejected: {e}");
                summary.payload_rejections += 1;
                continue;
            }
        };
        summary.wire_bytes += wire.len() as u64;

        match decode_audio_frame(&wire) {
            Some(frame) if frame.payload[..] == pcm[..] => {
                summary.frames_round_tripped += 1;
                summary.last_seq = Some(frame.header.seq);
            }
            _ => {
                log::error!("audio frame did not survive encode/decode");
                summary.round_trip_failures += 1;
            }
        }
    }

    handle.stop();
    drop(handle);

    if summary.target_sample_rate > 0 {
        summary.audio_seconds =
            summary.samples_received as f64 / f64::from(summary.target_sample_rate);
    }

    // 5. Report
    let json = serde_json::to_string_pretty(&summary).context("serialising summary")?;
    println!("{json}");

    log::info!("media-monitor shut down cleanly");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
