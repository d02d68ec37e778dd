//! Real-time downsampler and PCM16 encoder.
//!
//! [`AudioCaptureResampler`] runs inside the audio callback.  Every incoming
//! sample passes through the [`LowPassFilter`]; a fractional accumulator
//! then picks output samples at the ratio `native_rate / target_rate`, which
//! handles 44.1 kHz, 48 kHz and any other capture rate without per-rate
//! special cases.  Output samples are converted to PCM16 and collected into
//! fixed-size chunks (800 samples = 50 ms at 16 kHz) that are handed to the
//! consumer over a channel.
//!
//! ```text
//! f32 block ─▶ LowPassFilter ─▶ accumulator ≥ ratio? ─▶ to_pcm16 ─▶ pending
//!                                                     pending full ─▶ tx.send(PcmChunk)
//! ```
//!
//! The callback never blocks: `mpsc::Sender::send` on an unbounded channel
//! returns immediately, and each chunk's buffer moves to the receiver, with a
//! fresh buffer of the same capacity taking its place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use thiserror::Error;

use crate::config::AudioConfig;

use super::filter::LowPassFilter;

/// Output sample rate expected by transcription.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Samples per emitted chunk: 50 ms at 16 kHz.
pub const CHUNK_SAMPLES: usize = 800;

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

/// Invalid resampler construction parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResampleError {
    #[error("sample rates must be non-zero")]
    ZeroRate,

    #[error("native rate {native} Hz is below the {target} Hz target; upsampling is not supported")]
    BelowTarget { native: u32, target: u32 },

    #[error("chunk size must be at least one sample")]
    EmptyChunk,
}

// ---------------------------------------------------------------------------
// PCM helpers
// ---------------------------------------------------------------------------

/// Convert a float sample to PCM16.
///
/// Input is clamped to `[-1.0, 1.0]`; negative values scale by 32768 and
/// positive values by 32767, so both full-scale ends are reachable.
///
/// ```rust
/// use media_pipeline::audio::to_pcm16;
///
/// assert_eq!(to_pcm16(1.0), i16::MAX);
/// assert_eq!(to_pcm16(-1.0), i16::MIN);
/// assert_eq!(to_pcm16(1.5), i16::MAX);
/// ```
pub fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32_768.0) as i16
    } else {
        (s * 32_767.0) as i16
    }
}

/// Downmix interleaved `data` into `out` (cleared first) by averaging
/// channels.
///
/// `out` is reused across callbacks so its allocation settles after the first
/// few blocks.  `channels` of 0 or 1 copies the input unchanged.
pub fn downmix_into(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    out.extend(
        data.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

// ---------------------------------------------------------------------------
// PcmChunk
// ---------------------------------------------------------------------------

/// One completed block of 16 kHz PCM16 audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    samples: Vec<i16>,
}

impl PcmChunk {
    /// Mono PCM16 samples at the target rate, oldest first.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Little-endian byte encoding, suitable as an audio frame payload.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Duration in milliseconds at `sample_rate` Hz.
    pub fn duration_ms(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1_000.0 / sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// StopSignal
// ---------------------------------------------------------------------------

/// Cloneable flag that permanently deactivates a resampler.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// AudioCaptureResampler
// ---------------------------------------------------------------------------

/// Filters, decimates and packetises raw capture audio.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
/// use media_pipeline::audio::{AudioCaptureResampler, PcmChunk};
///
/// let (tx, rx) = mpsc::channel::<PcmChunk>();
/// let mut resampler = AudioCaptureResampler::new(48_000, tx).unwrap();
///
/// // 2400 samples at 48 kHz = 50 ms → exactly one 800-sample chunk.
/// assert_eq!(resampler.feed(&vec![0.0; 2_400]), 1);
/// assert_eq!(rx.try_recv().unwrap().len(), 800);
/// ```
#[derive(Debug)]
pub struct AudioCaptureResampler {
    filter: LowPassFilter,
    /// `native_rate / target_rate`, always ≥ 1.
    ratio: f64,
    accumulator: f64,
    pending: Vec<i16>,
    chunk_samples: usize,
    /// `None` once the resampler has been released.
    tx: Option<mpsc::Sender<PcmChunk>>,
    stop: StopSignal,
}

impl AudioCaptureResampler {
    /// Resample from `native_rate` to 16 kHz in 800-sample chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ResampleError`] when `native_rate` is zero or below 16 kHz.
    pub fn new(native_rate: u32, tx: mpsc::Sender<PcmChunk>) -> Result<Self, ResampleError> {
        Self::with_params(native_rate, TARGET_SAMPLE_RATE, CHUNK_SAMPLES, tx)
    }

    /// Target rate and chunk size taken from `config`.
    pub fn with_config(
        native_rate: u32,
        config: &AudioConfig,
        tx: mpsc::Sender<PcmChunk>,
    ) -> Result<Self, ResampleError> {
        Self::with_params(
            native_rate,
            config.target_sample_rate,
            config.chunk_samples,
            tx,
        )
    }

    /// Fully explicit constructor.
    ///
    /// # Errors
    ///
    /// - [`ResampleError::ZeroRate`] if either rate is zero.
    /// - [`ResampleError::BelowTarget`] if `native_rate < target_rate`.
    /// - [`ResampleError::EmptyChunk`] if `chunk_samples` is zero.
    pub fn with_params(
        native_rate: u32,
        target_rate: u32,
        chunk_samples: usize,
        tx: mpsc::Sender<PcmChunk>,
    ) -> Result<Self, ResampleError> {
        if native_rate == 0 || target_rate == 0 {
            return Err(ResampleError::ZeroRate);
        }
        if native_rate < target_rate {
            return Err(ResampleError::BelowTarget {
                native: native_rate,
                target: target_rate,
            });
        }
        if chunk_samples == 0 {
            return Err(ResampleError::EmptyChunk);
        }

        Ok(Self {
            filter: LowPassFilter::new(),
            ratio: native_rate as f64 / target_rate as f64,
            accumulator: 0.0,
            pending: Vec::with_capacity(chunk_samples),
            chunk_samples,
            tx: Some(tx),
            stop: StopSignal::new(),
        })
    }

    /// Handle that stops this resampler from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Decimation ratio (`native / target`).
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Output samples collected toward the next chunk.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some() && !self.stop.is_stopped()
    }

    /// Process one block of samples in `[-1.0, 1.0]`.
    ///
    /// Returns the number of chunks handed off during this call.  After the
    /// stop signal fires (or the receiver is dropped) this is a no-op that
    /// returns `0`.
    pub fn feed(&mut self, block: &[f32]) -> usize {
        if self.stop.is_stopped() {
            self.release();
        }
        if self.tx.is_none() {
            return 0;
        }

        let mut emitted = 0;
        for &sample in block {
            let filtered = self.filter.process(sample);
            self.accumulator += 1.0;
            if self.accumulator < self.ratio {
                continue;
            }
            self.accumulator -= self.ratio;
            self.pending.push(to_pcm16(filtered));

            if self.pending.len() >= self.chunk_samples {
                if !self.hand_off() {
                    return emitted;
                }
                emitted += 1;
            }
        }
        emitted
    }

    /// Deactivate permanently and release the channel and buffers.
    ///
    /// Returns `true` if this call released the channel, `false` if the
    /// resampler had already let it go.
    pub fn stop(&mut self) -> bool {
        self.stop.stop();
        self.release()
    }

    /// Move the pending buffer to the consumer.  Returns `false` (and
    /// releases) when the receiver is gone.
    fn hand_off(&mut self) -> bool {
        let samples = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_samples));
        let delivered = match &self.tx {
            Some(tx) => tx.send(PcmChunk { samples }).is_ok(),
            None => false,
        };
        if !delivered {
            self.release();
        }
        delivered
    }

    /// Drop the sender and buffers.  Returns `true` if the channel was still
    /// held.  Runs on the audio thread, so it must not log.
    fn release(&mut self) -> bool {
        let held = self.tx.take().is_some();
        self.stop.stop();
        self.pending = Vec::new();
        held
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
