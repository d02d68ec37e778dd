//! Audio path: microphone capture → low-pass filter → decimation → PCM16 chunks.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix → LowPassFilter → accumulator
//!           → to_pcm16 → PcmChunk (mpsc) → FrameWriter::write_audio
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::mpsc;
//! use media_pipeline::audio::{AudioCaptureResampler, PcmChunk};
//!
//! let (tx, rx) = mpsc::channel::<PcmChunk>();
//! let mut resampler = AudioCaptureResampler::new(44_100, tx).unwrap();
//! resampler.feed(&vec![0.0; 4_410]);
//!
//! for chunk in rx.try_iter() {
//!     assert_eq!(chunk.to_le_bytes().len(), 1_600);
//! }
//! ```

pub mod capture;
pub mod filter;
pub mod resample;

pub use capture::{AudioCapture, CaptureError, CaptureHandle};
pub use filter::{LowPassFilter, LOW_PASS_TAPS};
pub use resample::{
    downmix_into, to_pcm16, AudioCaptureResampler, PcmChunk, ResampleError, StopSignal,
    CHUNK_SAMPLES, TARGET_SAMPLE_RATE,
};
