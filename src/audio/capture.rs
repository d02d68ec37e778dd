//! Microphone capture via `cpal`, resampled inside the audio callback.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.
//! [`AudioCapture::start`] moves an [`AudioCaptureResampler`] into the input
//! callback, so filtering, decimation and PCM16 conversion all happen on the
//! real-time audio thread and only finished [`PcmChunk`]s cross to the
//! consumer.  The returned [`CaptureHandle`] is a RAII guard: dropping it
//! fires the stop signal and stops the cpal stream.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::config::AudioConfig;

use super::resample::{downmix_into, AudioCaptureResampler, PcmChunk, ResampleError, StopSignal};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("device rate is unusable: {0}")]
    Resample(#[from] ResampleError),
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Keeps the cpal stream alive; dropping it stops capture.
pub struct CaptureHandle {
    stop: StopSignal,
    _stream: cpal::Stream,
}

impl CaptureHandle {
    /// Deactivate the resampler.  The stream itself stops on drop.
    pub fn stop(&self) {
        if !self.stop.is_stopped() {
            log::debug!("capture: stop requested");
        }
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop.stop();
        log::debug!("capture: stream closed");
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Default input device plus its preferred stream configuration.
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use media_pipeline::audio::{AudioCapture, PcmChunk};
/// use media_pipeline::config::AudioConfig;
///
/// let (tx, rx) = mpsc::channel::<PcmChunk>();
/// let capture = AudioCapture::new().unwrap();
/// let _handle = capture.start(&AudioConfig::default(), tx).unwrap();
///
/// while let Ok(chunk) = rx.recv() {
///     println!("{} samples", chunk.len());
/// }
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open the system default input device.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start capturing and send 50 ms PCM16 chunks to `tx`.
    ///
    /// The resampler is built before the stream so an unusable device rate
    /// surfaces here as [`CaptureError::Resample`].
    pub fn start(
        &self,
        audio: &AudioConfig,
        tx: mpsc::Sender<PcmChunk>,
    ) -> Result<CaptureHandle, CaptureError> {
        let mut resampler = AudioCaptureResampler::with_config(self.sample_rate, audio, tx)?;
        let stop = resampler.stop_signal();
        let channels = self.channels as usize;
        let mut mono: Vec<f32> = Vec::with_capacity(4_096);

        log::info!(
            "capture: {} Hz x{} → {} Hz, ratio {:.5}",
            self.sample_rate,
            self.channels,
            audio.target_sample_rate,
            resampler.ratio()
        );

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                downmix_into(data, channels, &mut mono);
                resampler.feed(&mono);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(CaptureHandle {
            stop,
            _stream: stream,
        })
    }

    /// Native sample rate of the device in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channels delivered to the callback.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
