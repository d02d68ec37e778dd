//! Sending side of the wire format.
//!
//! [`FrameWriter`] is the caller the codec expects: it owns the per-family
//! sequence counters and enforces the payload ceiling and video dimension
//! limits *before* anything is encoded.

use bytes::Bytes;
use thiserror::Error;

use crate::config::CodecConfig;

use super::wire::{
    encode_audio_frame, encode_video_frame, AudioFrameHeader, FrameHeader, MAX_HEIGHT, MAX_WIDTH,
    SEQ_MODULUS,
};

// ---------------------------------------------------------------------------
// PayloadError
// ---------------------------------------------------------------------------

/// Reason a frame was rejected before encoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayloadError {
    /// Payload is larger than the configured safety ceiling.
    #[error("payload of {len} bytes exceeds the {limit}-byte ceiling")]
    TooLarge { len: usize, limit: usize },

    /// Width or height is zero or above 1920x1080.
    #[error("invalid frame dimensions {width}x{height} (allowed 1x1 to {MAX_WIDTH}x{MAX_HEIGHT})")]
    InvalidDimensions { width: u16, height: u16 },
}

// ---------------------------------------------------------------------------
// SequenceCounter
// ---------------------------------------------------------------------------

/// Monotonic sequence counter that wraps modulo 2^24.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `start` (reduced modulo 2^24).
    pub fn starting_at(start: u32) -> Self {
        Self {
            next: start % SEQ_MODULUS,
        }
    }

    /// Return the current value and advance.
    pub fn advance(&mut self) -> u32 {
        let seq = self.next;
        self.next = (self.next + 1) % SEQ_MODULUS;
        seq
    }

    /// Value the next call to [`advance`](Self::advance) will return.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// FrameWriter
// ---------------------------------------------------------------------------

/// Validates and encodes outgoing frames.
///
/// A rejected frame does not consume a sequence number.
///
/// ```rust
/// use media_pipeline::codec::{decode_video_frame, FrameWriter, PayloadError};
///
/// let mut writer = FrameWriter::new(16);
/// let wire = writer.write_video(0.5, 640, 480, b"jpeg").unwrap();
/// assert_eq!(decode_video_frame(&wire).unwrap().header.seq, 0);
///
/// let too_big = vec![0u8; 17];
/// assert!(matches!(
///     writer.write_video(1.0, 640, 480, &too_big),
///     Err(PayloadError::TooLarge { .. })
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct FrameWriter {
    video_seq: SequenceCounter,
    audio_seq: SequenceCounter,
    max_payload_bytes: usize,
}

impl FrameWriter {
    /// Create a writer with the given payload ceiling in bytes.
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            video_seq: SequenceCounter::new(),
            audio_seq: SequenceCounter::new(),
            max_payload_bytes,
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(config.max_payload_bytes)
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Reject payloads above the ceiling.
    pub fn check_payload(&self, len: usize) -> Result<(), PayloadError> {
        if len > self.max_payload_bytes {
            return Err(PayloadError::TooLarge {
                len,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Validate and encode a video frame, assigning the next video sequence
    /// number.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::TooLarge`] if the payload exceeds the ceiling.
    /// - [`PayloadError::InvalidDimensions`] outside 1x1 to 1920x1080.
    ///
    /// A rejected frame does not consume a sequence number.
    pub fn write_video(
        &mut self,
        timestamp: f64,
        width: u16,
        height: u16,
        payload: &[u8],
    ) -> Result<Bytes, PayloadError> {
        self.check_payload(payload.len())?;

        let mut header = FrameHeader {
            timestamp,
            seq: self.video_seq.peek(),
            width,
            height,
        };
        if !header.has_valid_dimensions() {
            return Err(PayloadError::InvalidDimensions { width, height });
        }

        header.seq = self.video_seq.advance();
        Ok(encode_video_frame(&header, payload))
    }

    /// Validate and encode an audio frame, assigning the next audio sequence
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::TooLarge`] if the payload exceeds the ceiling.
    pub fn write_audio(&mut self, timestamp: f64, payload: &[u8]) -> Result<Bytes, PayloadError> {
        self.check_payload(payload.len())?;

        let header = AudioFrameHeader {
            timestamp,
            seq: self.audio_seq.advance(),
        };
        Ok(encode_audio_frame(&header, payload))
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::from_config(&CodecConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
