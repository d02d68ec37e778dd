//! Binary wire format shared by audio and video frames.
//!
//! Every frame starts with a fixed prefix that identifies the frame family and
//! type, followed by a little-endian header and a length-prefixed payload:
//!
//! | Offset | Size | Field | Notes |
//! |--------|------|-------|-------|
//! | 0 | 2 | magic | `b"TM"` |
//! | 2 | 1 | type | `0x01` video, `0x02` audio |
//! | 3 | 8 | timestamp | `f64` LE, seconds |
//! | 11 | 4 | seq | `u32` LE |
//! | 15 | 2 | width | video only, `u16` LE |
//! | 17 | 2 | height | video only, `u16` LE |
//! | 19 / 15 | 4 | payload length | `u32` LE |
//! | 23 / 19 | n | payload | raw bytes (JPEG or PCM16) |
//!
//! Decoding is tolerant: a malformed frame yields `None` instead of an error
//! so a single corrupt message never aborts the stream.
//!
//! ```rust
//! use media_pipeline::codec::{decode_video_frame, encode_video_frame, frame_type, FrameHeader, FrameType};
//!
//! let header = FrameHeader { timestamp: 1.5, seq: 7, width: 640, height: 480 };
//! let wire = encode_video_frame(&header, b"jpeg");
//! assert_eq!(frame_type(&wire), Some(FrameType::Video));
//!
//! let frame = decode_video_frame(&wire).unwrap();
//! assert_eq!(frame.header, header);
//! assert_eq!(&frame.payload[..], b"jpeg");
//! ```

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

/// Two-byte marker identifying the frame family.
pub const FRAME_MAGIC: [u8; 2] = *b"TM";

/// Bytes needed to determine family and type (magic + type byte).
pub const PREFIX_LEN: usize = 3;

/// Fixed header length of a video frame, payload length field included.
pub const VIDEO_HEADER_LEN: usize = PREFIX_LEN + 8 + 4 + 2 + 2 + 4;

/// Fixed header length of an audio frame, payload length field included.
pub const AUDIO_HEADER_LEN: usize = PREFIX_LEN + 8 + 4 + 4;

/// Sequence numbers wrap modulo 2^24.
pub const SEQ_MODULUS: u32 = 1 << 24;

/// Largest accepted frame width in pixels.
pub const MAX_WIDTH: u16 = 1920;

/// Largest accepted frame height in pixels.
pub const MAX_HEIGHT: u16 = 1080;

// ---------------------------------------------------------------------------
// FrameType
// ---------------------------------------------------------------------------

/// Discriminator carried in the third byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Video,
    Audio,
}

impl FrameType {
    /// Wire value of the type byte.
    pub const fn to_byte(self) -> u8 {
        match self {
            FrameType::Video => 0x01,
            FrameType::Audio => 0x02,
        }
    }

    /// Parse a type byte; unknown values yield `None`.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameType::Video),
            0x02 => Some(FrameType::Audio),
            _ => None,
        }
    }

    /// Lower-case label (`"video"` / `"audio"`).
    pub fn label(&self) -> &'static str {
        match self {
            FrameType::Video => "video",
            FrameType::Audio => "audio",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Headers and decoded frames
// ---------------------------------------------------------------------------

/// Identifies one video frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// Capture time in seconds since session start.
    pub timestamp: f64,
    /// Per-family sequence number (wraps modulo [`SEQ_MODULUS`]).
    pub seq: u32,
    /// Width in pixels (`1..=1920`).
    pub width: u16,
    /// Height in pixels (`1..=1080`).
    pub height: u16,
}

impl FrameHeader {
    /// Returns `true` when width and height are within `1..=1920` / `1..=1080`.
    pub fn has_valid_dimensions(&self) -> bool {
        (1..=MAX_WIDTH).contains(&self.width) && (1..=MAX_HEIGHT).contains(&self.height)
    }
}

/// Audio frames carry no spatial dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrameHeader {
    pub timestamp: f64,
    pub seq: u32,
}

/// A decoded video frame: header plus immutable payload (usually JPEG).
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// A decoded audio frame: header plus immutable PCM16 LE payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub header: AudioFrameHeader,
    pub payload: Bytes,
}

/// Either frame family, as produced by [`decode_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Returns `true` when `bytes` starts with the frame-family magic.
pub fn is_tm_frame(bytes: &[u8]) -> bool {
    bytes.len() >= FRAME_MAGIC.len() && bytes[..FRAME_MAGIC.len()] == FRAME_MAGIC
}

/// Returns `true` when `bytes` is a frame of the video type.
pub fn is_video_frame(bytes: &[u8]) -> bool {
    frame_type(bytes) == Some(FrameType::Video)
}

/// Determine the frame type from the 3-byte prefix without touching the
/// payload.  Returns `None` for foreign data or an unknown type byte.
pub fn frame_type(bytes: &[u8]) -> Option<FrameType> {
    if !is_tm_frame(bytes) || bytes.len() < PREFIX_LEN {
        return None;
    }
    FrameType::from_byte(bytes[FRAME_MAGIC.len()])
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a video frame.
///
/// The payload size ceiling is the caller's responsibility (see
/// [`FrameWriter`](super::FrameWriter)); this function encodes whatever it is
/// given.
pub fn encode_video_frame(header: &FrameHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(VIDEO_HEADER_LEN + payload.len());
    put_prefix(&mut buf, FrameType::Video, header.timestamp, header.seq);
    buf.put_u16_le(header.width);
    buf.put_u16_le(header.height);
    put_payload(&mut buf, payload);
    buf.freeze()
}

/// Encode an audio frame.
pub fn encode_audio_frame(header: &AudioFrameHeader, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(AUDIO_HEADER_LEN + payload.len());
    put_prefix(&mut buf, FrameType::Audio, header.timestamp, header.seq);
    put_payload(&mut buf, payload);
    buf.freeze()
}

fn put_prefix(buf: &mut BytesMut, kind: FrameType, timestamp: f64, seq: u32) {
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u8(kind.to_byte());
    buf.put_f64_le(timestamp);
    buf.put_u32_le(seq);
}

fn put_payload(buf: &mut BytesMut, payload: &[u8]) {
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a video frame, or `None` when the bytes are not a well-formed
/// video frame.
pub fn decode_video_frame(bytes: &[u8]) -> Option<VideoFrame> {
    if frame_type(bytes)? != FrameType::Video || bytes.len() < VIDEO_HEADER_LEN {
        return None;
    }

    let mut cursor = &bytes[PREFIX_LEN..];
    let timestamp = cursor.get_f64_le();
    let seq = cursor.get_u32_le();
    let width = cursor.get_u16_le();
    let height = cursor.get_u16_le();
    let payload = take_payload(cursor)?;

    Some(VideoFrame {
        header: FrameHeader {
            timestamp,
            seq,
            width,
            height,
        },
        payload,
    })
}

/// Decode an audio frame, or `None` when the bytes are not a well-formed
/// audio frame.
pub fn decode_audio_frame(bytes: &[u8]) -> Option<AudioFrame> {
    if frame_type(bytes)? != FrameType::Audio || bytes.len() < AUDIO_HEADER_LEN {
        return None;
    }

    let mut cursor = &bytes[PREFIX_LEN..];
    let timestamp = cursor.get_f64_le();
    let seq = cursor.get_u32_le();
    let payload = take_payload(cursor)?;

    Some(AudioFrame {
        header: AudioFrameHeader { timestamp, seq },
        payload,
    })
}

/// Decode either frame family based on the type byte.
pub fn decode_frame(bytes: &[u8]) -> Option<DecodedFrame> {
    match frame_type(bytes)? {
        FrameType::Video => decode_video_frame(bytes).map(DecodedFrame::Video),
        FrameType::Audio => decode_audio_frame(bytes).map(DecodedFrame::Audio),
    }
}

/// Read the length field and the payload it declares.  Trailing bytes past
/// the declared length are ignored.
fn take_payload(mut cursor: &[u8]) -> Option<Bytes> {
    let declared = cursor.get_u32_le() as usize;
    if declared > cursor.len() {
        return None;
    }
    Some(Bytes::copy_from_slice(&cursor[..declared]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
