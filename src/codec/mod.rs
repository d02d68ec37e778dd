//! Frame codec: the binary wire format multiplexing audio and video.
//!
//! * [`wire`]: bit-exact encode/decode plus cheap prefix inspection.
//! * [`writer`]: [`FrameWriter`], the sending side that enforces the payload
//!   ceiling and assigns wrapping sequence numbers.

pub mod wire;
pub mod writer;

pub use wire::{
    decode_audio_frame, decode_frame, decode_video_frame, encode_audio_frame, encode_video_frame,
    frame_type, is_tm_frame, is_video_frame, AudioFrame, AudioFrameHeader, DecodedFrame,
    FrameHeader, FrameType, VideoFrame, AUDIO_HEADER_LEN, FRAME_MAGIC, SEQ_MODULUS,
    VIDEO_HEADER_LEN,
};
pub use writer::{FrameWriter, PayloadError, SequenceCounter};
