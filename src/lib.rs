//! Real-time audio/video ingest for a remote interview session.
//!
//! | Module       | Responsibility                                             |
//! |--------------|------------------------------------------------------------|
//! | [`audio`]    | Mic capture, anti-alias filter, 16 kHz PCM16 50 ms chunks  |
//! | [`codec`]    | `TM` binary wire format, sequence numbers, payload ceiling |
//! | [`video`]    | Frame queue, detector traits, gaze, quality state machine  |
//! | [`pipeline`] | Per-session ingest: demux, single worker, final report     |
//! | [`config`]   | TOML settings and platform paths                           |

pub mod audio;
pub mod codec;
pub mod config;
pub mod pipeline;
pub mod video;
