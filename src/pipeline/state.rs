//! Ingest session bookkeeping.
//!
//! [`Ingested`] says what happened to one wire message.  [`IngestStats`] is a
//! point-in-time snapshot of an [`IngestSession`](super::IngestSession)'s
//! counters; [`SessionReport`] is what [`finish`](super::IngestSession::finish)
//! hands back once the worker has drained and the processor is graded.

use serde::{Deserialize, Serialize};

use crate::codec::FrameType;
use crate::video::QualityReport;

// ---------------------------------------------------------------------------
// Ingested
// ---------------------------------------------------------------------------

/// What [`push_wire`](super::IngestSession::push_wire) did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Queued for analysis.  `evicted` is set when the oldest queued frame
    /// was dropped to make room.
    Video { seq: u32, evicted: bool },
    /// Handed to the transcription channel.
    Audio { seq: u32 },
    /// Audio that could not be forwarded (channel full, closed or absent).
    AudioDropped { seq: u32 },
    /// Not a decodable frame.
    Skipped,
}

impl Ingested {
    pub fn frame_type(&self) -> Option<FrameType> {
        match self {
            Ingested::Video { .. } => Some(FrameType::Video),
            Ingested::Audio { .. } | Ingested::AudioDropped { .. } => Some(FrameType::Audio),
            Ingested::Skipped => None,
        }
    }
}

// ---------------------------------------------------------------------------
// IngestStats
// ---------------------------------------------------------------------------

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub video_frames_received: u64,
    pub audio_frames_received: u64,
    pub audio_frames_dropped: u64,
    pub malformed_frames: u64,
    pub queue_len: usize,
    pub frames_dropped_by_backpressure: u64,
}

impl IngestStats {
    pub(crate) fn record(&mut self, outcome: Ingested) {
        match outcome {
            Ingested::Video { .. } => self.video_frames_received += 1,
            Ingested::Audio { .. } => self.audio_frames_received += 1,
            Ingested::AudioDropped { .. } => {
                self.audio_frames_received += 1;
                self.audio_frames_dropped += 1;
            }
            Ingested::Skipped => self.malformed_frames += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionReport
// ---------------------------------------------------------------------------

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub quality: QualityReport,
    /// Frames still queued when the session closed (discarded unprocessed).
    pub queue_len_at_close: usize,
    pub frames_dropped_by_backpressure: u64,
    pub video_frames_received: u64,
    pub audio_frames_received: u64,
    pub audio_frames_dropped: u64,
    pub malformed_frames: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
