//! Session orchestration for the ingest side.
//!
//! One [`IngestSession`] per client connection.  It decodes every binary
//! message, queues video for the session's single quality worker, forwards
//! audio to transcription and, on [`finish`](IngestSession::finish), returns
//! a [`SessionReport`].
//!
//! # Architecture
//!
//! ```text
//! socket bytes
//!        │
//!        ▼
//! IngestSession::push_wire()
//!        ├─ Video ─▶ Arc<Mutex<FrameQueue>> ─▶ worker task
//!        │                                       └─ VideoQualityProcessor
//!        ├─ Audio ─▶ tokio::sync::mpsc::Sender<AudioFrame>
//!        └─ junk  ─▶ malformed counter
//!
//! IngestSession::finish() ─▶ SessionReport { quality, queue stats, counters }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{IngestError, IngestSession};
pub use state::{IngestStats, Ingested, SessionReport};
