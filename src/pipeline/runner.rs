//! Ingest session: demultiplexes wire frames and drives one quality worker.
//!
//! [`IngestSession`] owns the receiving side of one client connection.
//!
//! # Flow
//!
//! ```text
//! push_wire(bytes)
//!   ├─ video  → FrameQueue (Mutex, drop-oldest) → notify worker
//!   ├─ audio  → tokio mpsc (try_send)           → transcription
//!   └─ other  → counted as malformed, skipped
//!
//! worker task (exactly one per session)
//!   loop { dequeue → VideoQualityProcessor::process_frame_at }
//!   empty → wait on Notify; closed + empty → return processor
//!
//! finish()
//!   └─▶ record queue len, clear queue, close, join worker, finalize
//! ```
//!
//! The queue mutex is the only synchronisation between the receiver and the
//! worker; it is never held across an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinError, JoinHandle};

use crate::codec::{decode_frame, AudioFrame, DecodedFrame};
use crate::config::PipelineConfig;
use crate::video::{FrameQueue, ProcessorError, QueuedFrame, VideoQualityProcessor};

use super::state::{IngestStats, Ingested, SessionReport};

// ---------------------------------------------------------------------------
// IngestError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("quality worker panicked: {0}")]
    WorkerPanicked(#[from] JoinError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// State shared between the receiver and the worker task.
struct Shared {
    queue: Mutex<FrameQueue>,
    notify: Notify,
    closed: AtomicBool,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, FrameQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop(&self) -> Option<QueuedFrame> {
        self.queue().dequeue()
    }
}

// ---------------------------------------------------------------------------
// IngestSession
// ---------------------------------------------------------------------------

/// One client session: a bounded frame queue, its worker and an optional
/// audio forwarding channel.
///
/// Must be created inside a tokio runtime.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use media_pipeline::config::PipelineConfig;
/// use media_pipeline::pipeline::IngestSession;
/// use media_pipeline::video::{PoseDetector, VideoQualityProcessor};
///
/// # async fn example(pose: Arc<dyn PoseDetector>, messages: Vec<Vec<u8>>) {
/// let config = PipelineConfig::default();
/// let (audio_tx, mut audio_rx) = tokio::sync::mpsc::channel(64);
///
/// let processor = VideoQualityProcessor::new(pose, &config.quality);
/// let mut session = IngestSession::from_config(processor, &config, Some(audio_tx));
///
/// tokio::spawn(async move {
///     while let Some(frame) = audio_rx.recv().await {
///         // hand PCM16 to transcription
///         let _ = frame.payload;
///     }
/// });
///
/// for message in &messages {
///     session.push_wire(message);
/// }
/// let report = session.finish().await.unwrap();
/// println!("grade: {}", report.quality.grade);
/// # }
/// ```
pub struct IngestSession {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<VideoQualityProcessor>>,
    audio_tx: Option<mpsc::Sender<AudioFrame>>,
    stats: IngestStats,
}

impl IngestSession {
    /// Start the worker task for `processor` draining `queue`.
    pub fn spawn(
        processor: VideoQualityProcessor,
        queue: FrameQueue,
        audio_tx: Option<mpsc::Sender<AudioFrame>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(queue),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let worker = tokio::spawn(run_worker(Arc::clone(&shared), processor));

        Self {
            shared,
            worker: Some(worker),
            audio_tx,
            stats: IngestStats::default(),
        }
    }

    /// [`spawn`](Self::spawn) with a queue sized from config.
    pub fn from_config(
        processor: VideoQualityProcessor,
        config: &PipelineConfig,
        audio_tx: Option<mpsc::Sender<AudioFrame>>,
    ) -> Self {
        Self::spawn(processor, FrameQueue::from_config(&config.queue), audio_tx)
    }

    /// Route one binary wire message.  Never blocks on the worker.
    pub fn push_wire(&mut self, bytes: &[u8]) -> Ingested {
        let outcome = match decode_frame(bytes) {
            Some(DecodedFrame::Video(frame)) => {
                let seq = frame.header.seq;
                let evicted = self.shared.queue().push(frame);
                self.shared.notify.notify_one();
                if evicted {
                    log::debug!("ingest: queue full, evicted oldest before seq={seq}");
                }
                Ingested::Video { seq, evicted }
            }
            Some(DecodedFrame::Audio(frame)) => self.forward_audio(frame),
            None => {
                log::debug!("ingest: skipping malformed message ({} bytes)", bytes.len());
                Ingested::Skipped
            }
        };

        self.stats.record(outcome);
        outcome
    }

    /// Frames currently waiting for analysis.
    pub fn queue_len(&self) -> usize {
        self.shared.queue().len()
    }

    pub fn frames_dropped_by_backpressure(&self) -> u64 {
        self.shared.queue().frames_dropped_by_backpressure()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> IngestStats {
        let queue = self.shared.queue();
        IngestStats {
            queue_len: queue.len(),
            frames_dropped_by_backpressure: queue.frames_dropped_by_backpressure(),
            ..self.stats
        }
    }

    /// Close the session and grade it.
    ///
    /// Frames still queued are discarded; a frame already being analysed is
    /// allowed to finish before the processor is finalised.
    ///
    /// # Errors
    ///
    /// - [`IngestError::WorkerPanicked`] if the worker task panicked.
    /// - [`IngestError::Processor`] if the processor was already finalised.
    pub async fn finish(mut self) -> Result<SessionReport, IngestError> {
        let (queue_len_at_close, frames_dropped_by_backpressure) = {
            let mut queue = self.shared.queue();
            let len = queue.len();
            queue.clear();
            (len, queue.frames_dropped_by_backpressure())
        };
        self.close();
        self.audio_tx = None;

        if queue_len_at_close > 0 {
            log::info!("ingest: discarding {queue_len_at_close} queued frame(s) at close");
        }

        let mut processor = match self.worker.take() {
            Some(worker) => worker.await?,
            None => return Err(ProcessorError::AlreadyFinalized.into()),
        };
        let quality = processor.finalize()?;

        Ok(SessionReport {
            quality,
            queue_len_at_close,
            frames_dropped_by_backpressure,
            video_frames_received: self.stats.video_frames_received,
            audio_frames_received: self.stats.audio_frames_received,
            audio_frames_dropped: self.stats.audio_frames_dropped,
            malformed_frames: self.stats.malformed_frames,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn forward_audio(&mut self, frame: AudioFrame) -> Ingested {
        let seq = frame.header.seq;
        let Some(tx) = &self.audio_tx else {
            return Ingested::AudioDropped { seq };
        };

        match tx.try_send(frame) {
            Ok(()) => Ingested::Audio { seq },
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("ingest: audio channel full, dropping seq={seq}");
                Ingested::AudioDropped { seq }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("ingest: audio receiver gone, no longer forwarding audio");
                self.audio_tx = None;
                Ingested::AudioDropped { seq }
            }
        }
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

impl Drop for IngestSession {
    fn drop(&mut self) {
        // Lets a worker abandoned without `finish` exit once the queue drains.
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_worker(shared: Arc<Shared>, mut processor: VideoQualityProcessor) -> VideoQualityProcessor {
    loop {
        let next = shared.pop();
        match next {
            Some(queued) => {
                if let Err(e) = processor
                    .process_frame_at(&queued.frame, queued.enqueued_at)
                    .await
                {
                    log::error!("ingest: worker stopping: {e}");
                    break;
                }
            }
            None => {
                if shared.closed.load(Ordering::Acquire) {
                    break;
                }
                shared.notify.notified().await;
            }
        }
    }

    log::debug!("ingest: worker exiting");
    processor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::codec::{FrameWriter, VideoFrame};
    use crate::config::QualityConfig;
    use crate::video::{
        DetectorError, Keypoint, MockPoseDetector, PoseDetection, PoseDetector, QualityGrade,
    };

    fn facing_pose() -> PoseDetection {
        PoseDetection {
            keypoints: vec![
                Keypoint::new("nose", 320.0, 150.0, 0.9),
                Keypoint::new("left_shoulder", 400.0, 300.0, 0.9),
                Keypoint::new("right_shoulder", 240.0, 300.0, 0.9),
            ],
            confidence: 0.9,
        }
    }

    fn processor_with(pose: Arc<dyn PoseDetector>) -> VideoQualityProcessor {
        VideoQualityProcessor::new(pose, &QualityConfig::default())
    }

    fn processor() -> VideoQualityProcessor {
        processor_with(Arc::new(MockPoseDetector::always(facing_pose())))
    }

    /// Wait until the worker has taken every queued frame.
    async fn drained(session: &IngestSession) {
        while session.queue_len() > 0 {
            tokio::task::yield_now().await;
        }
    }

    /// Detector that takes a while, to catch a frame mid-analysis.
    struct SlowPose;

    #[async_trait]
    impl PoseDetector for SlowPose {
        async fn detect(&self, _frame: &VideoFrame) -> Result<PoseDetection, DetectorError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(facing_pose())
        }
    }

    #[tokio::test]
    async fn video_frames_reach_the_processor() {
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::spawn(processor(), FrameQueue::new(20), None);

        for i in 0..10 {
            let wire = writer.write_video(i as f64 * 0.5, 640, 480, b"jpeg").unwrap();
            let outcome = session.push_wire(&wire);
            assert_eq!(outcome, Ingested::Video { seq: i, evicted: false });
        }
        drained(&session).await;

        let report = session.finish().await.unwrap();
        assert_eq!(report.video_frames_received, 10);
        assert_eq!(report.quality.frames_analyzed, 10);
        assert_eq!(report.quality.last_received_timestamp, 4.5);
        assert_eq!(report.queue_len_at_close, 0);
    }

    #[tokio::test]
    async fn burst_overflows_and_close_discards_queue() {
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::spawn(processor(), FrameQueue::new(20), None);

        // The current-thread runtime never polls the worker between pushes.
        for i in 0..25 {
            let wire = writer.write_video(i as f64, 640, 480, b"jpeg").unwrap();
            session.push_wire(&wire);
        }
        assert_eq!(session.queue_len(), 20);
        assert_eq!(session.frames_dropped_by_backpressure(), 5);

        let report = session.finish().await.unwrap();
        assert_eq!(report.queue_len_at_close, 20);
        assert_eq!(report.frames_dropped_by_backpressure, 5);
        assert_eq!(report.quality.frames_analyzed, 0);
    }

    #[tokio::test]
    async fn finish_waits_for_in_flight_frame() {
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::spawn(processor_with(Arc::new(SlowPose)), FrameQueue::new(4), None);

        session.push_wire(&writer.write_video(1.0, 640, 480, b"jpeg").unwrap());
        drained(&session).await;

        let report = session.finish().await.unwrap();
        assert_eq!(report.quality.frames_analyzed, 1);
        assert_eq!(report.queue_len_at_close, 0);
    }

    #[tokio::test]
    async fn audio_is_forwarded_until_channel_full() {
        let (tx, mut rx) = mpsc::channel(2);
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::spawn(processor(), FrameQueue::new(4), Some(tx));

        let pcm = [0u8; 1_600];
        let outcomes: Vec<Ingested> = (0..3)
            .map(|i| session.push_wire(&writer.write_audio(i as f64 * 0.05, &pcm).unwrap()))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Ingested::Audio { seq: 0 },
                Ingested::Audio { seq: 1 },
                Ingested::AudioDropped { seq: 2 },
            ]
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.header.seq, 0);
        assert_eq!(first.payload.len(), 1_600);

        let report = session.finish().await.unwrap();
        assert_eq!(report.audio_frames_received, 3);
        assert_eq!(report.audio_frames_dropped, 1);

        // Sender released by finish.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_audio_receiver_is_not_fatal() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::spawn(processor(), FrameQueue::new(4), Some(tx));

        for i in 0..2 {
            let outcome = session.push_wire(&writer.write_audio(i as f64, &[1, 2]).unwrap());
            assert!(matches!(outcome, Ingested::AudioDropped { .. }));
        }
        assert_eq!(session.stats().audio_frames_dropped, 2);
    }

    #[tokio::test]
    async fn malformed_messages_are_counted() {
        let mut session = IngestSession::spawn(processor(), FrameQueue::new(4), None);

        assert_eq!(session.push_wire(b"hello"), Ingested::Skipped);
        assert_eq!(session.push_wire(&[]), Ingested::Skipped);
        assert_eq!(session.push_wire(&[b'T', b'M', 0x01, 0, 0]), Ingested::Skipped);

        let stats = session.stats();
        assert_eq!(stats.malformed_frames, 3);
        assert_eq!(stats.video_frames_received, 0);

        let report = session.finish().await.unwrap();
        assert_eq!(report.malformed_frames, 3);
        assert_eq!(report.quality.grade, QualityGrade::Poor);
        assert!(report.quality.insufficient_data);
    }

    #[tokio::test]
    async fn stats_snapshot_includes_queue() {
        let mut writer = FrameWriter::default();
        let mut session = IngestSession::from_config(processor(), &PipelineConfig::default(), None);

        session.push_wire(&writer.write_video(0.0, 640, 480, b"x").unwrap());
        let stats = session.stats();
        assert_eq!(stats.video_frames_received, 1);
        assert_eq!(stats.queue_len, 1);
        assert_eq!(stats.frames_dropped_by_backpressure, 0);
    }
}
