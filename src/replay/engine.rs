//! Paced replay of a reading sequence as a stream of threat assessments.
//!
//! Each call to `ReplayEngine::stream` spawns one producer task that walks a
//! `ReplaySequence`, scores the current reading, and pushes the assessment
//! into a bounded channel. Between emissions the producer sleeps for the
//! configured interval. The sleep is a scheduled wake-up, not a busy wait,
//! and it is raced against the cancel signal and the consumer hanging up.
//!
//! Streams never share a position. Two clients connected to the same
//! sequence each start from the first reading.
//!
//! Termination:
//! - `Exhausted`: the last reading of a non-looping sequence was emitted.
//! - `Cancelled`: the stream's `CancelSignal` fired.
//! - `ConsumerGone`: the `ReplayStream` was dropped or closed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ScoringConfig;
use crate::logging::{log_stream_end, Component};
use crate::model::{StreamEnd, ThreatAssessment, ThreatError};
use crate::replay::sequence::ReplaySequence;
use crate::threat::score;

/// Default number of assessments buffered between producer and consumer.
pub const DEFAULT_BUFFER: usize = 8;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Cancellation
// ============================================================================

/// A one-shot, cloneable cancel flag.
///
/// Once cancelled it stays cancelled. `cancelled()` resolves immediately if
/// the flag is already set, otherwise as soon as `cancel()` is called from
/// any clone.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the signal fires.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Spawns paced replay streams that share one scoring configuration.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    config: Arc<ScoringConfig>,
    interval: Duration,
    buffer: usize,
}

impl ReplayEngine {
    pub fn new(config: Arc<ScoringConfig>, interval: Duration) -> Self {
        Self {
            config,
            interval,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Channel capacity per stream. Values below 1 are raised to 1.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Start replaying `sequence` from its first reading.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(&self, sequence: ReplaySequence, cancel: CancelSignal) -> ReplayStream {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);

        info!(
            component = %Component::Replay,
            stream_id = id,
            readings = sequence.len(),
            looping = sequence.is_looping(),
            interval = ?self.interval,
            "replay stream opened"
        );

        let task = tokio::spawn(run_replay(
            id,
            sequence,
            Arc::clone(&self.config),
            self.interval,
            cancel.clone(),
            tx,
        ));

        ReplayStream {
            id,
            rx,
            cancel,
            task: Some(task),
            end: None,
        }
    }
}

/// Producer loop. Returns how the stream ended.
async fn run_replay(
    id: u64,
    sequence: ReplaySequence,
    config: Arc<ScoringConfig>,
    interval: Duration,
    cancel: CancelSignal,
    tx: mpsc::Sender<ThreatAssessment>,
) -> StreamEnd {
    let mut position = 0usize;
    let mut emitted = 0u64;

    let end = loop {
        if cancel.is_cancelled() {
            break StreamEnd::Cancelled;
        }
        let Some(reading) = sequence.get(position) else {
            break StreamEnd::Exhausted;
        };
        let assessment = score(reading, &config);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            sent = tx.send(assessment) => {
                if sent.is_err() {
                    break StreamEnd::ConsumerGone;
                }
            }
        }
        emitted += 1;

        match sequence.next_position(position) {
            Some(next) => {
                if next == 0 {
                    debug!(component = %Component::Replay, stream_id = id, emitted, "sequence wrapped");
                }
                position = next;
            }
            None => break StreamEnd::Exhausted,
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            _ = tx.closed() => break StreamEnd::ConsumerGone,
            _ = tokio::time::sleep(interval) => {}
        }
    };

    log_stream_end(id, end, emitted);
    end
}

// ============================================================================
// Consumer handle
// ============================================================================

/// Receiving side of one replay stream.
///
/// Dropping it hangs up the channel; the producer notices at its next send
/// or while sleeping and ends with `ConsumerGone`.
#[derive(Debug)]
pub struct ReplayStream {
    id: u64,
    rx: mpsc::Receiver<ThreatAssessment>,
    cancel: CancelSignal,
    task: Option<JoinHandle<StreamEnd>>,
    end: Option<StreamEnd>,
}

impl ReplayStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next assessment, or `StreamTerminated` once the stream has ended.
    ///
    /// After cancellation no further assessment is returned, even if some
    /// were already buffered.
    pub async fn recv(&mut self) -> Result<ThreatAssessment, ThreatError> {
        if let Some(end) = self.end {
            return Err(ThreatError::StreamTerminated(end));
        }
        if self.cancel.is_cancelled() {
            return Err(self.terminate(StreamEnd::Cancelled));
        }

        match self.rx.recv().await {
            Some(_) if self.cancel.is_cancelled() => Err(self.terminate(StreamEnd::Cancelled)),
            Some(assessment) => Ok(assessment),
            None => {
                let end = self.join().await;
                Err(self.terminate(end))
            }
        }
    }

    /// Hang up and wait for the producer to stop.
    ///
    /// Returns the producer's own verdict: `Exhausted` or `Cancelled` if it
    /// had already finished that way, `ConsumerGone` otherwise.
    pub async fn close(mut self) -> StreamEnd {
        self.rx.close();
        self.join().await
    }

    /// Adapt into a `futures` stream that yields assessments until the
    /// replay ends.
    pub fn into_stream(self) -> impl Stream<Item = ThreatAssessment> + Send + 'static {
        stream::unfold(self, |mut replay| async move {
            match replay.recv().await {
                Ok(assessment) => Some((assessment, replay)),
                Err(_) => None,
            }
        })
    }

    fn terminate(&mut self, end: StreamEnd) -> ThreatError {
        self.end = Some(end);
        self.rx.close();
        ThreatError::StreamTerminated(end)
    }

    async fn join(&mut self) -> StreamEnd {
        match self.task.take() {
            Some(handle) => match handle.await {
                Ok(end) => end,
                Err(e) => {
                    error!(
                        component = %Component::Replay,
                        stream_id = self.id,
                        "replay producer failed: {}",
                        e
                    );
                    StreamEnd::ConsumerGone
                }
            },
            None => self.end.unwrap_or(StreamEnd::ConsumerGone),
        }
    }
}
