//! Seek arbitration.
//!
//! The media element's own seek is asynchronous and its completion event
//! does not say which request it belongs to. Every `seek()` therefore takes
//! the next value of a monotonically increasing generation counter, and at
//! most one request is pending at a time: issuing a new one immediately
//! rejects the previous handle with [`SeekError::Cancelled`]. When the
//! element reports completion, only the pending request (which is always the
//! latest generation) is resolved.

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// A successfully settled seek.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeekCompletion {
    pub generation: u64,
    /// Authoritative virtual time after the seek.
    pub virtual_time: f64,
    /// Source position the element settled on, if a real seek was needed.
    pub real_time: Option<f64>,
}

/// Why a seek did not complete.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeekError {
    /// A newer seek was issued before this one settled.
    #[error("seek #{generation} cancelled: superseded by seek #{superseded_by}")]
    Cancelled { generation: u64, superseded_by: u64 },

    /// The media element reported an error while seeking.
    #[error("seek #{generation} failed: {reason}")]
    Failed { generation: u64, reason: String },

    /// Playback was stopped or the media element detached before the seek
    /// settled.
    #[error("seek #{generation} interrupted: {reason}")]
    Interrupted { generation: u64, reason: &'static str },
}

impl SeekError {
    pub fn generation(&self) -> u64 {
        match self {
            SeekError::Cancelled { generation, .. }
            | SeekError::Failed { generation, .. }
            | SeekError::Interrupted { generation, .. } => *generation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SeekError::Cancelled { .. })
    }
}

type SeekResult = Result<SeekCompletion, SeekError>;

/// Caller's side of a seek request. Await it, or poll with
/// [`SeekHandle::try_result`] from synchronous code.
#[derive(Debug)]
#[must_use = "a SeekHandle reports whether the seek settled or was cancelled"]
pub struct SeekHandle {
    generation: u64,
    target: f64,
    rx: oneshot::Receiver<SeekResult>,
}

impl SeekHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The clamped virtual time this seek asked for.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Outcome if already decided, `None` while the seek is in flight.
    pub fn try_result(&mut self) -> Option<SeekResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(self.dropped())),
        }
    }

    fn dropped(&self) -> SeekError {
        SeekError::Interrupted {
            generation: self.generation,
            reason: "player dropped",
        }
    }
}

impl Future for SeekHandle {
    type Output = SeekResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(this.dropped())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Debug)]
struct PendingSeek {
    generation: u64,
    virtual_target: f64,
    real_target: f64,
    tx: oneshot::Sender<SeekResult>,
}

/// Generation counter plus the single in-flight request.
#[derive(Debug, Default)]
pub(crate) struct SeekArbiter {
    latest: u64,
    pending: Option<PendingSeek>,
    cancelled: u64,
}

impl SeekArbiter {
    /// Register a new request, cancelling any pending one.
    ///
    /// With `real_target == None` no element seek is needed (the target lies
    /// outside every segment) and the handle resolves immediately.
    pub(crate) fn begin(&mut self, virtual_target: f64, real_target: Option<f64>) -> SeekHandle {
        self.latest += 1;
        let generation = self.latest;

        if let Some(previous) = self.pending.take() {
            self.cancelled += 1;
            tracing::debug!(
                cancelled = previous.generation,
                superseded_by = generation,
                "Seek superseded"
            );
            let _ = previous.tx.send(Err(SeekError::Cancelled {
                generation: previous.generation,
                superseded_by: generation,
            }));
        }

        let (tx, rx) = oneshot::channel();
        match real_target {
            Some(real_target) => {
                self.pending = Some(PendingSeek {
                    generation,
                    virtual_target,
                    real_target,
                    tx,
                });
            }
            None => {
                let _ = tx.send(Ok(SeekCompletion {
                    generation,
                    virtual_time: virtual_target,
                    real_time: None,
                }));
            }
        }

        SeekHandle {
            generation,
            target: virtual_target,
            rx,
        }
    }

    /// Resolve the pending request with the reconciled virtual time.
    pub(crate) fn settle(&mut self, virtual_time: f64, real_time: f64) -> Option<SeekCompletion> {
        let pending = self.pending.take()?;
        if pending.generation != self.latest {
            // Unreachable while `begin` cancels eagerly; kept as the
            // arbitration rule itself.
            let _ = pending.tx.send(Err(SeekError::Cancelled {
                generation: pending.generation,
                superseded_by: self.latest,
            }));
            return None;
        }
        let completion = SeekCompletion {
            generation: pending.generation,
            virtual_time,
            real_time: Some(real_time),
        };
        let _ = pending.tx.send(Ok(completion));
        Some(completion)
    }

    /// Reject the pending request because the element reported an error.
    pub(crate) fn fail(&mut self, reason: &str) -> Option<u64> {
        let pending = self.pending.take()?;
        let _ = pending.tx.send(Err(SeekError::Failed {
            generation: pending.generation,
            reason: reason.to_string(),
        }));
        Some(pending.generation)
    }

    /// Reject the pending request because the session ended under it.
    pub(crate) fn interrupt(&mut self, reason: &'static str) -> Option<u64> {
        let pending = self.pending.take()?;
        let _ = pending.tx.send(Err(SeekError::Interrupted {
            generation: pending.generation,
            reason,
        }));
        Some(pending.generation)
    }

    pub(crate) fn latest_generation(&self) -> u64 {
        self.latest
    }

    pub(crate) fn cancelled_count(&self) -> u64 {
        self.cancelled
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// `(virtual, real)` targets of the pending request.
    pub(crate) fn pending_targets(&self) -> Option<(f64, f64)> {
        self.pending
            .as_ref()
            .map(|p| (p.virtual_target, p.real_target))
    }
}
