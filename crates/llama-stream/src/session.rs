//! Streaming session: one decoding request turned into a fragment stream.
//!
//! - Opens exactly one engine request (priority 0) on first poll
//! - Diffs cumulative snapshots into deltas, or forwards them whole
//! - Ends on engine exhaustion, engine error, contract violation, or cancellation
//! - Dropping the stream drops the engine's snapshot stream, releasing the request

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use llama_engine::{DecodeSnapshot, DecodingEngine, SamplingConfig};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, StreamError};
use crate::state::StreamState;

/// Scheduling tag passed to the engine. This session never competes with
/// itself, so every request uses the same priority.
pub const SESSION_PRIORITY: i32 = 0;

/// Fragments produced by a session.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What each produced fragment contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Only the text added since the previous fragment. Empty deltas are skipped.
    #[default]
    Incremental,
    /// The full text generated so far, on every snapshot.
    Cumulative,
}

impl DeliveryMode {
    pub fn from_incremental(incremental: bool) -> Self {
        if incremental {
            DeliveryMode::Incremental
        } else {
            DeliveryMode::Cumulative
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Running => write!(f, "running"),
            SessionPhase::Completed => write!(f, "completed"),
            SessionPhase::Cancelled => write!(f, "cancelled"),
            SessionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Records how a session ended.
///
/// Owned by the stream body. If the consumer drops the stream mid-flight the
/// guard is dropped while still `Running`, which is how abandonment shows up.
struct SessionGuard {
    session_id: Uuid,
    phase: SessionPhase,
    fragments: usize,
}

impl SessionGuard {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Idle,
            fragments: 0,
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        tracing::trace!(session = %self.session_id, from = %self.phase, to = %phase, "session transition");
        self.phase = phase;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Running => {
                tracing::debug!(
                    session = %self.session_id,
                    fragments = self.fragments,
                    "session abandoned by consumer; engine request released"
                );
            }
            SessionPhase::Failed => {
                tracing::warn!(session = %self.session_id, fragments = self.fragments, "session failed");
            }
            phase => {
                tracing::debug!(session = %self.session_id, fragments = self.fragments, %phase, "session ended");
            }
        }
    }
}

/// Drives one decoding request against a [`DecodingEngine`].
///
/// A session is single-use: [`StreamingSession::stream`] consumes it.
pub struct StreamingSession {
    id: Uuid,
    engine: Arc<dyn DecodingEngine>,
    mode: DeliveryMode,
    cancel: CancellationToken,
}

impl StreamingSession {
    pub fn new(engine: Arc<dyn DecodingEngine>, mode: DeliveryMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine,
            mode,
            cancel: CancellationToken::new(),
        }
    }

    /// Session ID carried by every log event the session emits.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Token that ends the stream cleanly when cancelled.
    ///
    /// Hosts use this to impose deadlines; dropping the stream has the same
    /// effect on the engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start streaming. Nothing touches the engine until the stream is polled.
    pub fn stream(self, prompt: impl Into<String>, config: SamplingConfig) -> FragmentStream {
        let StreamingSession {
            id,
            engine,
            mode,
            cancel,
        } = self;
        let prompt = prompt.into();
        let guard = SessionGuard::new(id);

        let stream = async_stream::stream! {
            let mut guard = guard;
            guard.enter(SessionPhase::Running);
            tracing::debug!(session = %id, ?mode, max_tokens = config.max_tokens, "opening decoding request");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                opened = engine.open_request(&prompt, &config, SESSION_PRIORITY) => Some(opened),
            };
            let mut snapshots = match opened {
                None => {
                    guard.enter(SessionPhase::Cancelled);
                    return;
                }
                Some(Ok(snapshots)) => snapshots,
                Some(Err(e)) => {
                    guard.enter(SessionPhase::Failed);
                    yield Err(StreamError::Engine(e));
                    return;
                }
            };

            let mut state = StreamState::new();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        guard.enter(SessionPhase::Cancelled);
                        break;
                    }
                    next = snapshots.next() => next,
                };

                let snapshot = match next {
                    None => {
                        guard.enter(SessionPhase::Completed);
                        break;
                    }
                    Some(Ok(snapshot)) => snapshot,
                    Some(Err(e)) => {
                        guard.enter(SessionPhase::Failed);
                        yield Err(StreamError::Engine(e));
                        break;
                    }
                };

                let full_text = match single_candidate(snapshot) {
                    Ok(text) => text,
                    Err(e) => {
                        guard.enter(SessionPhase::Failed);
                        yield Err(e);
                        break;
                    }
                };

                match mode {
                    DeliveryMode::Incremental => {
                        if let Some(delta) = state.advance(&full_text) {
                            guard.fragments += 1;
                            yield Ok(delta.to_string());
                        }
                    }
                    DeliveryMode::Cumulative => {
                        guard.fragments += 1;
                        yield Ok(full_text);
                    }
                }
            }
        };

        Box::pin(stream)
    }
}

/// Extract the only candidate's text from a snapshot.
fn single_candidate(mut snapshot: DecodeSnapshot) -> Result<String> {
    if snapshot.outputs.len() != 1 {
        return Err(StreamError::ContractViolation {
            candidates: snapshot.outputs.len(),
        });
    }
    Ok(snapshot.outputs.remove(0).text)
}
