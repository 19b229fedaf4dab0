//! Scripted engine: replays a fixed list of snapshots.
//!
//! Useful wherever a deterministic engine is needed (tests, demos, replay of
//! recorded runs). An [`EngineProbe`] counts how the engine was driven so
//! callers can check that abandoned requests stop being pulled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use llama_engine::{
    CompletionOutput, DecodeSnapshot, DecodingEngine, EngineError, EngineResult, SamplingConfig,
    SnapshotStream,
};

/// One scripted engine step.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Snapshot(DecodeSnapshot),
    Fail(EngineError),
}

/// A request as the engine received it.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedRequest {
    pub prompt: String,
    pub config: SamplingConfig,
    pub priority: i32,
}

/// Counters describing how a [`ScriptedEngine`] was driven.
#[derive(Debug, Default)]
pub struct EngineProbe {
    opened: AtomicUsize,
    pulled: AtomicUsize,
    released: AtomicUsize,
    last_request: Mutex<Option<OpenedRequest>>,
}

impl EngineProbe {
    /// Requests opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Script steps handed to consumers, across all requests.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Snapshot streams dropped (exhausted or abandoned).
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<OpenedRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

/// Marks the request released when the snapshot stream is dropped.
struct ReleaseOnDrop(Arc<EngineProbe>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine that replays a script for every request.
pub struct ScriptedEngine {
    script: Vec<ScriptStep>,
    open_error: Option<EngineError>,
    probe: Arc<EngineProbe>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            open_error: None,
            probe: Arc::new(EngineProbe::default()),
        }
    }

    /// Single-candidate snapshots with the given cumulative texts.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| ScriptStep::Snapshot(DecodeSnapshot::single(t)))
                .collect(),
        )
    }

    /// Reject every request at open time.
    pub fn rejecting(err: EngineError) -> Self {
        Self {
            open_error: Some(err),
            ..Self::new(Vec::new())
        }
    }

    /// Append a snapshot carrying several candidates.
    pub fn then_candidates(mut self, texts: &[&str]) -> Self {
        let outputs = texts
            .iter()
            .enumerate()
            .map(|(i, t)| CompletionOutput::new(i, *t))
            .collect();
        self.script.push(ScriptStep::Snapshot(DecodeSnapshot { outputs }));
        self
    }

    /// Append an engine failure.
    pub fn then_fail(mut self, err: EngineError) -> Self {
        self.script.push(ScriptStep::Fail(err));
        self
    }

    pub fn probe(&self) -> Arc<EngineProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl DecodingEngine for ScriptedEngine {
    async fn open_request(
        &self,
        prompt: &str,
        config: &SamplingConfig,
        priority: i32,
    ) -> EngineResult<SnapshotStream> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.probe.last_request.lock() {
            *last = Some(OpenedRequest {
                prompt: prompt.to_string(),
                config: config.clone(),
                priority,
            });
        }
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }

        let steps = self.script.clone();
        let probe = Arc::clone(&self.probe);
        let release = ReleaseOnDrop(Arc::clone(&self.probe));

        let stream = async_stream::stream! {
            let _release = release;
            for step in steps {
                probe.pulled.fetch_add(1, Ordering::SeqCst);
                match step {
                    ScriptStep::Snapshot(snapshot) => yield Ok(snapshot),
                    ScriptStep::Fail(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
