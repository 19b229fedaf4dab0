//! # llama-engine
//!
//! The "narrow waist" of the llama-predict stack. Defines the [`DecodingEngine`]
//! trait and the engine-ready types that every other crate depends on. Engines
//! can be swapped (scripted, threaded, FFI-backed) without changing the
//! streaming session or the sampling builder.
//!
//! ## Design Notes
//!
//! ### Shared Access
//! `DecodingEngine` methods take `&self` so a single engine can serve many
//! sessions. Engines that batch or schedule internally are responsible for
//! their own synchronization.
//!
//! ### Cumulative Snapshots
//! An engine reports progress as [`DecodeSnapshot`]s carrying the full text
//! generated so far, not deltas. Diffing is the caller's job.
//!
//! ### Release on Drop
//! Dropping a [`SnapshotStream`] before it is exhausted must release the
//! engine-side request. Consumers abandon a request simply by dropping it.

use std::fmt;
use std::num::NonZeroU32;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize, Serializer};

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Token ID type (i32 for FFI compat; logically non-negative).
pub type TokenId = i32;

/// Errors signaled by a decoding engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("request rejected: {0}")]
    Request(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("tokenization failed: {0}")]
    Tokenizer(String),
}

/// Top-k cutoff with an explicit "disabled" state.
///
/// Engines take a signed integer where `-1` means "no cutoff". Keeping the
/// disabled case as its own variant means `0` never reaches an engine as a
/// literal "take zero tokens".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "i32")]
pub enum TopK {
    Disabled,
    Limit(NonZeroU32),
}

impl TopK {
    /// Engine encoding of [`TopK::Disabled`].
    pub const DISABLED_SENTINEL: i32 = -1;

    /// Value handed to the engine.
    ///
    /// Fails for a limit above `i32::MAX`, which engines cannot represent.
    pub fn as_engine_value(self) -> Result<i32, String> {
        match self {
            TopK::Disabled => Ok(Self::DISABLED_SENTINEL),
            TopK::Limit(k) => i32::try_from(k.get())
                .map_err(|_| format!("top_k {k} exceeds engine maximum {}", i32::MAX)),
        }
    }

    pub fn is_disabled(self) -> bool {
        matches!(self, TopK::Disabled)
    }
}

impl TryFrom<TopK> for i32 {
    type Error = String;

    fn try_from(top_k: TopK) -> Result<Self, Self::Error> {
        top_k.as_engine_value()
    }
}

impl Serialize for TopK {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self
            .as_engine_value()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        serializer.serialize_i32(value)
    }
}

impl TryFrom<i32> for TopK {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            TopK::DISABLED_SENTINEL | 0 => Ok(TopK::Disabled),
            k if k > 0 => Ok(NonZeroU32::new(k as u32)
                .map(TopK::Limit)
                .unwrap_or(TopK::Disabled)),
            k => Err(format!("top_k must be >= 0 or {}, got {k}", TopK::DISABLED_SENTINEL)),
        }
    }
}

impl fmt::Display for TopK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopK::Disabled => write!(f, "disabled"),
            TopK::Limit(k) => write!(f, "{k}"),
        }
    }
}

/// Canonical, engine-ready sampling configuration.
///
/// Built once per request by `llama-sampling` and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Number of candidate completions. Always 1.
    pub n: usize,
    /// Nucleus threshold in (0, 1].
    pub top_p: f32,
    /// Effective top-k cutoff.
    pub top_k: TopK,
    /// Softmax temperature (>= 0).
    pub temperature: f32,
    /// Beam search is never requested.
    pub use_beam_search: bool,
    /// Literal stop strings, including decoded stop tokens and end-of-sequence.
    pub stop: Vec<String>,
    /// Maximum number of tokens the engine may generate.
    pub max_tokens: usize,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// One candidate completion inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutput {
    /// Candidate index within the request.
    pub index: usize,
    /// Full text generated so far for this candidate.
    pub text: String,
}

impl CompletionOutput {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// One cumulative observation emitted by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSnapshot {
    pub outputs: Vec<CompletionOutput>,
}

impl DecodeSnapshot {
    /// Snapshot with a single candidate (the only shape requested by this stack).
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            outputs: vec![CompletionOutput::new(0, text)],
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.outputs.len()
    }
}

/// Lazily-produced sequence of snapshots for one request.
///
/// Dropping the stream releases the request.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = EngineResult<DecodeSnapshot>> + Send>>;

/// The core engine trait: everything else plugs into this.
///
/// `priority` is an engine-defined scheduling tag; single-session callers
/// pass `0`.
#[async_trait]
pub trait DecodingEngine: Send + Sync {
    /// Open one decoding request and return its snapshot stream.
    async fn open_request(
        &self,
        prompt: &str,
        config: &SamplingConfig,
        priority: i32,
    ) -> EngineResult<SnapshotStream>;
}
