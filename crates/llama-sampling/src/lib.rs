//! # llama-sampling
//!
//! Normalizes user-facing generation controls into the engine-ready
//! [`SamplingConfig`].
//!
//! Handles:
//! - Range checks on `top_p`, `max_new_tokens`, `temperature`, `top_k`
//! - Top-k "disabled" mapping (absent / 0 / -1 all mean no cutoff)
//! - Stop resolution: literal stop strings plus the decoded text of every stop
//!   token ID, with the model's end-of-sequence token always appended
//!
//! The engine only matches literal text, so token-ID stops are decoded up
//! front. Building is pure: the same request and tokenizer always yield the
//! same config.

use llama_engine::{SamplingConfig, TokenId, TopK};
use llama_tokenizer::{Tokenizer, TokenizerError};
use serde::{Deserialize, Serialize};

/// Default generation controls used when a caller leaves them unset.
///
/// [`TOP_K`](defaults::TOP_K) is the predictor's default cutoff only; an
/// unset `top_k` on a [`GenerationRequest`] means no cutoff.
pub mod defaults {
    pub const MAX_NEW_TOKENS: usize = 512;
    pub const TEMPERATURE: f32 = 0.6;
    pub const TOP_P: f32 = 0.9;
    pub const TOP_K: i32 = 50;
    pub const PRESENCE_PENALTY: f32 = 0.0;
    pub const FREQUENCY_PENALTY: f32 = 0.0;
}

/// Sampling error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("failed to decode stop token: {0}")]
    Tokenizer(#[from] TokenizerError),
}

impl SamplingError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SamplingError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// Caller-supplied stop strings: nothing, one string, or an ordered list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    #[default]
    None,
    Single(String),
    Many(Vec<String>),
}

impl StopSequences {
    /// Literal stop strings this value contributes.
    ///
    /// An empty string or empty list contributes nothing.
    pub fn literals(&self) -> Vec<String> {
        match self {
            StopSequences::Single(s) if !s.is_empty() => vec![s.clone()],
            StopSequences::Many(list) if !list.is_empty() => list.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for StopSequences {
    fn from(s: &str) -> Self {
        StopSequences::Single(s.to_string())
    }
}

impl From<String> for StopSequences {
    fn from(s: String) -> Self {
        StopSequences::Single(s)
    }
}

impl From<Vec<String>> for StopSequences {
    fn from(list: Vec<String>) -> Self {
        StopSequences::Many(list)
    }
}

/// One generation call as the caller describes it.
///
/// The prompt is expected to be fully formatted already.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    /// `None` or `Some(0)` disables the cutoff.
    pub top_k: Option<i32>,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop_sequences: StopSequences,
    pub stop_token_ids: Vec<TokenId>,
    /// Deliver deltas (`true`) or the full text so far (`false`).
    pub incremental: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            max_new_tokens: defaults::MAX_NEW_TOKENS,
            temperature: defaults::TEMPERATURE,
            top_p: defaults::TOP_P,
            top_k: None,
            frequency_penalty: defaults::FREQUENCY_PENALTY,
            presence_penalty: defaults::PRESENCE_PENALTY,
            stop_sequences: StopSequences::None,
            stop_token_ids: Vec::new(),
            incremental: true,
        }
    }
}

impl GenerationRequest {
    /// Create a request with default controls.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_max_new_tokens(mut self, n: usize) -> Self {
        self.max_new_tokens = n;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_top_p(mut self, p: f32) -> Self {
        self.top_p = p;
        self
    }

    pub fn with_top_k(mut self, k: Option<i32>) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = penalty;
        self
    }

    pub fn with_stop_sequences(mut self, stop: impl Into<StopSequences>) -> Self {
        self.stop_sequences = stop.into();
        self
    }

    pub fn with_stop_token_ids(mut self, ids: Vec<TokenId>) -> Self {
        self.stop_token_ids = ids;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}

/// Map the caller's top-k onto the engine cutoff.
///
/// | input        | result          |
/// |--------------|-----------------|
/// | `None`       | `Disabled`      |
/// | `Some(0)`    | `Disabled`      |
/// | `Some(-1)`   | `Disabled`      |
/// | `Some(k>0)`  | `Limit(k)`      |
/// | other        | error           |
pub fn normalize_top_k(top_k: Option<i32>) -> SamplingResult<TopK> {
    match top_k {
        None => Ok(TopK::Disabled),
        Some(k) => TopK::try_from(k).map_err(|reason| SamplingError::invalid("top_k", reason)),
    }
}

fn validate(request: &GenerationRequest) -> SamplingResult<()> {
    if !(request.top_p > 0.0 && request.top_p <= 1.0) {
        return Err(SamplingError::invalid(
            "top_p",
            format!("must be in (0, 1], got {}", request.top_p),
        ));
    }
    if request.max_new_tokens == 0 {
        return Err(SamplingError::invalid("max_new_tokens", "must be positive"));
    }
    if !request.temperature.is_finite() || request.temperature < 0.0 {
        return Err(SamplingError::invalid(
            "temperature",
            format!("must be >= 0, got {}", request.temperature),
        ));
    }
    if !request.frequency_penalty.is_finite() {
        return Err(SamplingError::invalid("frequency_penalty", "must be finite"));
    }
    if !request.presence_penalty.is_finite() {
        return Err(SamplingError::invalid("presence_penalty", "must be finite"));
    }
    Ok(())
}

/// Build the engine-ready sampling config for `request`.
///
/// Stop-token IDs (caller's plus end-of-sequence) are decoded to text and
/// appended after the literal stop strings, in order. Duplicates are kept.
pub fn build(request: &GenerationRequest, tokenizer: &dyn Tokenizer) -> SamplingResult<SamplingConfig> {
    validate(request)?;
    let top_k = normalize_top_k(request.top_k)?;

    let mut stop_token_ids = request.stop_token_ids.clone();
    stop_token_ids.push(tokenizer.eos_token_id());

    let mut stop = request.stop_sequences.literals();
    for &id in &stop_token_ids {
        stop.push(tokenizer.decode_one(id)?);
    }

    tracing::debug!(
        top_k = %top_k,
        top_p = request.top_p,
        temperature = request.temperature,
        max_tokens = request.max_new_tokens,
        ?stop,
        "built sampling config"
    );

    Ok(SamplingConfig {
        n: 1,
        top_p: request.top_p,
        top_k,
        temperature: request.temperature,
        use_beam_search: false,
        stop,
        max_tokens: request.max_new_tokens,
        frequency_penalty: request.frequency_penalty,
        presence_penalty: request.presence_penalty,
    })
}
