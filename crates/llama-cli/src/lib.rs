//! # llama-cli
//!
//! Predictor front end for llama-predict.
//!
//! Wires: prompt template → generation request → streaming session → timed
//! fragment stream. The binary in `main.rs` runs it against the threaded echo
//! engine; library users can plug any [`DecodingEngine`].

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use llama_engine::DecodingEngine;
use llama_runtime::{GenerationTimer, LogTelemetry, TelemetryHook};
use llama_sampling::{defaults, GenerationRequest, SamplingError};
use llama_stream::{FragmentStream, StreamError};
use llama_tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the user prompt in a template.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Instruction-style template used when none is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "<s>[INST] {prompt} [/INST] ";

/// Errors from the predictor.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("invalid parameters: {0}")]
    Sampling(#[from] SamplingError),
    #[error("generation failed: {0}")]
    Stream(#[from] StreamError),
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PredictError>;

/// Predictor configuration: model label, prompt template, default controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Model name reported in logs.
    pub model_name: String,
    /// Template with a `{prompt}` placeholder.
    pub prompt_template: String,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<i32>,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Stream deltas (`true`) or the full text so far (`false`).
    pub incremental: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_name: "llama-echo".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            max_new_tokens: defaults::MAX_NEW_TOKENS,
            temperature: defaults::TEMPERATURE,
            top_p: defaults::TOP_P,
            top_k: Some(defaults::TOP_K),
            presence_penalty: defaults::PRESENCE_PENALTY,
            frequency_penalty: defaults::FREQUENCY_PENALTY,
            incremental: true,
        }
    }
}

impl PredictorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: PredictorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the template carries the prompt placeholder.
    pub fn validate(&self) -> Result<()> {
        if !self.prompt_template.contains(PROMPT_PLACEHOLDER) {
            return Err(PredictError::Config(format!(
                "prompt template must contain {PROMPT_PLACEHOLDER}"
            )));
        }
        Ok(())
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn with_max_new_tokens(mut self, n: usize) -> Self {
        self.max_new_tokens = n;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
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

    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = penalty;
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Substitute `prompt` into the template.
    pub fn format_prompt(&self, prompt: &str) -> String {
        self.prompt_template.replace(PROMPT_PLACEHOLDER, prompt)
    }

    /// Generation request for `prompt` using this config's controls.
    pub fn request(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest::new(self.format_prompt(prompt))
            .with_max_new_tokens(self.max_new_tokens)
            .with_temperature(self.temperature)
            .with_top_p(self.top_p)
            .with_top_k(self.top_k)
            .with_presence_penalty(self.presence_penalty)
            .with_frequency_penalty(self.frequency_penalty)
            .with_incremental(self.incremental)
    }
}

/// Runs templated prompts through a decoding engine.
pub struct Predictor {
    engine: Arc<dyn DecodingEngine>,
    tokenizer: Arc<dyn Tokenizer>,
    config: PredictorConfig,
    telemetry: Arc<dyn TelemetryHook>,
}

impl Predictor {
    pub fn new(
        engine: Arc<dyn DecodingEngine>,
        tokenizer: Arc<dyn Tokenizer>,
        config: PredictorConfig,
    ) -> Self {
        tracing::debug!(model = %config.model_name, "predictor ready");
        Self {
            engine,
            tokenizer,
            config,
            telemetry: Arc::new(LogTelemetry::new()),
        }
    }

    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Stream a completion for `prompt` with the configured controls.
    pub fn predict(&self, prompt: &str) -> Result<FragmentStream> {
        self.predict_request(&self.config.request(prompt))
    }

    /// Stream a completion for an already-formatted request.
    ///
    /// The request is validated here; the generation is timed once the
    /// stream runs to completion or fails.
    pub fn predict_request(&self, request: &GenerationRequest) -> Result<FragmentStream> {
        let mut fragments =
            llama_stream::generate(Arc::clone(&self.engine), self.tokenizer.as_ref(), request)?;
        let mut timer = GenerationTimer::new(Arc::clone(&self.telemetry));

        let stream = async_stream::stream! {
            while let Some(item) = fragments.next().await {
                let failed = match &item {
                    Ok(fragment) => {
                        timer.mark_fragment(fragment);
                        false
                    }
                    Err(_) => true,
                };
                yield item;
                if failed {
                    break;
                }
            }
            timer.finish();
        };
        Ok(Box::pin(stream))
    }

    /// Run to completion and return the concatenated fragments.
    pub async fn predict_to_string(&self, prompt: &str) -> Result<String> {
        let mut fragments = self.predict(prompt)?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            if self.config.incremental {
                text.push_str(&fragment);
            } else {
                text = fragment;
            }
        }
        Ok(text)
    }
}
